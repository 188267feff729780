//! URL canonicalisation and article-link heuristics.
//!
//! Newsletter links arrive wrapped in click trackers and decorated with
//! campaign parameters. These helpers reduce them to one canonical form per
//! article and decide whether a link is worth scraping.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Errors that can occur during URL canonicalisation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("Failed to canonicalise URL: {0}")]
    NormalizationFailed(String),
}

/// Query parameters that only carry campaign or click attribution.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
    "source",
    "mc_cid",
    "mc_eid",
    "fbclid",
    "gclid",
    "twclid",
    "_hsenc",
    "_hsmi",
    "mkt_tok",
    "trk",
    "trkEmail",
];

/// Substrings marking links that never point at articles: social profiles,
/// email service providers, unsubscribe flows and non-web schemes.
const EXCLUDED_MARKERS: &[&str] = &[
    "google.com",
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "mailchimp.com",
    "list-manage.com",
    "substack.com",
    "beehiiv.com",
    "convertkit.com",
    "buttondown.email",
    "unsubscribe",
    "mailto:",
    "javascript:",
];

const MEDIA_EXTENSIONS: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".gif", ".mp4", ".mp3", ".webp", ".svg",
];

const NON_ARTICLE_SECTIONS: &[&str] = &[
    "/category/",
    "/categories/",
    "/tag/",
    "/tags/",
    "/author/",
    "/authors/",
    "/about/",
    "/contact/",
    "/login/",
    "/signup/",
    "/register/",
    "/subscribe/",
    "/search/",
    "/feed/",
    "/rss/",
    "/sitemap",
    "/privacy/",
    "/terms/",
    "/legal/",
];

const ARTICLE_SECTIONS: &[&str] = &[
    "/article/",
    "/articles/",
    "/post/",
    "/posts/",
    "/blog/",
    "/blogs/",
    "/news/",
    "/story/",
    "/stories/",
    "/p/",
    "/entry/",
    "/research/",
    "/insights/",
    "/opinion/",
    "/analysis/",
];

static DATE_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4}/\d{2}/|/\d{4}-\d{2}-\d{2}/").unwrap());

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+-[a-z0-9-]+[a-z0-9]$").unwrap());

static CLICK_TRACKER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/CL\d+/").unwrap());

static NUMBERED_SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d+/").unwrap());

static ENCODED_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?%3A%2F%2F[^&\s]+").unwrap());

static REDIRECT_PARAM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](?:url|redirect|goto|link|target)=([^&]+)").unwrap()
});

/// Reduces a URL to the canonical form used for article identity.
///
/// # Rules
///
/// 1. Only HTTP and HTTPS are accepted
/// 2. The host is lowercased
/// 3. Tracking parameters are dropped (case-insensitive key match); the
///    remaining parameters keep their order
/// 4. Trailing slashes are stripped from the path
/// 5. The fragment is removed
///
/// # Errors
///
/// Returns [`UrlError::InvalidFormat`] for malformed URLs and
/// [`UrlError::UnsupportedProtocol`] for non-HTTP(S) schemes.
pub fn canonicalize_url(input: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(input.trim()).map_err(|e| UrlError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlError::UnsupportedProtocol),
    }

    if let Some(host) = url.host_str() {
        let host_lowercase = host.to_ascii_lowercase();
        url.set_host(Some(&host_lowercase)).map_err(|_| {
            UrlError::NormalizationFailed("Failed to set normalized host".to_string())
        })?;
    }

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);

    Ok(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.iter().any(|p| p.eq_ignore_ascii_case(key))
}

/// Whether an `href` found in an email should be ignored outright.
pub fn is_excluded_link(href: &str) -> bool {
    let lower = href.to_lowercase();
    EXCLUDED_MARKERS.iter().any(|m| lower.contains(m))
}

/// Heuristically decides whether a URL points at an article.
///
/// Checks run in order and the first decisive one wins: short or root paths,
/// media files and site sections are rejected; known article sections, dated
/// paths, deep paths and long slugs are accepted.
pub fn is_valid_article_url(input: &str) -> bool {
    let Ok(url) = Url::parse(input) else {
        return false;
    };
    let path = url.path().to_lowercase();

    if path.is_empty() || path == "/" || path.len() < 10 {
        return false;
    }

    if MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }

    if NON_ARTICLE_SECTIONS.iter().any(|s| path.contains(s)) {
        return false;
    }

    if ARTICLE_SECTIONS.iter().any(|s| path.contains(s)) {
        return true;
    }

    if DATE_PATH_REGEX.is_match(&path) {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 3 {
        return true;
    }

    segments
        .last()
        .is_some_and(|last| last.len() > 20 && SLUG_REGEX.is_match(last))
}

/// Unwraps click-tracking redirects to the destination URL.
///
/// Recognises `/CL0/<encoded>/<n>/...` trackers, Beehiiv-style `hclick`
/// links carrying an encoded `https%3A%2F%2F...` target, and generic
/// `url|redirect|goto|link|target` query parameters. A candidate is only
/// accepted when it decodes to an absolute HTTP(S) URL with a host; otherwise
/// the input is returned unchanged.
pub fn extract_real_url(tracking_url: &str) -> String {
    if tracking_url.contains("/CL0/") || tracking_url.contains("/CL1/") {
        let mut parts = CLICK_TRACKER_REGEX.splitn(tracking_url, 2);
        if let (Some(_), Some(rest)) = (parts.next(), parts.next()) {
            let encoded = NUMBERED_SEGMENT_REGEX.split(rest).next().unwrap_or(rest);
            if let Some(url) = decoded_http_url(encoded) {
                tracing::debug!(url = %url, "unwrapped click tracker");
                return url;
            }
        }
    }

    let lower = tracking_url.to_lowercase();
    if (lower.contains("beehiiv") || lower.contains("hclick"))
        && let Some(m) = ENCODED_URL_REGEX.find(tracking_url)
        && let Some(url) = decoded_http_url(m.as_str())
    {
        tracing::debug!(url = %url, "unwrapped hclick redirect");
        return url;
    }

    if let Some(caps) = REDIRECT_PARAM_REGEX.captures(tracking_url)
        && let Some(url) = decoded_http_url(&caps[1])
    {
        tracing::debug!(url = %url, "unwrapped redirect parameter");
        return url;
    }

    tracking_url.to_string()
}

fn decoded_http_url(encoded: &str) -> Option<String> {
    let decoded = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
    let parsed = Url::parse(&decoded).ok()?;
    let ok = matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some();
    ok.then_some(decoded)
}

/// SHA-256 of the canonical URL, hex-encoded. Used as the article's unique key.
pub fn url_hash(canonical_url: &str) -> String {
    hex::encode(Sha256::digest(canonical_url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_tracking_params() {
        let result = canonicalize_url(
            "https://Example.COM/news/item?utm_source=nl&id=42&UTM_Medium=email&fbclid=x",
        );
        assert_eq!(result.unwrap(), "https://example.com/news/item?id=42");
    }

    #[test]
    fn test_canonicalize_tracking_match_is_case_insensitive() {
        let result = canonicalize_url("https://example.com/a/b?trkemail=1&TRK=2&keep=yes");
        assert_eq!(result.unwrap(), "https://example.com/a/b?keep=yes");
    }

    #[test]
    fn test_canonicalize_keeps_param_order() {
        let result = canonicalize_url("https://example.com/s?z=1&ref=x&a=2");
        assert_eq!(result.unwrap(), "https://example.com/s?z=1&a=2");
    }

    #[test]
    fn test_canonicalize_drops_fragment_and_trailing_slash() {
        let result = canonicalize_url("https://example.com/posts/hello/#comments");
        assert_eq!(result.unwrap(), "https://example.com/posts/hello");
    }

    #[test]
    fn test_canonicalize_rejects_other_schemes() {
        assert_eq!(
            canonicalize_url("ftp://example.com/file"),
            Err(UrlError::UnsupportedProtocol)
        );
        assert!(matches!(
            canonicalize_url("not a url"),
            Err(UrlError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_excluded_links() {
        assert!(is_excluded_link("https://twitter.com/someone"));
        assert!(is_excluded_link("https://news.example.com/Unsubscribe?id=1"));
        assert!(is_excluded_link("mailto:editor@example.com"));
        assert!(is_excluded_link("https://example.substack.com/p/post"));
        assert!(!is_excluded_link("https://example.com/blog/post"));
    }

    #[test]
    fn test_article_rejects_short_and_root_paths() {
        assert!(!is_valid_article_url("https://example.com/"));
        assert!(!is_valid_article_url("https://example.com/abc"));
    }

    #[test]
    fn test_article_rejects_media_and_sections() {
        assert!(!is_valid_article_url(
            "https://example.com/files/whitepaper-2024.pdf"
        ));
        assert!(!is_valid_article_url(
            "https://example.com/tag/machine-learning"
        ));
        assert!(!is_valid_article_url("https://example.com/about/our-team"));
    }

    #[test]
    fn test_article_section_wins_over_depth() {
        assert!(is_valid_article_url("https://example.com/blog/launch"));
        assert!(is_valid_article_url("https://example.com/p/new-model"));
    }

    #[test]
    fn test_article_accepts_dated_paths() {
        assert!(is_valid_article_url("https://example.com/2024/05/launch"));
        assert!(is_valid_article_url(
            "https://example.com/2024-05-01/launch"
        ));
    }

    #[test]
    fn test_article_accepts_deep_paths() {
        assert!(is_valid_article_url("https://example.com/one/two/three"));
    }

    #[test]
    fn test_article_slug_rule() {
        assert!(is_valid_article_url(
            "https://example.com/openai-releases-new-model"
        ));
        // Too short to count as a slug.
        assert!(!is_valid_article_url("https://example.com/short-slug"));
        // Not a slug shape.
        assert!(!is_valid_article_url(
            "https://example.com/UnderscoredName_WithCaps"
        ));
    }

    #[test]
    fn test_extract_tldr_tracker() {
        let tracked = "https://tracking.tldrnewsletter.com/CL0/https:%2F%2Fexample.com%2Fnews%2Fbig-story%3Futm_source=tldr/1/0100018f-abc/xyz";
        assert_eq!(
            extract_real_url(tracked),
            "https://example.com/news/big-story?utm_source=tldr"
        );
    }

    #[test]
    fn test_extract_hclick_redirect() {
        let tracked =
            "https://link.mail.beehiiv.com/ss/c/abc?u=https%3A%2F%2Fexample.com%2Fpost%2Fone&x=1";
        assert_eq!(extract_real_url(tracked), "https://example.com/post/one");
    }

    #[test]
    fn test_extract_generic_redirect_param() {
        let tracked = "https://click.example.net/r?id=5&URL=https%3A%2F%2Fexample.org%2Fa%2Fb";
        assert_eq!(extract_real_url(tracked), "https://example.org/a/b");
    }

    #[test]
    fn test_extract_returns_input_when_no_target() {
        let plain = "https://example.com/articles/thing";
        assert_eq!(extract_real_url(plain), plain);

        let relative = "https://click.example.net/r?url=%2Flocal%2Fpath";
        assert_eq!(extract_real_url(relative), relative);
    }

    #[test]
    fn test_url_hash_is_sha256_hex() {
        let hash = url_hash("https://example.com/a");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, url_hash("https://example.com/a"));
        assert_ne!(hash, url_hash("https://example.com/b"));
    }
}
