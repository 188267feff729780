//! HTML parsing for newsletter bodies and scraped article pages.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::domain::entities::ScrapedContent;
use crate::utils::links::is_excluded_link;
use crate::utils::text::{squash_whitespace, truncate};

/// Extracted bodies shorter than this are treated as failed scrapes.
pub const MIN_CONTENT_LENGTH: usize = 200;

const EXCERPT_CHARS: usize = 500;
const ANCHOR_TEXT_CHARS: usize = 500;
const SURROUNDING_TEXT_CHARS: usize = 500;

const BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "blockquote",
];

const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " — "];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static BLOCKS: LazyLock<Selector> = LazyLock::new(|| selector(&BLOCK_TAGS.join(", ")));
static CONTAINERS: LazyLock<[Selector; 3]> =
    LazyLock::new(|| [selector("article"), selector("main"), selector("body")]);
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static OG_TITLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:title"]"#));
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:image"]"#));
static OG_SITE_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:site_name"]"#));
static META_AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[name="author"]"#));
static REL_AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector(r#"[rel="author"]"#));
static DATE_SOURCES: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    [
        selector(r#"meta[property="article:published_time"]"#),
        selector(r#"meta[name="date"]"#),
        selector("time[datetime]"),
    ]
});
static HTML_LANG: LazyLock<Selector> = LazyLock::new(|| selector("html[lang]"));

/// An anchor found in a newsletter body.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLink {
    pub href: String,
    pub anchor_text: String,
    pub surrounding_text: String,
}

/// Why a fetched page did not yield an article.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExtractError {
    #[error("Content too short: {0} chars")]
    ContentTooShort(usize),
}

/// Collects candidate article anchors from an email body.
///
/// Anchors pointing at excluded destinations (social sites, email service
/// providers, unsubscribe pages, non-web schemes) and non-HTTP(S) links are
/// skipped. Order follows the document.
pub fn extract_links(html: &str) -> Vec<AnchorLink> {
    let document = Html::parse_document(html);

    document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if is_excluded_link(href) {
                return None;
            }
            if !(href.starts_with("http://") || href.starts_with("https://")) {
                return None;
            }

            let anchor_text = element_text(&anchor);
            let surrounding_text = anchor
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| element_text(&parent))
                .unwrap_or_default();

            Some(AnchorLink {
                href: href.to_string(),
                anchor_text: truncate(&anchor_text, ANCHOR_TEXT_CHARS).to_string(),
                surrounding_text: truncate(&surrounding_text, SURROUNDING_TEXT_CHARS).to_string(),
            })
        })
        .collect()
}

/// Pulls the readable article and its metadata out of a page.
///
/// # Errors
///
/// Returns [`ExtractError::ContentTooShort`] when the collected body text is
/// under [`MIN_CONTENT_LENGTH`] characters.
pub fn extract_article(html: &str) -> Result<ScrapedContent, ExtractError> {
    let document = Html::parse_document(html);

    let (content_text, content_html) = extract_body(&document);
    let length = content_text.chars().count();
    if length < MIN_CONTENT_LENGTH {
        return Err(ExtractError::ContentTooShort(length));
    }

    let author = meta_content(&document, &META_AUTHOR)
        .or_else(|| {
            document
                .select(&REL_AUTHOR)
                .next()
                .map(|el| element_text(&el))
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default();

    let language = document
        .select(&HTML_LANG)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or("en");

    Ok(ScrapedContent {
        title: extract_title(&document),
        author,
        publication: meta_content(&document, &OG_SITE_NAME).unwrap_or_default(),
        publication_date: extract_publication_date(&document),
        excerpt: truncate(&content_text, EXCERPT_CHARS).to_string(),
        word_count: i32::try_from(content_text.split_whitespace().count()).unwrap_or(i32::MAX),
        og_image: meta_content(&document, &OG_IMAGE).unwrap_or_default(),
        language: truncate(language, 10).to_string(),
        content_text,
        content_html,
    })
}

/// Plain text of a whole document, whitespace-normalised.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let scope = document
        .select(&CONTAINERS[2])
        .next()
        .unwrap_or_else(|| document.root_element());
    element_text(&scope)
}

fn element_text(element: &ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extract_title(document: &Html) -> String {
    if let Some(title) = meta_content(document, &OG_TITLE) {
        return title;
    }

    let raw = document
        .select(&TITLE)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| raw.find(sep))
        .min()
        .unwrap_or(raw.len());

    raw[..cut].trim().to_string()
}

/// Text and cleaned HTML of the top-level content blocks of the main container.
fn extract_body(document: &Html) -> (String, String) {
    let Some(container) = CONTAINERS
        .iter()
        .find_map(|sel| document.select(sel).next())
    else {
        return (String::new(), String::new());
    };

    let mut texts = Vec::new();
    let mut fragments = Vec::new();

    for block in container.select(&BLOCKS) {
        let nested = block
            .ancestors()
            .take_while(|node| node.id() != container.id())
            .filter_map(ElementRef::wrap)
            .any(|el| BLOCK_TAGS.contains(&el.value().name()));
        if nested {
            continue;
        }

        let text = element_text(&block);
        if text.is_empty() {
            continue;
        }
        texts.push(text);
        fragments.push(block.html());
    }

    (texts.join(" "), fragments.join("\n"))
}

fn extract_publication_date(document: &Html) -> Option<DateTime<Utc>> {
    let raw = DATE_SOURCES.iter().find_map(|sel| {
        let el = document.select(sel).next()?;
        el.value()
            .attr("content")
            .or_else(|| el.value().attr("datetime"))
            .map(str::trim)
    })?;

    parse_date(raw)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEWSLETTER: &str = r#"
        <html><body>
          <p>Big news today: <a href="https://example.com/news/launch?utm_source=nl">Model launch</a> from the lab.</p>
          <a href="https://twitter.com/lab">Follow us</a>
          <a href="mailto:hi@example.com">Write</a>
          <a href="/relative/path">Relative</a>
          <a href="https://example.com/unsubscribe?u=1">Unsubscribe</a>
          <div><a href="https://blog.example.org/2024/05/deep-dive">  Deep
             dive </a></div>
        </body></html>
    "#;

    fn article_page(body: &str) -> String {
        format!(
            r#"<html lang="fr"><head>
                <title>Launch day | Example News</title>
                <meta name="author" content="Ada Lovelace">
                <meta property="og:image" content="https://example.com/cover.png">
                <meta property="og:site_name" content="Example News">
                <meta property="article:published_time" content="2024-05-01T10:30:00Z">
              </head><body>
                <nav><p>Menu entry that should be ignored</p></nav>
                <article>{body}</article>
              </body></html>"#
        )
    }

    #[test]
    fn test_extract_links_filters_and_keeps_context() {
        let links = extract_links(NEWSLETTER);
        assert_eq!(links.len(), 2);

        assert_eq!(links[0].href, "https://example.com/news/launch?utm_source=nl");
        assert_eq!(links[0].anchor_text, "Model launch");
        assert_eq!(
            links[0].surrounding_text,
            "Big news today: Model launch from the lab."
        );

        assert_eq!(links[1].href, "https://blog.example.org/2024/05/deep-dive");
        assert_eq!(links[1].anchor_text, "Deep dive");
    }

    #[test]
    fn test_extract_links_empty_html() {
        assert!(extract_links("").is_empty());
    }

    #[test]
    fn test_extract_article_reads_content_and_metadata() {
        let paragraph = "The lab released a new model with longer context. ".repeat(6);
        let html = article_page(&format!(
            "<h1>Launch day</h1><p>{paragraph}</p><ul><li><p>Nested point</p></li></ul>"
        ));

        let content = extract_article(&html).unwrap();
        assert_eq!(content.title, "Launch day");
        assert_eq!(content.author, "Ada Lovelace");
        assert_eq!(content.publication, "Example News");
        assert_eq!(content.og_image, "https://example.com/cover.png");
        assert_eq!(content.language, "fr");
        assert_eq!(
            content.publication_date.unwrap().to_rfc3339(),
            "2024-05-01T10:30:00+00:00"
        );
        assert!(content.content_text.starts_with("Launch day The lab released"));
        assert!(content.content_text.ends_with("Nested point"));
        assert_eq!(content.content_text.matches("Nested point").count(), 1);
        assert!(!content.content_text.contains("Menu entry"));
        assert_eq!(content.excerpt, content.content_text);
        assert_eq!(
            content.word_count as usize,
            content.content_text.split_whitespace().count()
        );
        assert!(content.content_html.contains("<h1>Launch day</h1>"));
    }

    #[test]
    fn test_extract_article_prefers_og_title() {
        let body = format!("<p>{}</p>", "word ".repeat(60));
        let html = article_page(&body).replace(
            "<title>",
            r#"<meta property="og:title" content="Open Graph Title"><title>"#,
        );
        assert_eq!(extract_article(&html).unwrap().title, "Open Graph Title");
    }

    #[test]
    fn test_extract_article_rejects_short_content() {
        let html = article_page("<p>Too short.</p>");
        assert_eq!(extract_article(&html), Err(ExtractError::ContentTooShort(10)));
    }

    #[test]
    fn test_extract_article_falls_back_to_body_and_defaults() {
        let html = format!(
            "<html><head><title>Plain - Site</title></head><body><p>{}</p><span rel=\"author\">Grace</span><time datetime=\"2023-02-03\">Feb</time></body></html>",
            "text ".repeat(60)
        );
        let content = extract_article(&html).unwrap();
        assert_eq!(content.title, "Plain");
        assert_eq!(content.author, "Grace");
        assert_eq!(content.language, "en");
        assert_eq!(
            content.publication_date.unwrap().to_rfc3339(),
            "2023-02-03T00:00:00+00:00"
        );
    }

    #[test]
    fn test_html_to_text() {
        let text = html_to_text("<html><body><h1>Hi</h1><p>there\n  friend</p></body></html>");
        assert_eq!(text, "Hi there friend");
    }
}
