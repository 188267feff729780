//! Small string helpers shared by the pipeline.

/// Returns at most `max_chars` characters of `s`, cutting on a char boundary.
pub fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Collapses all whitespace runs to single spaces and trims the ends.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// Non-ASCII characters are dropped, so an all-symbol input yields an empty
/// string and callers must provide a fallback.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("OpenAI Releases GPT-5!"), "openai-releases-gpt-5");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("snake_case title"), "snake-case-title");
        assert_eq!(slugify("What's new?"), "whats-new");
        assert_eq!(slugify("日本語"), "");
    }
}
