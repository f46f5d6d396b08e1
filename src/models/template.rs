use crate::constants::QUERY_PLACEHOLDER;
use crate::domain::{CategoryId, TemplateId};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern has no query placeholder")]
    MissingPlaceholder,

    #[error("pattern has {0} query placeholders, expected exactly one")]
    MultiplePlaceholders(usize),

    #[error("pattern is not an http(s) URL: {0}")]
    InvalidUrl(String),
}

/// A search URL with exactly one `{query}` placeholder.
///
/// Derivers sometimes emit `{your_query}` or `{q}`; those are normalised to
/// `{query}` on parse so the stored form is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchPattern(String);

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(?:query|your_query|q)\}").expect("Invalid regex"))
}

impl SearchPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        let count = placeholder_regex().find_iter(raw).count();
        match count {
            0 => return Err(PatternError::MissingPlaceholder),
            1 => {}
            n => return Err(PatternError::MultiplePlaceholders(n)),
        }

        let normalised = placeholder_regex()
            .replace(raw, QUERY_PLACEHOLDER)
            .into_owned();

        let probe = normalised.replacen(QUERY_PLACEHOLDER, "probe", 1);
        let url = Url::parse(&probe).map_err(|e| PatternError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(PatternError::InvalidUrl(raw.to_string()));
        }

        Ok(Self(normalised))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitutes the encoded query term into the placeholder.
    ///
    /// Spaces become `+` in the query string and `%20` in the path.
    #[must_use]
    pub fn render(&self, query: &str) -> String {
        let mut encoded: String =
            url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
        if self.placeholder_in_path() {
            // A literal `+` is already `%2B`, so every `+` left is a space.
            encoded = encoded.replace('+', "%20");
        }
        self.0.replacen(QUERY_PLACEHOLDER, &encoded, 1)
    }

    fn placeholder_in_path(&self) -> bool {
        match (self.0.find(QUERY_PLACEHOLDER), self.0.find('?')) {
            (Some(at), Some(query_start)) => at < query_start,
            (Some(_), None) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.render("probe"))
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: TemplateId,
    pub search_url_pattern: String,
    pub category_id: CategoryId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Template {
    pub fn pattern(&self) -> Result<SearchPattern, PatternError> {
        SearchPattern::parse(&self.search_url_pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_form_encoded_query() {
        let pattern = SearchPattern::parse("https://x.example/search?q={query}").unwrap();
        assert_eq!(
            pattern.render("gaming laptop"),
            "https://x.example/search?q=gaming+laptop"
        );
        assert_eq!(pattern.render("a&b"), "https://x.example/search?q=a%26b");
    }

    #[test]
    fn renders_percent_encoded_path_query() {
        let pattern = SearchPattern::parse("https://shop.example/find/{query}").unwrap();
        assert_eq!(
            pattern.render("gaming laptop"),
            "https://shop.example/find/gaming%20laptop"
        );
        assert_eq!(pattern.render("a+b/c"), "https://shop.example/find/a%2Bb%2Fc");

        let pattern = SearchPattern::parse("https://shop.example/s/{query}?sort=price").unwrap();
        assert_eq!(
            pattern.render("usb hub"),
            "https://shop.example/s/usb%20hub?sort=price"
        );
    }

    #[test]
    fn normalises_alternate_placeholders() {
        let pattern = SearchPattern::parse("https://shop.example/s?k={your_query}&ref=nav").unwrap();
        assert_eq!(pattern.as_str(), "https://shop.example/s?k={query}&ref=nav");

        let pattern = SearchPattern::parse(" https://shop.example/find/{q} ").unwrap();
        assert_eq!(pattern.as_str(), "https://shop.example/find/{query}");
    }

    #[test]
    fn rejects_missing_or_repeated_placeholders() {
        assert_eq!(
            SearchPattern::parse("https://x.example/search"),
            Err(PatternError::MissingPlaceholder)
        );
        assert_eq!(
            SearchPattern::parse("https://x.example/{query}?q={q}"),
            Err(PatternError::MultiplePlaceholders(2))
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            SearchPattern::parse("ftp://x.example/?q={query}"),
            Err(PatternError::InvalidUrl(_))
        ));
        assert!(matches!(
            SearchPattern::parse("/search?q={query}"),
            Err(PatternError::InvalidUrl(_))
        ));
    }

    #[test]
    fn exposes_host() {
        let pattern = SearchPattern::parse("https://www.x.example/search?q={query}").unwrap();
        assert_eq!(pattern.host().as_deref(), Some("www.x.example"));
    }
}
