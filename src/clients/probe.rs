use crate::constants::QUERY_PLACEHOLDER;
use crate::services::collaborators::{DeriveError, DerivedTemplate, TemplateDeriver};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Search routes common to shop platforms, tried in order after any form
/// found on the landing page.
const COMMON_ROUTES: &[(&str, &str)] = &[
    ("/search", "q"),
    ("/search", "query"),
    ("/s", "k"),
    ("/catalogsearch/result/", "q"),
    ("/search", "keyword"),
    ("/", "s"),
    ("/products", "search"),
];

const SEARCH_INPUT_NAMES: &[&str] = &[
    "q", "query", "search", "s", "k", "keyword", "keywords", "term", "text", "search_query",
];

fn form_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").expect("Invalid regex"))
}

fn input_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("Invalid regex"))
}

fn attr(tag: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?i)\b{name}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#);
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

/// Finds `(action, input name)` of the first form that looks like a site
/// search.
fn find_search_form(html: &str) -> Option<(String, String)> {
    for form in form_regex().captures_iter(html) {
        let form_attrs = form.get(1).map_or("", |m| m.as_str());
        let body = form.get(2).map_or("", |m| m.as_str());

        let method = attr(form_attrs, "method").unwrap_or_default();
        if method.eq_ignore_ascii_case("post") {
            continue;
        }

        for input in input_regex().captures_iter(body) {
            let input_attrs = input.get(1).map_or("", |m| m.as_str());
            let Some(name) = attr(input_attrs, "name") else {
                continue;
            };
            let kind = attr(input_attrs, "type").unwrap_or_default();
            if kind.eq_ignore_ascii_case("search")
                || SEARCH_INPUT_NAMES.contains(&name.to_ascii_lowercase().as_str())
            {
                let action = attr(form_attrs, "action").unwrap_or_default();
                return Some((action, name));
            }
        }
    }
    None
}

/// Turns a results URL into a pattern by replacing the query parameter
/// holding `sample_query` with the placeholder. Other parameters are dropped.
#[must_use]
pub fn pattern_from_results_url(results_url: &Url, sample_query: &str) -> Option<String> {
    let needle = sample_query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let param = results_url
        .query_pairs()
        .find(|(_, value)| value.to_lowercase().contains(&needle))
        .map(|(key, _)| key.into_owned())?;

    let host = results_url.host_str()?;
    let authority = match results_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let key: String = url::form_urlencoded::byte_serialize(param.as_bytes()).collect();

    Some(format!(
        "{}://{authority}{}?{key}={QUERY_PLACEHOLDER}",
        results_url.scheme(),
        results_url.path()
    ))
}

/// Derives templates by submitting the sample query to the site's search
/// and reading back the URL the site lands on.
#[derive(Clone)]
pub struct SearchFormProber {
    client: Client,
}

impl SearchFormProber {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    async fn try_search(&self, candidate: Url, sample_query: &str) -> Option<String> {
        let response = match self.client.get(candidate.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Search probe {} failed: {}", candidate, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("Search probe {} returned {}", candidate, response.status());
            return None;
        }
        pattern_from_results_url(response.url(), sample_query)
    }

    fn candidates(site: &Url, form: Option<(String, String)>, sample_query: &str) -> Vec<Url> {
        let mut urls = Vec::new();

        if let Some((action, name)) = form
            && let Ok(mut url) = site.join(if action.is_empty() { "." } else { action.as_str() })
        {
            url.set_query(None);
            url.query_pairs_mut().append_pair(&name, sample_query);
            urls.push(url);
        }

        for (path, param) in COMMON_ROUTES {
            if let Ok(mut url) = site.join(path) {
                url.query_pairs_mut().append_pair(param, sample_query);
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }

        urls
    }
}

#[async_trait::async_trait]
impl TemplateDeriver for SearchFormProber {
    async fn derive_template(
        &self,
        site_url: &str,
        sample_query: &str,
    ) -> Result<Option<DerivedTemplate>, DeriveError> {
        let site = Url::parse(site_url).map_err(|e| DeriveError::Other(e.to_string()))?;

        let landing = self
            .client
            .get(site.clone())
            .send()
            .await
            .map_err(|e| DeriveError::Unreachable(e.to_string()))?;
        let landed_on = landing.url().clone();
        let html = landing.text().await.unwrap_or_default();
        let form = find_search_form(&html);

        for candidate in Self::candidates(&landed_on, form, sample_query) {
            if let Some(pattern) = self.try_search(candidate, sample_query).await {
                debug!("Derived search pattern for {}: {}", site_url, pattern);
                return Ok(Some(DerivedTemplate {
                    search_url_pattern: pattern,
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_keeps_only_the_search_parameter() {
        let url = Url::parse("https://shop.example/search?ref=nav&q=gaming+laptop&page=1").unwrap();
        assert_eq!(
            pattern_from_results_url(&url, "gaming laptop").as_deref(),
            Some("https://shop.example/search?q={query}")
        );

        let url = Url::parse("http://localhost:8080/s?k=Laptop").unwrap();
        assert_eq!(
            pattern_from_results_url(&url, "laptop").as_deref(),
            Some("http://localhost:8080/s?k={query}")
        );
    }

    #[test]
    fn pattern_requires_the_query_in_the_url() {
        let url = Url::parse("https://shop.example/").unwrap();
        assert_eq!(pattern_from_results_url(&url, "laptop"), None);
    }

    #[test]
    fn finds_get_search_forms() {
        let html = r#"
            <form method="post" action="/login"><input name="q" type="text"></form>
            <form action='/catalog/find' role=search>
              <input type="hidden" name="lang" value="en">
              <input type="search" name="term" placeholder="Search">
            </form>
        "#;
        assert_eq!(
            find_search_form(html),
            Some(("/catalog/find".to_string(), "term".to_string()))
        );
        assert_eq!(find_search_form("<p>no forms</p>"), None);
    }

    #[test]
    fn candidates_start_with_the_discovered_form() {
        let site = Url::parse("https://shop.example/").unwrap();
        let urls = SearchFormProber::candidates(
            &site,
            Some(("/find".to_string(), "w".to_string())),
            "laptop",
        );
        assert_eq!(urls[0].as_str(), "https://shop.example/find?w=laptop");
        assert_eq!(urls[1].as_str(), "https://shop.example/search?q=laptop");
        assert_eq!(urls.len(), COMMON_ROUTES.len() + 1);
    }
}
