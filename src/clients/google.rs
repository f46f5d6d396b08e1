use crate::config::SearchConfig;
use crate::constants::limits::MAX_SEARCH_RESULTS;
use crate::services::collaborators::{DiscoveryError, SiteCandidate, SiteDiscovery};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

const DOMAIN_KEYWORDS: &[&str] = &[
    "shop", "store", "buy", "cart", "checkout", "ecommerce", "marketplace", "retail", "purchase",
    "merchant", "seller", "selling", "vendor", "trade", "commerce", "mall", "boutique", "bazaar",
    "mart", "sale", "deals", "offer", "discount", "outlet", "warehouse", "market",
];

const PATH_KEYWORDS: &[&str] = &[
    "/product", "/shop", "/store", "/item", "/buy", "/purchase", "/order", "/cart", "/checkout",
    "/basket", "/bag", "/wishlist", "/compare", "/listing", "/catalog", "/category", "/deal",
    "/sale", "/collections",
];

const TEXT_SIGNALS: &[&str] = &[
    "shop", "store", "buy", "sell", "purchase", "add to cart", "in stock", "free shipping",
    "price", "order", "checkout", "cart", "sale", "deal", "discount", "ships", "$", "₹", "rs.",
    "usd", "eur", "gbp",
];

const SHOP_TLDS: &[&str] = &[
    ".store", ".shop", ".shopping", ".boutique", ".market", ".mall", ".sale",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Google Custom Search JSON API client that keeps only shop-like results.
#[derive(Clone)]
pub struct GoogleSearchClient {
    client: Client,
    config: SearchConfig,
}

impl GoogleSearchClient {
    #[must_use]
    pub const fn new(client: Client, config: SearchConfig) -> Self {
        Self { client, config }
    }

    fn request_url(&self, query: &str) -> Result<Url, DiscoveryError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| DiscoveryError::Api(format!("invalid base URL: {e}")))?;
        let num = self.config.results_per_query.clamp(1, MAX_SEARCH_RESULTS);

        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("key", &self.config.api_key)
            .append_pair("cx", &self.config.engine_id)
            .append_pair("num", &num.to_string());
        if !self.config.country.is_empty() {
            url.query_pairs_mut().append_pair("gl", &self.config.country);
        }

        Ok(url)
    }
}

#[async_trait::async_trait]
impl SiteDiscovery for GoogleSearchClient {
    async fn discover_sites(&self, query_terms: &str) -> Result<Vec<SiteCandidate>, DiscoveryError> {
        let url = self.request_url(query_terms)?;
        debug!("Searching Google Custom Search for: {}", query_terms);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| DiscoveryError::Api(e.to_string()))?;

        let total = parsed.items.len();
        let sites: Vec<SiteCandidate> = parsed
            .items
            .into_iter()
            .filter(looks_like_shop)
            .filter_map(|item| {
                let root = site_root(&item.link)?;
                Some(SiteCandidate {
                    site_url: root,
                    title: Some(item.title).filter(|t| !t.is_empty()),
                })
            })
            .collect();

        debug!("Google returned {} results, {} look like shops", total, sites.len());
        Ok(sites)
    }
}

fn classify_error(status: StatusCode, body: &str) -> DiscoveryError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;
    let message = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", error.message)
    };

    let quota_reason = error.status == "RESOURCE_EXHAUSTED"
        || error.errors.iter().any(|d| {
            let reason = d.reason.to_ascii_lowercase();
            reason.contains("quota") || reason.contains("ratelimit") || reason.contains("dailylimit")
        });

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota_reason) {
        DiscoveryError::QuotaExhausted(message)
    } else {
        DiscoveryError::Api(message)
    }
}

fn looks_like_shop(item: &SearchItem) -> bool {
    let Ok(url) = Url::parse(&item.link) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let path = url.path().to_ascii_lowercase();
    let text = format!("{} {}", item.title, item.snippet).to_lowercase();

    SHOP_TLDS.iter().any(|tld| host.ends_with(tld))
        || DOMAIN_KEYWORDS.iter().any(|k| host.contains(k))
        || PATH_KEYWORDS.iter().any(|k| path.contains(k))
        || TEXT_SIGNALS.iter().any(|s| text.contains(s))
}

/// `https://shop.example/p/123?x=1` becomes `https://shop.example/`.
fn site_root(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}/", url.scheme()),
        None => format!("{}://{host}/", url.scheme()),
    })
}
