use crate::config::ExtractorConfig;
use crate::models::record::ExtractedProduct;
use crate::services::collaborators::{ExtractionOutcome, ProductExtractor};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_items: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractResponse {
    Envelope {
        #[serde(default = "default_true")]
        success: bool,
        #[serde(default)]
        products: Vec<ExtractedProduct>,
        #[serde(default)]
        error: Option<String>,
    },
    Bare(Vec<ExtractedProduct>),
}

const fn default_true() -> bool {
    true
}

impl From<ExtractResponse> for ExtractionOutcome {
    fn from(response: ExtractResponse) -> Self {
        match response {
            ExtractResponse::Bare(products) => Self::Success { products },
            ExtractResponse::Envelope {
                success: true,
                products,
                ..
            } => Self::Success { products },
            ExtractResponse::Envelope { error, .. } => {
                Self::failure(error.unwrap_or_else(|| "extractor reported failure".to_string()))
            }
        }
    }
}

/// Client for an HTTP extraction service that renders a search results page
/// and returns the listings it found.
#[derive(Clone)]
pub struct RemoteExtractor {
    client: Client,
    config: ExtractorConfig,
}

impl RemoteExtractor {
    #[must_use]
    pub const fn new(client: Client, config: ExtractorConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl ProductExtractor for RemoteExtractor {
    async fn extract_products(&self, constructed_url: &str) -> ExtractionOutcome {
        let body = ExtractRequest {
            url: constructed_url,
            max_items: Some(self.config.max_items).filter(|n| *n > 0),
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return ExtractionOutcome::failure(format!("extractor unreachable: {e}")),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return ExtractionOutcome::failure(format!("reading extractor response: {e}")),
        };

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return ExtractionOutcome::failure(format!("extractor returned {status}: {snippet}"));
        }

        debug!("Extractor answered for {} ({} bytes)", constructed_url, text.len());
        parse_response(&text)
    }
}

fn parse_response(text: &str) -> ExtractionOutcome {
    match serde_json::from_str::<ExtractResponse>(text) {
        Ok(response) => response.into(),
        Err(e) => ExtractionOutcome::failure(format!("malformed extractor response: {e}")),
    }
}
