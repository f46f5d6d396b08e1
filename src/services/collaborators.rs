//! Contracts for the external systems the workers depend on.
//!
//! The workers never see HTTP, HTML or API keys; they see these traits and
//! their explicit result variants. Concrete adapters live in
//! [`crate::clients`], tests supply in-memory fakes.

use crate::models::record::ExtractedProduct;
use thiserror::Error;

/// A site returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCandidate {
    pub site_url: String,
    pub title: Option<String>,
}

impl SiteCandidate {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            title: None,
        }
    }
}

/// A search URL pattern as the deriver produced it, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTemplate {
    pub search_url_pattern: String,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The search API refuses further calls until its quota resets.
    #[error("Search quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Search API error: {0}")]
    Api(String),

    #[error("Search transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("Site unreachable: {0}")]
    Unreachable(String),

    #[error("Template derivation failed: {0}")]
    Other(String),
}

/// Result of one extraction call.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Success { products: Vec<ExtractedProduct> },
    Failure { reason: String },
}

impl ExtractionOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait SiteDiscovery: Send + Sync {
    /// Finds candidate shop sites for the given query terms.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::QuotaExhausted`] once the API quota is spent;
    /// callers stop the cycle and back off.
    async fn discover_sites(&self, query_terms: &str) -> Result<Vec<SiteCandidate>, DiscoveryError>;
}

#[async_trait::async_trait]
pub trait TemplateDeriver: Send + Sync {
    /// `Ok(None)` means the site has no usable search URL, which is not an
    /// error.
    async fn derive_template(
        &self,
        site_url: &str,
        sample_query: &str,
    ) -> Result<Option<DerivedTemplate>, DeriveError>;
}

#[async_trait::async_trait]
pub trait ProductExtractor: Send + Sync {
    async fn extract_products(&self, constructed_url: &str) -> ExtractionOutcome;
}
