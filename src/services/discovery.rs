//! Template discovery: finds search URL patterns for categories that do not
//! have enough active templates yet.

use crate::config::DiscoveryConfig;
use crate::db::Store;
use crate::models::catalog::{Category, Product};
use crate::models::template::SearchPattern;
use crate::services::collaborators::{
    DerivedTemplate, DiscoveryError, SiteCandidate, SiteDiscovery, TemplateDeriver,
};
use crate::services::supervisor::Worker;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub categories_seen: usize,
    pub categories_searched: usize,
    pub sites_found: usize,
    pub templates_saved: usize,
    pub duplicates: usize,
    pub rejected_patterns: usize,
    pub failures: usize,
    pub quota_exhausted: bool,
}

enum CategoryStep {
    Done,
    QuotaExhausted,
}

pub struct TemplateDiscoveryWorker {
    store: Store,
    sites: Arc<dyn SiteDiscovery>,
    deriver: Arc<dyn TemplateDeriver>,
    config: DiscoveryConfig,
}

impl TemplateDiscoveryWorker {
    #[must_use]
    pub fn new(
        store: Store,
        sites: Arc<dyn SiteDiscovery>,
        deriver: Arc<dyn TemplateDeriver>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            store,
            sites,
            deriver,
            config,
        }
    }

    /// One pass over every category.
    ///
    /// Collaborator failures are contained per category and per site; only
    /// store errors escape.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for category in self.store.list_categories().await? {
            if shutdown.is_cancelled() {
                break;
            }
            report.categories_seen += 1;

            let active = self.store.count_active_templates(category.id).await?;
            if active >= self.config.min_active_templates {
                debug!(category = %category.name, active, "Category has enough templates");
                continue;
            }

            report.categories_searched += 1;
            match self.process_category(&category, active, &mut report).await? {
                CategoryStep::Done => {}
                CategoryStep::QuotaExhausted => {
                    report.quota_exhausted = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn process_category(
        &self,
        category: &Category,
        active: u64,
        report: &mut DiscoveryReport,
    ) -> Result<CategoryStep> {
        let products = self.store.list_products_for_category(category.id).await?;
        let representative = representative_product(&products, active);
        let terms = query_terms(category, representative);
        let sample_query = representative.map_or(category.name.as_str(), |p| p.name.as_str());

        let candidates = match self.sites.discover_sites(&terms).await {
            Ok(candidates) => candidates,
            Err(DiscoveryError::QuotaExhausted(reason)) => {
                metrics::counter!("discovery_quota_exhausted_total").increment(1);
                warn!(
                    event = "discovery_quota_exhausted",
                    category = %category.name,
                    reason = %reason,
                    "Search quota exhausted, ending discovery cycle"
                );
                return Ok(CategoryStep::QuotaExhausted);
            }
            Err(e) => {
                report.failures += 1;
                warn!(category = %category.name, error = %e, "Site discovery failed");
                return Ok(CategoryStep::Done);
            }
        };

        let sites = distinct_sites(candidates, self.config.max_sites_per_category);
        report.sites_found += sites.len();
        info!(
            category = %category.name,
            query = %terms,
            sites = sites.len(),
            "Discovered candidate sites"
        );

        for site in &sites {
            match self.deriver.derive_template(&site.site_url, sample_query).await {
                Ok(Some(derived)) => self.save_template(category, &derived, report).await?,
                Ok(None) => debug!(site = %site.site_url, "No search pattern found"),
                Err(e) => {
                    report.failures += 1;
                    warn!(site = %site.site_url, error = %e, "Template derivation failed");
                }
            }
        }

        self.store.touch_category(category.id, Utc::now()).await?;
        Ok(CategoryStep::Done)
    }

    async fn save_template(
        &self,
        category: &Category,
        derived: &DerivedTemplate,
        report: &mut DiscoveryReport,
    ) -> Result<()> {
        let pattern = match SearchPattern::parse(&derived.search_url_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                report.rejected_patterns += 1;
                debug!(pattern = %derived.search_url_pattern, error = %e, "Rejected derived pattern");
                return Ok(());
            }
        };

        if self.store.upsert_template(category.id, &pattern).await? {
            report.templates_saved += 1;
            metrics::counter!("discovery_templates_saved_total").increment(1);
            info!(category = %category.name, pattern = %pattern, "Saved search template");
        } else {
            report.duplicates += 1;
            debug!(category = %category.name, pattern = %pattern, "Template already known");
        }

        Ok(())
    }

    #[must_use]
    pub const fn next_delay(&self, report: &DiscoveryReport) -> Duration {
        if report.quota_exhausted {
            self.config.quota_backoff()
        } else {
            self.config.poll_interval()
        }
    }
}

#[async_trait::async_trait]
impl Worker for TemplateDiscoveryWorker {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("Template discovery worker started");

        while !shutdown.is_cancelled() {
            let start = Instant::now();
            info!(event = "job_started", job_name = "discovery_cycle", "Starting discovery cycle");

            let report = self.run_cycle(&shutdown).await?;
            info!(
                event = "job_finished",
                job_name = "discovery_cycle",
                categories = report.categories_seen,
                searched = report.categories_searched,
                templates_saved = report.templates_saved,
                duplicates = report.duplicates,
                failures = report.failures,
                quota_exhausted = report.quota_exhausted,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Discovery cycle finished"
            );

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.next_delay(&report)) => {}
            }
        }

        info!("Template discovery worker stopped");
        Ok(())
    }
}

/// Rotates through the category's products so that each new attempt probes
/// the search engine with a different product.
fn representative_product(products: &[Product], active_templates: u64) -> Option<&Product> {
    if products.is_empty() {
        return None;
    }
    let len = u64::try_from(products.len()).unwrap_or(u64::MAX);
    let index = usize::try_from(active_templates % len).unwrap_or(0);
    products.get(index)
}

fn query_terms(category: &Category, representative: Option<&Product>) -> String {
    match representative {
        Some(product) => format!("{} {}", category.name, product.name),
        None => category.name.clone(),
    }
}

fn site_key(site_url: &str) -> Option<String> {
    let url = Url::parse(site_url).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Keeps the first candidate per host, in result order.
fn distinct_sites(candidates: Vec<SiteCandidate>, limit: usize) -> Vec<SiteCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| site_key(&c.site_url).is_some_and(|key| seen.insert(key)))
        .take(limit)
        .collect()
}
