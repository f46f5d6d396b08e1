//! Product extraction: walks every (product, active template) pair, asks the
//! ledger whether the pair still needs work and records the outcome.

use crate::config::ExtractionConfig;
use crate::db::{Store, SuccessfulAttempt};
use crate::domain::{CategoryId, PairKey};
use crate::models::catalog::Product;
use crate::models::ledger::CommitOutcome;
use crate::models::record::RecordOrigin;
use crate::models::template::Template;
use crate::services::collaborators::{ExtractionOutcome, ProductExtractor};
use crate::services::ledger::RescanPolicy;
use crate::services::supervisor::Worker;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub products_seen: usize,
    pub pairs_considered: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successes discarded because another writer committed the pair first.
    pub conflicts: usize,
    pub records_saved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOutcome {
    Succeeded { saved: usize },
    Failed,
    Conflict,
}

impl PairOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "success",
            Self::Failed => "failure",
            Self::Conflict => "conflict",
        }
    }
}

pub struct ProductExtractionWorker {
    store: Store,
    extractor: Arc<dyn ProductExtractor>,
    config: ExtractionConfig,
    policy: RescanPolicy,
}

impl ProductExtractionWorker {
    #[must_use]
    pub fn new(store: Store, extractor: Arc<dyn ProductExtractor>, config: ExtractionConfig) -> Self {
        let policy = RescanPolicy::from_hours(config.rescan_after_hours);
        Self {
            store,
            extractor,
            config,
            policy,
        }
    }

    /// One pass over every pair. Cancellation is honoured between pairs.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<ExtractionReport> {
        let mut report = ExtractionReport::default();
        let mut templates_by_category: HashMap<CategoryId, Vec<Template>> = HashMap::new();

        'products: for product in self.store.list_products().await? {
            if shutdown.is_cancelled() {
                break;
            }
            report.products_seen += 1;

            if !templates_by_category.contains_key(&product.category_id) {
                let templates = self
                    .store
                    .active_templates_for_category(product.category_id)
                    .await?;
                templates_by_category.insert(product.category_id, templates);
            }
            let templates = templates_by_category
                .get(&product.category_id)
                .map_or(&[][..], Vec::as_slice);

            if templates.is_empty() {
                debug!(product = %product.name, "No active templates for product category");
                continue;
            }

            for template in templates {
                if shutdown.is_cancelled() {
                    break 'products;
                }
                report.pairs_considered += 1;

                let pair = PairKey::new(product.id, template.id);
                let entry = self.store.get_ledger_entry(pair).await?;
                let decision = self.policy.decide(entry.as_ref(), Utc::now());
                if !decision.should_attempt() {
                    report.skipped += 1;
                    continue;
                }

                report.attempted += 1;
                debug!(%pair, ?decision, "Attempting pair");
                let outcome = self.attempt_pair(&product, template).await?;
                metrics::counter!("extraction_pairs_total", "outcome" => outcome.label())
                    .increment(1);

                match outcome {
                    PairOutcome::Succeeded { saved } => {
                        report.succeeded += 1;
                        report.records_saved += saved;
                    }
                    PairOutcome::Failed => report.failed += 1,
                    PairOutcome::Conflict => report.conflicts += 1,
                }

                let delay = self.config.pair_delay();
                if !delay.is_zero() {
                    tokio::select! {
                        () = shutdown.cancelled() => break 'products,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(report)
    }

    async fn attempt_pair(&self, product: &Product, template: &Template) -> Result<PairOutcome> {
        let pair = PairKey::new(product.id, template.id);

        let pattern = match template.pattern() {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(%pair, pattern = %template.search_url_pattern, error = %e, "Stored template is not usable");
                self.store
                    .record_failure(pair, &template.search_url_pattern, Utc::now())
                    .await?;
                return Ok(PairOutcome::Failed);
            }
        };
        let url = pattern.render(&product.name);

        let timeout = self.config.request_timeout();
        let outcome = tokio::time::timeout(timeout, self.extractor.extract_products(&url))
            .await
            .unwrap_or_else(|_| {
                ExtractionOutcome::failure(format!("timed out after {}s", timeout.as_secs()))
            });

        let products = match outcome {
            ExtractionOutcome::Success { products } => products,
            ExtractionOutcome::Failure { reason } => {
                return self.fail_pair(pair, &url, &reason).await;
            }
        };

        let found = products.len();
        let origin = RecordOrigin {
            platform_url: &url,
            category_id: product.category_id,
            searched_product_id: product.id,
            template_id: template.id,
        };
        let records: Vec<_> = products
            .into_iter()
            .filter_map(|p| p.sanitize(origin))
            .collect();

        if records.is_empty() {
            let reason = format!("no usable products ({found} returned)");
            return self.fail_pair(pair, &url, &reason).await;
        }

        let saved = records.len();
        let attempt = SuccessfulAttempt {
            pair,
            constructed_url: url.clone(),
            products_found: found,
            records,
            extracted_at: Utc::now(),
        };

        match self
            .store
            .commit_success(attempt, self.policy.reclaim_before(Utc::now()))
            .await?
        {
            CommitOutcome::Committed => {
                metrics::counter!("extraction_records_saved_total")
                    .increment(u64::try_from(saved).unwrap_or(u64::MAX));
                info!(
                    event = "pair_extracted",
                    %pair,
                    url = %url,
                    found,
                    saved,
                    "Extracted products"
                );
                Ok(PairOutcome::Succeeded { saved })
            }
            CommitOutcome::AlreadyClaimed => {
                info!(%pair, "Pair was completed by another writer, discarding results");
                Ok(PairOutcome::Conflict)
            }
        }
    }

    async fn fail_pair(&self, pair: PairKey, url: &str, reason: &str) -> Result<PairOutcome> {
        warn!(event = "pair_failed", %pair, url = %url, reason = %reason, "Extraction failed");
        if !self.store.record_failure(pair, url, Utc::now()).await? {
            debug!(%pair, "Pair already holds a success, failure not recorded");
        }
        Ok(PairOutcome::Failed)
    }
}

#[async_trait::async_trait]
impl Worker for ProductExtractionWorker {
    fn name(&self) -> &'static str {
        "extraction"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            rescan_after_hours = ?self.config.rescan_after_hours,
            "Product extraction worker started"
        );

        while !shutdown.is_cancelled() {
            let start = Instant::now();
            info!(event = "job_started", job_name = "extraction_cycle", "Starting extraction cycle");

            let report = self.run_cycle(&shutdown).await?;
            info!(
                event = "job_finished",
                job_name = "extraction_cycle",
                pairs = report.pairs_considered,
                skipped = report.skipped,
                succeeded = report.succeeded,
                failed = report.failed,
                conflicts = report.conflicts,
                records_saved = report.records_saved,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Extraction cycle finished"
            );

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!("Product extraction worker stopped");
        Ok(())
    }
}
