//! Integration tests for the product extraction worker.
//!
//! Each test runs against its own temp-file SQLite store with a fake
//! extraction collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{SubsecRound, TimeDelta, Utc};
use pricehound::config::ExtractionConfig;
use pricehound::db::{Store, SuccessfulAttempt};
use pricehound::domain::{CategoryId, PairKey, ProductId, TemplateId};
use pricehound::models::ledger::CommitOutcome;
use pricehound::models::record::ExtractedProduct;
use pricehound::models::template::SearchPattern;
use pricehound::services::{ExtractionOutcome, ProductExtractionWorker, ProductExtractor};
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

async fn test_store() -> Store {
    let db_path =
        std::env::temp_dir().join(format!("pricehound-extract-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open store")
}

struct Seeded {
    category: CategoryId,
    product: ProductId,
    template: TemplateId,
}

async fn seed(store: &Store, category: &str, product: &str, pattern: &str) -> Seeded {
    let category = store.get_or_create_category(category).await.unwrap();
    store.add_product(category.id, product).await.unwrap();
    let product = store
        .list_products_for_category(category.id)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.name == product)
        .unwrap();

    let pattern = SearchPattern::parse(pattern).unwrap();
    store.upsert_template(category.id, &pattern).await.unwrap();
    let template = store
        .active_templates_for_category(category.id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.search_url_pattern == pattern.as_str())
        .unwrap();

    Seeded {
        category: category.id,
        product: product.id,
        template: template.id,
    }
}

fn listing(name: &str) -> ExtractedProduct {
    ExtractedProduct {
        product_name: Some(name.to_string()),
        product_url: Some(format!("https://x.example/p/{}", name.replace(' ', "-"))),
        current_price: Some(999.0),
        ..Default::default()
    }
}

fn config() -> ExtractionConfig {
    ExtractionConfig {
        request_timeout_seconds: 5,
        ..ExtractionConfig::default()
    }
}

/// Returns the same listings for every URL and counts calls.
struct FixedExtractor {
    products: Vec<ExtractedProduct>,
    calls: AtomicUsize,
}

impl FixedExtractor {
    fn new(products: Vec<ExtractedProduct>) -> Arc<Self> {
        Arc::new(Self {
            products,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProductExtractor for FixedExtractor {
    async fn extract_products(&self, _constructed_url: &str) -> ExtractionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExtractionOutcome::Success {
            products: self.products.clone(),
        }
    }
}

/// Never answers within the worker's timeout.
struct StalledExtractor;

#[async_trait::async_trait]
impl ProductExtractor for StalledExtractor {
    async fn extract_products(&self, _constructed_url: &str) -> ExtractionOutcome {
        tokio::time::sleep(Duration::from_secs(30)).await;
        ExtractionOutcome::Success { products: vec![] }
    }
}

/// Fails the first `failures` calls, then succeeds.
struct RecoveringExtractor {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ProductExtractor for RecoveringExtractor {
    async fn extract_products(&self, _constructed_url: &str) -> ExtractionOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ExtractionOutcome::failure("page did not render")
        } else {
            ExtractionOutcome::Success {
                products: vec![listing("Phone A")],
            }
        }
    }
}

/// Holds each caller until the barrier is full.
struct GatedExtractor {
    barrier: Barrier,
}

#[async_trait::async_trait]
impl ProductExtractor for GatedExtractor {
    async fn extract_products(&self, _constructed_url: &str) -> ExtractionOutcome {
        self.barrier.wait().await;
        ExtractionOutcome::Success {
            products: vec![listing("Laptop A"), listing("Laptop B")],
        }
    }
}

#[tokio::test]
async fn test_laptop_pair_is_extracted_once() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let extractor = FixedExtractor::new(vec![
        listing("Laptop A"),
        listing("Laptop B"),
        listing("Laptop C"),
    ]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let token = CancellationToken::new();

    let report = worker.run_cycle(&token).await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.records_saved, 3);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.products_found, 3);
    assert_eq!(entry.products_saved, 3);
    assert_eq!(entry.constructed_url, "https://x.example/search?q=laptop");
    assert_eq!(store.count_records_for_pair(pair).await.unwrap(), 3);

    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, Some(entry.extracted_at));

    let report = worker.run_cycle(&token).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(extractor.calls(), 1);
    assert_eq!(store.count_records().await.unwrap(), 3);
    assert_eq!(store.get_ledger_entry(pair).await.unwrap().unwrap(), entry);
}

#[tokio::test]
async fn test_large_result_is_saved_in_one_commit() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let listings: Vec<_> = (0..3000).map(|i| listing(&format!("Laptop {i}"))).collect();
    let extractor = FixedExtractor::new(listings);
    let worker = ProductExtractionWorker::new(store.clone(), extractor, config());

    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.records_saved, 3000);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.products_found, 3000);
    assert_eq!(entry.products_saved, 3000);
    assert_eq!(store.count_records_for_pair(pair).await.unwrap(), 3000);

    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, Some(entry.extracted_at));
}

#[tokio::test]
async fn test_loosely_typed_listings_are_kept() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "phone",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let listings: Vec<ExtractedProduct> = serde_json::from_str(
        r#"[
            {"title":"Phone A","url":"https://x.example/p/a","price":"299.50","rating":"4.5"},
            {"title":"Phone B","url":"https://x.example/p/b","review_count":12.0},
            {"title":"Phone C","price":"n/a"}
        ]"#,
    )
    .unwrap();
    let worker = ProductExtractionWorker::new(store.clone(), FixedExtractor::new(listings), config());

    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.succeeded, 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.products_found, 3);
    assert_eq!(entry.products_saved, 2);
    assert_eq!(store.count_records_for_pair(pair).await.unwrap(), 2);
}

#[tokio::test]
async fn test_timed_out_pair_is_failed_and_retried() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "phone",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let worker = ProductExtractionWorker::new(
        store.clone(),
        Arc::new(StalledExtractor),
        ExtractionConfig {
            request_timeout_seconds: 1,
            ..ExtractionConfig::default()
        },
    );
    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.failed, 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(!entry.success);
    assert_eq!(entry.products_found, 0);
    assert_eq!(entry.products_saved, 0);
    assert_eq!(store.count_records().await.unwrap(), 0);

    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, None);

    // The failed pair is attempted again on the next cycle.
    let extractor = FixedExtractor::new(vec![listing("Phone A")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(extractor.calls(), 1);
    assert_eq!(report.succeeded, 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn test_failures_retry_until_success_then_stick() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "phone",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let extractor = Arc::new(RecoveringExtractor {
        failures: 2,
        calls: AtomicUsize::new(0),
    });
    let worker = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let token = CancellationToken::new();

    for _ in 0..2 {
        let report = worker.run_cycle(&token).await.unwrap();
        assert_eq!(report.failed, 1);
    }
    let report = worker.run_cycle(&token).await.unwrap();
    assert_eq!(report.succeeded, 1);

    for _ in 0..3 {
        worker.run_cycle(&token).await.unwrap();
    }

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.attempts, 3);
}

#[tokio::test]
async fn test_failure_never_overwrites_success() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let extractor = FixedExtractor::new(vec![listing("Laptop A")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor, config());
    worker.run_cycle(&CancellationToken::new()).await.unwrap();
    let before = store.get_ledger_entry(pair).await.unwrap().unwrap();

    let written = store
        .record_failure(pair, "https://x.example/search?q=laptop", Utc::now())
        .await
        .unwrap();
    assert!(!written);
    assert_eq!(store.get_ledger_entry(pair).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_unusable_listings_are_counted_but_not_saved() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let mut nameless = listing("ignored");
    nameless.product_name = None;
    let mut no_link = listing("Laptop Z");
    no_link.product_url = Some("  ".to_string());

    let extractor = FixedExtractor::new(vec![listing("Laptop A"), nameless, no_link, listing("Laptop B")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor, config());
    worker.run_cycle(&CancellationToken::new()).await.unwrap();

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.products_found, 4);
    assert_eq!(entry.products_saved, 2);
    assert!(entry.products_saved <= entry.products_found);
    assert_eq!(store.count_records_for_pair(pair).await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_results_count_as_failure() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let worker = ProductExtractionWorker::new(store.clone(), FixedExtractor::new(vec![]), config());
    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.failed, 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(!entry.success);
    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, None);
}

#[tokio::test]
async fn test_watermark_only_moves_forward() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;

    let later = Utc::now().trunc_subsecs(0);
    let earlier = later - TimeDelta::hours(2);

    assert!(store.update_product_watermark(seeded.product, later).await.unwrap());
    assert!(!store.update_product_watermark(seeded.product, earlier).await.unwrap());

    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, Some(later));

    // A commit stamped earlier than the current watermark leaves it alone.
    let commit = store
        .commit_success(
            SuccessfulAttempt {
                pair: PairKey::new(seeded.product, seeded.template),
                constructed_url: "https://x.example/search?q=laptop".to_string(),
                products_found: 0,
                records: vec![],
                extracted_at: earlier,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(commit, CommitOutcome::Committed);

    let product = store.get_product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.last_extracted_at, Some(later));
}

#[tokio::test]
async fn test_restart_resumes_without_duplicates() {
    let store = test_store().await;
    let electronics = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    store.add_product(electronics.category, "phone").await.unwrap();

    let extractor = FixedExtractor::new(vec![listing("Item A"), listing("Item B")]);
    let first = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    first.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(extractor.calls(), 2);
    assert_eq!(store.count_records().await.unwrap(), 4);
    drop(first);

    let restarted = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let report = restarted.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(extractor.calls(), 2);
    assert_eq!(store.count_records().await.unwrap(), 4);
}

#[tokio::test]
async fn test_inactive_templates_are_not_used() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    assert!(store.set_template_active(seeded.template, false).await.unwrap());

    let extractor = FixedExtractor::new(vec![listing("Laptop A")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.pairs_considered, 0);
    assert_eq!(extractor.calls(), 0);
    assert!(
        store
            .get_ledger_entry(PairKey::new(seeded.product, seeded.template))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_every_template_of_the_category_is_paired() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let second = SearchPattern::parse("https://y.example/find?k={query}").unwrap();
    store.upsert_template(seeded.category, &second).await.unwrap();
    // A template from another category is never paired with this product.
    seed(&store, "Garden", "hose", "https://z.example/s?q={query}").await;

    let extractor = FixedExtractor::new(vec![listing("Item")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor, config());
    let report = worker.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.pairs_considered, 3);

    let entries = store.ledger_for_product(seeded.product).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.constructed_url == "https://y.example/find?k=laptop"));
}

#[tokio::test]
async fn test_stale_success_is_rescanned_when_enabled() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let old = Utc::now() - TimeDelta::hours(48);
    store
        .commit_success(
            SuccessfulAttempt {
                pair,
                constructed_url: "https://x.example/search?q=laptop".to_string(),
                products_found: 0,
                records: vec![],
                extracted_at: old,
            },
            None,
        )
        .await
        .unwrap();

    let extractor = FixedExtractor::new(vec![listing("Laptop A")]);
    let terminal = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    terminal.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(extractor.calls(), 0);

    let rescanning = ProductExtractionWorker::new(
        store.clone(),
        extractor.clone(),
        ExtractionConfig {
            rescan_after_hours: Some(24),
            ..config()
        },
    );
    let report = rescanning.run_cycle(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(extractor.calls(), 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.extracted_at > old);
    assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn test_concurrent_workers_keep_one_result() {
    let store = test_store().await;
    let seeded = seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;
    let pair = PairKey::new(seeded.product, seeded.template);

    let extractor = Arc::new(GatedExtractor {
        barrier: Barrier::new(2),
    });
    let a = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let b = ProductExtractionWorker::new(store.clone(), extractor, config());

    let token = CancellationToken::new();
    let (ra, rb) = tokio::join!(a.run_cycle(&token), b.run_cycle(&token));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.succeeded + rb.succeeded, 1);
    assert_eq!(ra.conflicts + rb.conflicts, 1);

    let entry = store.get_ledger_entry(pair).await.unwrap().unwrap();
    assert!(entry.success);
    assert_eq!(entry.attempts, 1);
    assert_eq!(store.count_records_for_pair(pair).await.unwrap(), 2);
    assert_eq!(store.ledger_stats().await.unwrap().entries, 1);
}

#[tokio::test]
async fn test_cancelled_cycle_attempts_nothing() {
    let store = test_store().await;
    seed(
        &store,
        "Electronics",
        "laptop",
        "https://x.example/search?q={query}",
    )
    .await;

    let extractor = FixedExtractor::new(vec![listing("Laptop A")]);
    let worker = ProductExtractionWorker::new(store.clone(), extractor.clone(), config());
    let token = CancellationToken::new();
    token.cancel();

    let report = worker.run_cycle(&token).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(extractor.calls(), 0);
}
