use crate::domain::{CategoryId, PairKey, ProductId, TemplateId};
use crate::models::catalog::{Category, Product};
use crate::models::ledger::{CommitOutcome, LedgerEntry, LedgerStats, SuccessCounts};
use crate::models::record::NewProductRecord;
use crate::models::template::{SearchPattern, Template};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
    TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub mod migrator;
pub mod repositories;

/// Everything one successful pair attempt writes.
#[derive(Debug, Clone)]
pub struct SuccessfulAttempt {
    pub pair: PairKey,
    pub constructed_url: String,
    pub products_found: usize,
    pub records: Vec<NewProductRecord>,
    pub extracted_at: DateTime<Utc>,
}

#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn category_repo(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    fn product_repo(&self) -> repositories::product::ProductRepository {
        repositories::product::ProductRepository::new(self.conn.clone())
    }

    fn template_repo(&self) -> repositories::template::TemplateRepository {
        repositories::template::TemplateRepository::new(self.conn.clone())
    }

    fn record_repo(&self) -> repositories::record::RecordRepository {
        repositories::record::RecordRepository::new(self.conn.clone())
    }

    fn ledger_repo(&self) -> repositories::ledger::LedgerRepository {
        repositories::ledger::LedgerRepository::new(self.conn.clone())
    }

    // Categories

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.category_repo().list().await
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.category_repo().get(id).await
    }

    pub async fn find_category(&self, name: &str) -> Result<Option<Category>> {
        self.category_repo().find_by_name(name).await
    }

    pub async fn get_or_create_category(&self, name: &str) -> Result<Category> {
        self.category_repo().get_or_create(name).await
    }

    /// Marks the category as processed by discovery.
    pub async fn touch_category(&self, id: CategoryId, at: DateTime<Utc>) -> Result<()> {
        self.category_repo().touch_updated(id, at).await
    }

    pub async fn mark_category_input(&self, id: CategoryId, at: DateTime<Utc>) -> Result<()> {
        self.category_repo().touch_input(id, at).await
    }

    // Products

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        self.product_repo().list().await
    }

    pub async fn list_products_for_category(&self, category_id: CategoryId) -> Result<Vec<Product>> {
        self.product_repo().list_for_category(category_id).await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        self.product_repo().get(id).await
    }

    pub async fn add_product(&self, category_id: CategoryId, name: &str) -> Result<bool> {
        self.product_repo().add(category_id, name).await
    }

    pub async fn update_product_watermark(&self, id: ProductId, at: DateTime<Utc>) -> Result<bool> {
        self.product_repo().update_watermark(id, at).await
    }

    // Templates

    pub async fn active_templates_for_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Template>> {
        self.template_repo().active_for_category(category_id).await
    }

    pub async fn count_active_templates(&self, category_id: CategoryId) -> Result<u64> {
        self.template_repo().count_active(category_id).await
    }

    pub async fn list_templates(&self, category_id: Option<CategoryId>) -> Result<Vec<Template>> {
        self.template_repo().list(category_id).await
    }

    /// Idempotent insert; `false` means the pattern was already known.
    pub async fn upsert_template(
        &self,
        category_id: CategoryId,
        pattern: &SearchPattern,
    ) -> Result<bool> {
        self.template_repo().insert(category_id, pattern).await
    }

    pub async fn set_template_active(&self, id: TemplateId, active: bool) -> Result<bool> {
        self.template_repo().set_active(id, active).await
    }

    // Ledger

    pub async fn get_ledger_entry(&self, pair: PairKey) -> Result<Option<LedgerEntry>> {
        self.ledger_repo().get(pair).await
    }

    pub async fn ledger_for_product(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>> {
        self.ledger_repo().list_for_product(product_id).await
    }

    pub async fn record_failure(
        &self,
        pair: PairKey,
        constructed_url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.ledger_repo()
            .record_failure(pair, constructed_url, at)
            .await
    }

    /// Writes the ledger claim, the records and the watermark as one unit.
    ///
    /// The ledger write goes first so the transaction takes the write lock
    /// before anything else; if the claim lands on nothing the whole unit is
    /// rolled back and [`CommitOutcome::AlreadyClaimed`] returned.
    pub async fn commit_success(
        &self,
        attempt: SuccessfulAttempt,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<CommitOutcome> {
        let SuccessfulAttempt {
            pair,
            constructed_url,
            products_found,
            records,
            extracted_at,
        } = attempt;
        let counts = SuccessCounts::new(products_found, records.len());

        let txn = self.conn.begin().await?;

        let claimed = match repositories::ledger::claim_success(
            &txn,
            pair,
            &constructed_url,
            counts,
            extracted_at,
            reclaim_before,
        )
        .await
        {
            Ok(rows) => rows > 0,
            Err(e) if is_unique_violation(&e) => false,
            Err(e) => return Err(e.into()),
        };

        if !claimed {
            txn.rollback().await?;
            debug!(%pair, "Pair already claimed by another writer");
            return Ok(CommitOutcome::AlreadyClaimed);
        }

        repositories::record::insert_records(&txn, records, extracted_at).await?;
        repositories::product::advance_watermark(&txn, pair.product_id, extracted_at).await?;

        txn.commit().await?;
        Ok(CommitOutcome::Committed)
    }

    pub async fn count_records(&self) -> Result<u64> {
        self.record_repo().count().await
    }

    pub async fn count_records_for_pair(&self, pair: PairKey) -> Result<u64> {
        self.record_repo().count_for_pair(pair).await
    }

    pub async fn ledger_stats(&self) -> Result<LedgerStats> {
        let ledger = self.ledger_repo();
        Ok(LedgerStats {
            entries: ledger.count().await?,
            succeeded: ledger.count_by_success(true).await?,
            failed: ledger.count_by_success(false).await?,
            records: self.record_repo().count().await?,
        })
    }
}
