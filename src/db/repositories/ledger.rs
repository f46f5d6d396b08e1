use crate::domain::{PairKey, ProductId, TemplateId};
use crate::entities::{extraction_ledger, prelude::*};
use crate::models::ledger::{LedgerEntry, SuccessCounts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict, SimpleExpr},
};

pub struct LedgerRepository {
    conn: DatabaseConnection,
}

impl LedgerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: extraction_ledger::Model) -> LedgerEntry {
        LedgerEntry {
            id: m.id,
            pair: PairKey::new(ProductId::new(m.product_id), TemplateId::new(m.template_id)),
            constructed_url: m.constructed_url,
            products_found: m.products_found,
            products_saved: m.products_saved,
            success: m.success,
            attempts: m.attempts,
            extracted_at: m.extracted_at,
        }
    }

    pub async fn get(&self, pair: PairKey) -> Result<Option<LedgerEntry>> {
        let row = ExtractionLedger::find()
            .filter(extraction_ledger::Column::ProductId.eq(pair.product_id.value()))
            .filter(extraction_ledger::Column::TemplateId.eq(pair.template_id.value()))
            .one(&self.conn)
            .await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<LedgerEntry>> {
        let rows = ExtractionLedger::find()
            .filter(extraction_ledger::Column::ProductId.eq(product_id.value()))
            .order_by_asc(extraction_ledger::Column::TemplateId)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(ExtractionLedger::find().count(&self.conn).await?)
    }

    pub async fn count_by_success(&self, success: bool) -> Result<u64> {
        let count = ExtractionLedger::find()
            .filter(extraction_ledger::Column::Success.eq(success))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    /// Records a failed attempt. Returns `false` when the pair already holds
    /// a success, which is left as it was.
    pub async fn record_failure(
        &self,
        pair: PairKey,
        constructed_url: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let written = upsert_entry(
            &self.conn,
            pair,
            constructed_url,
            None,
            at,
            Expr::col((ExtractionLedger, extraction_ledger::Column::Success)).eq(false),
        )
        .await?;

        Ok(written > 0)
    }
}

/// Claims the pair for a successful attempt.
///
/// The write only lands when the pair has no entry, holds a failure, or
/// (with `reclaim_before`) holds a success older than the cutoff. Zero rows
/// affected means another writer got there first.
pub(crate) async fn claim_success<C: ConnectionTrait>(
    db: &C,
    pair: PairKey,
    constructed_url: &str,
    counts: SuccessCounts,
    at: DateTime<Utc>,
    reclaim_before: Option<DateTime<Utc>>,
) -> Result<u64, DbErr> {
    let mut claimable = Expr::col((ExtractionLedger, extraction_ledger::Column::Success)).eq(false);
    if let Some(cutoff) = reclaim_before {
        claimable = claimable
            .or(Expr::col((ExtractionLedger, extraction_ledger::Column::ExtractedAt)).lt(cutoff));
    }

    upsert_entry(db, pair, constructed_url, Some(counts), at, claimable).await
}

async fn upsert_entry<C: ConnectionTrait>(
    db: &C,
    pair: PairKey,
    constructed_url: &str,
    counts: Option<SuccessCounts>,
    at: DateTime<Utc>,
    only_if: SimpleExpr,
) -> Result<u64, DbErr> {
    let counts_or_zero = counts.unwrap_or(SuccessCounts { found: 0, saved: 0 });

    let model = extraction_ledger::ActiveModel {
        product_id: Set(pair.product_id.value()),
        template_id: Set(pair.template_id.value()),
        constructed_url: Set(constructed_url.to_string()),
        products_found: Set(counts_or_zero.found),
        products_saved: Set(counts_or_zero.saved),
        success: Set(counts.is_some()),
        attempts: Set(1),
        extracted_at: Set(at),
        ..Default::default()
    };

    ExtractionLedger::insert(model)
        .on_conflict(
            OnConflict::columns([
                extraction_ledger::Column::ProductId,
                extraction_ledger::Column::TemplateId,
            ])
            .update_columns([
                extraction_ledger::Column::ConstructedUrl,
                extraction_ledger::Column::ProductsFound,
                extraction_ledger::Column::ProductsSaved,
                extraction_ledger::Column::Success,
                extraction_ledger::Column::ExtractedAt,
            ])
            .value(
                extraction_ledger::Column::Attempts,
                Expr::col((ExtractionLedger, extraction_ledger::Column::Attempts)).add(1),
            )
            .action_and_where(only_if)
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
}
