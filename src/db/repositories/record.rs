use crate::domain::PairKey;
use crate::entities::{prelude::*, product_records};
use crate::models::record::NewProductRecord;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

const INSERT_CHUNK_ROWS: usize = 50;

pub struct RecordRepository {
    conn: DatabaseConnection,
}

impl RecordRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(ProductRecords::find().count(&self.conn).await?)
    }

    pub async fn count_for_pair(&self, pair: PairKey) -> Result<u64> {
        let count = ProductRecords::find()
            .filter(product_records::Column::SearchedProductId.eq(pair.product_id.value()))
            .filter(product_records::Column::TemplateId.eq(pair.template_id.value()))
            .count(&self.conn)
            .await?;
        Ok(count)
    }
}

fn to_active_model(record: NewProductRecord, at: DateTime<Utc>) -> product_records::ActiveModel {
    product_records::ActiveModel {
        platform_url: Set(record.platform_url),
        product_name: Set(record.product_name),
        original_price: Set(record.original_price),
        current_price: Set(record.current_price),
        product_url: Set(record.product_url),
        product_image_url: Set(record.product_image_url),
        description: Set(record.description),
        rating: Set(record.rating),
        reviews: Set(record.reviews),
        in_stock: Set(record.in_stock),
        brand: Set(record.brand),
        category_id: Set(record.category_id.value()),
        searched_product_id: Set(record.searched_product_id.value()),
        template_id: Set(record.template_id.value()),
        created_at: Set(at),
        ..Default::default()
    }
}

pub(crate) async fn insert_records<C: ConnectionTrait>(
    db: &C,
    records: Vec<NewProductRecord>,
    at: DateTime<Utc>,
) -> Result<u64, DbErr> {
    if records.is_empty() {
        return Ok(0);
    }

    let models: Vec<_> = records
        .into_iter()
        .map(|r| to_active_model(r, at))
        .collect();

    // 15 bound columns per row keeps a chunk under SQLite's 999 variables.
    let mut inserted = 0;
    for chunk in models.chunks(INSERT_CHUNK_ROWS) {
        inserted += ProductRecords::insert_many(chunk.to_vec())
            .exec_without_returning(db)
            .await?;
    }
    Ok(inserted)
}
