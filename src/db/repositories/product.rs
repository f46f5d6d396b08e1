use crate::domain::{CategoryId, ProductId};
use crate::entities::{prelude::*, products};
use crate::models::catalog::Product;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};

pub struct ProductRepository {
    conn: DatabaseConnection,
}

impl ProductRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: products::Model) -> Product {
        Product {
            id: ProductId::new(m.id),
            name: m.name,
            category_id: CategoryId::new(m.category_id),
            last_extracted_at: m.last_extracted_at,
        }
    }

    /// Never-extracted products first, then oldest watermark, then id.
    pub async fn list(&self) -> Result<Vec<Product>> {
        let rows = Products::find()
            .order_by_asc(Expr::col(products::Column::LastExtractedAt).is_not_null())
            .order_by_asc(products::Column::LastExtractedAt)
            .order_by_asc(products::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_for_category(&self, category_id: CategoryId) -> Result<Vec<Product>> {
        let rows = Products::find()
            .filter(products::Column::CategoryId.eq(category_id.value()))
            .order_by_asc(products::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row = Products::find_by_id(id.value()).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    /// Returns `false` when the product already exists in the category.
    pub async fn add(&self, category_id: CategoryId, name: &str) -> Result<bool> {
        let inserted = Products::insert(products::ActiveModel {
            name: Set(name.trim().to_string()),
            category_id: Set(category_id.value()),
            last_extracted_at: Set(None),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([products::Column::Name, products::Column::CategoryId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await?;

        Ok(inserted > 0)
    }

    pub async fn update_watermark(&self, id: ProductId, at: DateTime<Utc>) -> Result<bool> {
        Ok(advance_watermark(&self.conn, id, at).await?)
    }
}

/// Moves the watermark forward only; an older `at` leaves it untouched.
pub(crate) async fn advance_watermark<C: ConnectionTrait>(
    db: &C,
    id: ProductId,
    at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result = Products::update_many()
        .col_expr(products::Column::LastExtractedAt, Expr::value(at))
        .filter(products::Column::Id.eq(id.value()))
        .filter(
            Condition::any()
                .add(products::Column::LastExtractedAt.is_null())
                .add(products::Column::LastExtractedAt.lt(at)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}
