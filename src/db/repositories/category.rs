use crate::domain::CategoryId;
use crate::entities::{categories, prelude::*};
use crate::models::catalog::Category;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: categories::Model) -> Category {
        Category {
            id: CategoryId::new(m.id),
            name: m.name,
            latest_input_at: m.latest_input_at,
            latest_updated_at: m.latest_updated_at,
        }
    }

    /// Least recently processed first; never-processed categories sort
    /// ahead of everything else.
    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = Categories::find()
            .order_by_asc(Expr::col(categories::Column::LatestUpdatedAt).is_not_null())
            .order_by_asc(categories::Column::LatestUpdatedAt)
            .order_by_asc(categories::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = Categories::find_by_id(id.value()).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = Categories::find()
            .filter(categories::Column::Name.eq(name))
            .one(&self.conn)
            .await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn get_or_create(&self, name: &str) -> Result<Category> {
        let name = name.trim();

        Categories::insert(categories::ActiveModel {
            name: Set(name.to_string()),
            latest_input_at: Set(None),
            latest_updated_at: Set(None),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(categories::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await?;

        self.find_by_name(name)
            .await?
            .with_context(|| format!("category {name:?} missing after insert"))
    }

    pub async fn touch_updated(&self, id: CategoryId, at: DateTime<Utc>) -> Result<()> {
        Categories::update_many()
            .col_expr(categories::Column::LatestUpdatedAt, Expr::value(at))
            .filter(categories::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn touch_input(&self, id: CategoryId, at: DateTime<Utc>) -> Result<()> {
        Categories::update_many()
            .col_expr(categories::Column::LatestInputAt, Expr::value(at))
            .filter(categories::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
