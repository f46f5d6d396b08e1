use crate::domain::{CategoryId, TemplateId};
use crate::entities::{prelude::*, search_templates};
use crate::models::template::{SearchPattern, Template};
use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};

pub struct TemplateRepository {
    conn: DatabaseConnection,
}

impl TemplateRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(m: search_templates::Model) -> Template {
        Template {
            id: TemplateId::new(m.id),
            search_url_pattern: m.search_url_pattern,
            category_id: CategoryId::new(m.category_id),
            is_active: m.is_active,
            created_at: m.created_at,
        }
    }

    pub async fn active_for_category(&self, category_id: CategoryId) -> Result<Vec<Template>> {
        let rows = SearchTemplates::find()
            .filter(search_templates::Column::CategoryId.eq(category_id.value()))
            .filter(search_templates::Column::IsActive.eq(true))
            .order_by_asc(search_templates::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn count_active(&self, category_id: CategoryId) -> Result<u64> {
        let count = SearchTemplates::find()
            .filter(search_templates::Column::CategoryId.eq(category_id.value()))
            .filter(search_templates::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, category_id: Option<CategoryId>) -> Result<Vec<Template>> {
        let mut query = SearchTemplates::find();
        if let Some(category_id) = category_id {
            query = query.filter(search_templates::Column::CategoryId.eq(category_id.value()));
        }

        let rows = query
            .order_by_asc(search_templates::Column::CategoryId)
            .order_by_asc(search_templates::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    /// Inserts an active template. Returns `false` when the category already
    /// has the same pattern, whatever its active flag.
    pub async fn insert(&self, category_id: CategoryId, pattern: &SearchPattern) -> Result<bool> {
        let inserted = SearchTemplates::insert(search_templates::ActiveModel {
            search_url_pattern: Set(pattern.as_str().to_string()),
            category_id: Set(category_id.value()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                search_templates::Column::SearchUrlPattern,
                search_templates::Column::CategoryId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await?;

        Ok(inserted > 0)
    }

    pub async fn set_active(&self, id: TemplateId, active: bool) -> Result<bool> {
        let result = SearchTemplates::update_many()
            .col_expr(search_templates::Column::IsActive, Expr::value(active))
            .filter(search_templates::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
