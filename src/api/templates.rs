use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, TemplateDto};
use crate::domain::{ProductId, TemplateId};
use crate::models::ledger::LedgerEntry;

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// `GET /api/templates?category=<name>`
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<ApiResponse<Vec<TemplateDto>>>, ApiError> {
    let store = state.store();

    let category_id = match query.category.as_deref().map(str::trim) {
        None => None,
        Some("") => return Err(ApiError::validation("category must not be blank")),
        Some(name) => Some(
            store
                .find_category(name)
                .await?
                .ok_or_else(|| ApiError::not_found("Category", name))?
                .id,
        ),
    };

    let templates = store.list_templates(category_id).await?;
    Ok(Json(ApiResponse::success(
        templates.into_iter().map(TemplateDto::from).collect(),
    )))
}

/// `PUT /api/templates/{id}/active`
pub async fn set_template_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let updated = id >= 0
        && state
            .store()
            .set_template_active(TemplateId::new(id), request.active)
            .await?;

    if !updated {
        return Err(ApiError::not_found("Template", id));
    }

    Ok(Json(ApiResponse::success(())))
}

/// `GET /api/products/{id}/ledger`
pub async fn product_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<LedgerEntry>>>, ApiError> {
    if id < 0 {
        return Err(ApiError::not_found("Product", id));
    }
    let product_id = ProductId::new(id);
    if state.store().get_product(product_id).await?.is_none() {
        return Err(ApiError::not_found("Product", id));
    }

    let entries = state.store().ledger_for_product(product_id).await?;
    Ok(Json(ApiResponse::success(entries)))
}
