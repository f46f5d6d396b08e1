use crate::domain::{CategoryId, ProductId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub latest_input_at: Option<DateTime<Utc>>,
    pub latest_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    /// Watermark: when a pair involving this product last succeeded.
    pub last_extracted_at: Option<DateTime<Utc>>,
}
