use sea_orm::entity::prelude::*;

/// One product listing found on a search results page. Append-only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub platform_url: String,
    pub product_name: String,
    pub original_price: Option<String>,
    pub current_price: Option<f64>,
    pub product_url: String,
    pub product_image_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub in_stock: Option<bool>,
    pub brand: Option<String>,
    pub category_id: i32,
    pub searched_product_id: i32,
    pub template_id: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
