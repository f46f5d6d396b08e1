use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "extraction_ledger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_id: i32,
    pub template_id: i32,
    pub constructed_url: String,
    pub products_found: i32,
    pub products_saved: i32,
    pub success: bool,
    pub attempts: i32,
    pub extracted_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Products,
    #[sea_orm(
        belongs_to = "super::search_templates::Entity",
        from = "Column::TemplateId",
        to = "super::search_templates::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SearchTemplates,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::search_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SearchTemplates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
