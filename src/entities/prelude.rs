pub use super::categories::Entity as Categories;
pub use super::extraction_ledger::Entity as ExtractionLedger;
pub use super::product_records::Entity as ProductRecords;
pub use super::products::Entity as Products;
pub use super::search_templates::Entity as SearchTemplates;
