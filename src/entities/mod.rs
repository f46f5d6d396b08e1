pub mod prelude;

pub mod categories;
pub mod extraction_ledger;
pub mod product_records;
pub mod products;
pub mod search_templates;
