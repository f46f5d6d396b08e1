pub mod category;
pub mod ledger;
pub mod product;
pub mod record;
pub mod template;
