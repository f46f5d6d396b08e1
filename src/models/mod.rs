pub mod catalog;
pub mod ledger;
pub mod record;
pub mod template;
