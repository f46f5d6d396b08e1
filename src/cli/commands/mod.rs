mod cycle;
mod import;
mod status;
mod templates;

pub use cycle::{cmd_discover, cmd_extract};
pub use import::cmd_import;
pub use status::cmd_status;
pub use templates::{cmd_templates_list, cmd_templates_set_active};
