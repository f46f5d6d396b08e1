//! Catalog import command handler

use std::path::Path;

use crate::config::Config;
use crate::db::Store;
use crate::services::import_file;

pub async fn cmd_import(config: &Config, path: &str) -> anyhow::Result<()> {
    let catalog_path = Path::new(path);

    if !catalog_path.exists() {
        println!("Path does not exist: {}", path);
        return Ok(());
    }

    let store = Store::new(&config.general.database_path).await?;
    let summary = import_file(&store, catalog_path).await?;

    println!("Imported {}", path);
    println!("  Categories:        {}", summary.categories);
    println!("  Products added:    {}", summary.products_added);
    println!("  Already present:   {}", summary.products_existing);
    if summary.skipped_blank > 0 {
        println!("  Blank names:       {}", summary.skipped_blank);
    }

    Ok(())
}
