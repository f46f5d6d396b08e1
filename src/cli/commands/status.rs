use crate::config::Config;
use crate::db::Store;

pub async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let categories = store.list_categories().await?;
    let products = store.list_products().await?;
    let stats = store.ledger_stats().await?;

    if categories.is_empty() {
        println!("No categories yet.");
        println!();
        println!("Import a catalog with: pricehound import catalog.json");
        return Ok(());
    }

    println!("Categories ({} total, {} products)", categories.len(), products.len());
    println!("{:-<70}", "");

    for category in &categories {
        let product_count = products
            .iter()
            .filter(|p| p.category_id == category.id)
            .count();
        let active = store.count_active_templates(category.id).await?;
        let searched = category
            .latest_updated_at
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());

        println!("• {} [{} products, {} active templates]", category.name, product_count, active);
        println!("  ID: {} | Last searched: {}", category.id, searched);
    }

    println!();
    println!(
        "Ledger: {} pairs ({} succeeded, {} failed), {} records",
        stats.entries, stats.succeeded, stats.failed, stats.records
    );

    Ok(())
}
