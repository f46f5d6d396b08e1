//! Catalog import from `{"category": ["product", ...]}` documents.

use crate::db::Store;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub type CatalogDocument = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub categories: usize,
    pub products_added: usize,
    pub products_existing: usize,
    pub skipped_blank: usize,
}

pub fn parse_catalog(json: &str) -> Result<CatalogDocument> {
    serde_json::from_str(json).context("Catalog must be a JSON object of category -> [product]")
}

pub async fn import_file(store: &Store, path: &Path) -> Result<ImportSummary> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let document = parse_catalog(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;
    import_catalog(store, &document).await
}

/// Idempotent: importing the same document twice adds nothing the second
/// time. A category whose import added products gets `latest_input_at`
/// bumped.
pub async fn import_catalog(store: &Store, document: &CatalogDocument) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for (category_name, products) in document {
        let category_name = category_name.trim();
        if category_name.is_empty() {
            summary.skipped_blank += 1;
            continue;
        }

        let category = store.get_or_create_category(category_name).await?;
        summary.categories += 1;

        let mut added = 0;
        for name in products.iter().map(|p| p.trim()) {
            if name.is_empty() {
                summary.skipped_blank += 1;
                continue;
            }
            if store.add_product(category.id, name).await? {
                added += 1;
            } else {
                summary.products_existing += 1;
            }
        }

        if added > 0 {
            store.mark_category_input(category.id, Utc::now()).await?;
        }
        summary.products_added += added;

        info!(category = %category.name, added, "Imported catalog category");
    }

    Ok(summary)
}
