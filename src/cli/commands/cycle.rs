//! One-off worker cycles

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::SharedState;

pub async fn cmd_discover(config: &Config) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.discovery.enabled = true;
    config.extraction.enabled = false;
    config.validate_collaborators()?;

    let state = SharedState::new(config).await?;
    let report = state
        .discovery_worker()
        .run_cycle(&CancellationToken::new())
        .await?;

    println!("Discovery cycle finished");
    println!("{:-<40}", "");
    println!("Categories seen:      {}", report.categories_seen);
    println!("Categories searched:  {}", report.categories_searched);
    println!("Sites found:          {}", report.sites_found);
    println!("Templates saved:      {}", report.templates_saved);
    println!("Already known:        {}", report.duplicates);
    println!("Rejected patterns:    {}", report.rejected_patterns);
    println!("Failures:             {}", report.failures);
    if report.quota_exhausted {
        println!();
        println!("Search quota exhausted; remaining categories were skipped.");
    }

    Ok(())
}

pub async fn cmd_extract(config: &Config) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.discovery.enabled = false;
    config.extraction.enabled = true;
    config.validate_collaborators()?;

    let state = SharedState::new(config).await?;
    let report = state
        .extraction_worker()
        .run_cycle(&CancellationToken::new())
        .await?;

    println!("Extraction cycle finished");
    println!("{:-<40}", "");
    println!("Products seen:     {}", report.products_seen);
    println!("Pairs considered:  {}", report.pairs_considered);
    println!("Skipped:           {}", report.skipped);
    println!("Attempted:         {}", report.attempted);
    println!("Succeeded:         {}", report.succeeded);
    println!("Failed:            {}", report.failed);
    println!("Conflicts:         {}", report.conflicts);
    println!("Records saved:     {}", report.records_saved);

    Ok(())
}
