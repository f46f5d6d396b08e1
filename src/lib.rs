pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, TemplateCommands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_env_overrides();
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;

    let Some(command) = cli.command else {
        print_help();
        return Ok(());
    };

    match command {
        Commands::Daemon => run_daemon(config, prometheus_handle).await,
        Commands::Discover => cli::cmd_discover(&config).await,
        Commands::Extract => cli::cmd_extract(&config).await,
        Commands::Import { path } => cli::cmd_import(&config, &path).await,
        Commands::Status => cli::cmd_status(&config).await,
        Commands::Templates { command } => match command {
            TemplateCommands::List { category } => {
                cli::cmd_templates_list(&config, category.as_deref()).await
            }
            TemplateCommands::Disable { id } => {
                cli::cmd_templates_set_active(&config, id, false).await
            }
            TemplateCommands::Enable { id } => cli::cmd_templates_set_active(&config, id, true).await,
        },
        Commands::InitConfig => {
            if Config::create_default_if_missing()? {
                println!("Created config.toml with defaults");
            } else {
                println!("config.toml already exists");
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder
            .extra_field("version", env!("CARGO_PKG_VERSION"))?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "pricehound v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    config.validate_collaborators()?;

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let supervisor = shared.supervisor();
    let workers = supervisor.worker_names();

    if workers.is_empty() {
        anyhow::bail!("Both discovery and extraction are disabled; nothing to run");
    }
    info!("Supervising workers: {}", workers.join(", "));

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let addr = format!("{}:{}", config.server.bind_address, config.server.port);
        let app = api::router(api::create_app_state(
            Arc::clone(&shared),
            workers,
            prometheus_handle,
        ));
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        Some(tokio::spawn(async move {
            info!("Health API running at http://{}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C or send SIGTERM to stop.");

    supervisor
        .run(shutdown_signal())
        .await?;

    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

fn print_help() {
    println!("pricehound v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: pricehound <command>");
    println!();
    println!("Commands:");
    println!("  daemon              Run discovery and extraction continuously");
    println!("  discover            Run one template discovery cycle");
    println!("  extract             Run one product extraction cycle");
    println!("  import <file>       Import a category/product JSON catalog");
    println!("  status              Show catalog and ledger totals");
    println!("  templates list      List search templates");
    println!("  templates disable   Stop using a template");
    println!("  templates enable    Resume using a template");
    println!("  init-config         Create a default config.toml");
    println!();
    println!("Run 'pricehound --help' for details.");
}
