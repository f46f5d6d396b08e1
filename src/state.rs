use std::sync::Arc;
use std::time::Duration;

use crate::clients::{GoogleSearchClient, RemoteExtractor, SearchFormProber};
use crate::config::Config;
use crate::constants::{USER_AGENT, intervals::HTTP_CONNECT_TIMEOUT};
use crate::db::Store;
use crate::services::{
    ProductExtractionWorker, ProductExtractor, SiteDiscovery, Supervisor, TemplateDeriver,
    TemplateDiscoveryWorker,
};

/// Build an HTTP client for one collaborator.
/// Each adapter gets its own so its timeout matches its config section.
pub fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub sites: Arc<dyn SiteDiscovery>,

    pub deriver: Arc<dyn TemplateDeriver>,

    pub extractor: Arc<dyn ProductExtractor>,
}

impl SharedState {
    /// Opens the store and builds the production collaborators.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let search_client = build_shared_http_client(config.search.timeout_seconds)?;
        let probe_client = build_shared_http_client(config.discovery.probe_timeout_seconds)?;
        let extractor_client = build_shared_http_client(config.extraction.request_timeout_seconds)?;

        let sites = Arc::new(GoogleSearchClient::new(search_client, config.search.clone()));
        let deriver = Arc::new(SearchFormProber::new(probe_client));
        let extractor = Arc::new(RemoteExtractor::new(
            extractor_client,
            config.extractor.clone(),
        ));

        Ok(Self::with_collaborators(config, store, sites, deriver, extractor))
    }

    /// Assemble state around an existing store and collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: Config,
        store: Store,
        sites: Arc<dyn SiteDiscovery>,
        deriver: Arc<dyn TemplateDeriver>,
        extractor: Arc<dyn ProductExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            sites,
            deriver,
            extractor,
        }
    }

    #[must_use]
    pub fn discovery_worker(&self) -> TemplateDiscoveryWorker {
        TemplateDiscoveryWorker::new(
            self.store.clone(),
            Arc::clone(&self.sites),
            Arc::clone(&self.deriver),
            self.config.discovery.clone(),
        )
    }

    #[must_use]
    pub fn extraction_worker(&self) -> ProductExtractionWorker {
        ProductExtractionWorker::new(
            self.store.clone(),
            Arc::clone(&self.extractor),
            self.config.extraction.clone(),
        )
    }

    /// A supervisor holding every worker enabled in config.
    #[must_use]
    pub fn supervisor(&self) -> Supervisor {
        let mut supervisor = Supervisor::from_config(&self.config.supervisor);
        if self.config.discovery.enabled {
            supervisor = supervisor.with_worker(Arc::new(self.discovery_worker()));
        }
        if self.config.extraction.enabled {
            supervisor = supervisor.with_worker(Arc::new(self.extraction_worker()));
        }
        supervisor
    }
}
