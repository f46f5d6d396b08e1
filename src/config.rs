use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub discovery: DiscoveryConfig,

    pub extraction: ExtractionConfig,

    pub supervisor: SupervisorConfig,

    pub search: SearchConfig,

    pub extractor: ExtractorConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/pricehound.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,

    pub poll_interval_seconds: u64,

    /// Categories with fewer active templates than this are searched.
    pub min_active_templates: u64,

    pub max_sites_per_category: usize,

    /// Wait before the next cycle once the search quota is spent.
    pub quota_backoff_seconds: u64,

    /// Timeout for each request the search-form prober makes.
    pub probe_timeout_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 300,
            min_active_templates: 3,
            max_sites_per_category: 5,
            quota_backoff_seconds: 3600,
            probe_timeout_seconds: 15,
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub const fn quota_backoff(&self) -> Duration {
        Duration::from_secs(self.quota_backoff_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,

    pub poll_interval_seconds: u64,

    /// Upper bound on a single extraction call; a timeout counts as a
    /// failed attempt.
    pub request_timeout_seconds: u64,

    /// Pause between two pair attempts.
    pub pair_delay_ms: u64,

    /// When set, a successful pair older than this becomes eligible for
    /// extraction again. Unset means a success is final.
    pub rescan_after_hours: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 900,
            request_timeout_seconds: 120,
            pair_delay_ms: 0,
            rescan_after_hours: None,
        }
    }
}

impl ExtractionConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    #[must_use]
    pub const fn pair_delay(&self) -> Duration {
        Duration::from_millis(self.pair_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub restart_backoff_seconds: u64,

    pub shutdown_grace_seconds: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_backoff_seconds: 30,
            shutdown_grace_seconds: 30,
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub const fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff_seconds)
    }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Google Custom Search credentials and request shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: String,

    pub engine_id: String,

    pub base_url: String,

    /// Two-letter country code passed as `gl`.
    pub country: String,

    pub results_per_query: u32,

    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            country: "us".to_string(),
            results_per_query: 10,
            timeout_seconds: 30,
        }
    }
}

/// Remote extraction service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub url: String,

    pub api_key: Option<String>,

    /// Listings requested per page; `0` lets the service decide.
    pub max_items: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub bind_address: String,

    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 6790,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "pricehound".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

const ENV_SEARCH_API_KEY: &str = "PRICEHOUND_SEARCH_API_KEY";
const ENV_SEARCH_ENGINE_ID: &str = "PRICEHOUND_SEARCH_ENGINE_ID";
const ENV_EXTRACTOR_URL: &str = "PRICEHOUND_EXTRACTOR_URL";
const ENV_DATABASE_URL: &str = "PRICEHOUND_DATABASE_URL";

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pricehound").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".pricehound").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Secrets usually come from the environment (or `.env`) rather than
    /// the config file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_SEARCH_API_KEY) {
            self.search.api_key = v;
        }
        if let Some(v) = get(ENV_SEARCH_ENGINE_ID) {
            self.search.engine_id = v;
        }
        if let Some(v) = get(ENV_EXTRACTOR_URL) {
            self.extractor.url = v;
        }
        if let Some(v) = get(ENV_DATABASE_URL) {
            self.general.database_path = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.trim().is_empty() {
            anyhow::bail!("general.database_path cannot be empty");
        }

        if self.discovery.poll_interval_seconds == 0 {
            anyhow::bail!("discovery.poll_interval_seconds must be > 0");
        }

        if self.extraction.poll_interval_seconds == 0 {
            anyhow::bail!("extraction.poll_interval_seconds must be > 0");
        }

        if self.extraction.request_timeout_seconds == 0 {
            anyhow::bail!("extraction.request_timeout_seconds must be > 0");
        }

        if self.extraction.rescan_after_hours == Some(0) {
            anyhow::bail!("extraction.rescan_after_hours must be > 0 when set");
        }

        if self.supervisor.restart_backoff_seconds == 0 {
            anyhow::bail!("supervisor.restart_backoff_seconds must be > 0");
        }

        Url::parse(&self.search.base_url)
            .with_context(|| format!("Invalid search.base_url: {}", self.search.base_url))?;

        if !self.extractor.url.is_empty() {
            Url::parse(&self.extractor.url)
                .with_context(|| format!("Invalid extractor.url: {}", self.extractor.url))?;
        }

        Ok(())
    }

    /// Checks the credentials the enabled workers need before any of them
    /// starts.
    pub fn validate_collaborators(&self) -> Result<()> {
        if self.discovery.enabled {
            if self.search.api_key.trim().is_empty() {
                anyhow::bail!(
                    "search.api_key is required for discovery (or set {ENV_SEARCH_API_KEY})"
                );
            }
            if self.search.engine_id.trim().is_empty() {
                anyhow::bail!(
                    "search.engine_id is required for discovery (or set {ENV_SEARCH_ENGINE_ID})"
                );
            }
        }

        if self.extraction.enabled && self.extractor.url.trim().is_empty() {
            anyhow::bail!("extractor.url is required for extraction (or set {ENV_EXTRACTOR_URL})");
        }

        Ok(())
    }
}
