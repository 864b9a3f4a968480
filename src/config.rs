use std::time::Duration;

use serde::Deserialize;

use crate::services::pipeline::PipelineSettings;
use crate::services::poster_validator::TimeoutPolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Movies REST API base URL
    #[serde(default = "default_movies_api_url")]
    pub movies_api_url: String,

    /// Cloud auth/favorites store base URL
    #[serde(default = "default_cloud_api_url")]
    pub cloud_api_url: String,

    /// Cloud project identifier, sent with every cloud request
    #[serde(default)]
    pub cloud_project_id: String,

    /// Database holding the favorites collection
    #[serde(default = "default_cloud_database_id")]
    pub cloud_database_id: String,

    /// Favorites collection
    #[serde(default = "default_cloud_collection_id")]
    pub cloud_collection_id: String,

    /// Redis connection URL used for local key-based persistence
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Movies shown per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Candidates requested for the landing page before poster filtering
    #[serde(default = "default_landing_pool_size")]
    pub landing_pool_size: usize,

    /// Concurrent detail requests per hydration batch
    #[serde(default = "default_hydration_batch_size")]
    pub hydration_batch_size: usize,

    /// Upper bound for a single poster validation
    #[serde(default = "default_poster_timeout_ms")]
    pub poster_timeout_ms: u64,

    /// Quiet period before search/genre input triggers a fetch
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Exclude posters that time out instead of assuming they load
    #[serde(default)]
    pub strict_poster_timeout: bool,

    /// Default tracing filter when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_movies_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cloud_api_url() -> String {
    "http://localhost:8090/v1".to_string()
}

fn default_cloud_database_id() -> String {
    "reelscout".to_string()
}

fn default_cloud_collection_id() -> String {
    "favorites".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_page_size() -> usize {
    15
}

fn default_landing_pool_size() -> usize {
    30
}

fn default_hydration_batch_size() -> usize {
    5
}

fn default_poster_timeout_ms() -> u64 {
    1500
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_log_filter() -> String {
    "reelscout=info".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("PAGE_SIZE must be greater than zero");
        }
        if self.hydration_batch_size == 0 {
            anyhow::bail!("HYDRATION_BATCH_SIZE must be greater than zero");
        }
        if self.landing_pool_size < self.page_size {
            anyhow::bail!("LANDING_POOL_SIZE must be at least PAGE_SIZE");
        }
        Ok(())
    }

    /// Pipeline tuning derived from this configuration
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            page_size: self.page_size,
            landing_pool_size: self.landing_pool_size,
            hydration_batch_size: self.hydration_batch_size,
            poster_timeout: Duration::from_millis(self.poster_timeout_ms),
            timeout_policy: if self.strict_poster_timeout {
                TimeoutPolicy::Exclude
            } else {
                TimeoutPolicy::AssumeValid
            },
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
