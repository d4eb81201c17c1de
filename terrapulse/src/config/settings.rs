//! Settings structs for the service and its upstream clients.
//!
//! Pure data types with no parsing logic beyond reading credentials from
//! the environment.

use std::env;
use std::time::Duration;

use thiserror::Error;

use super::defaults::*;

/// Configuration errors raised while assembling settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A required credential environment variable is unset or empty
    #[error("environment variable {0} is not set")]
    MissingCredential(&'static str),
}

/// Core service configuration: worker pool and retention behavior.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// TTL applied to cached results
    pub cache_ttl: Duration,
    /// Age at which terminal task records become evictable
    pub task_horizon: Duration,
    /// Interval between maintenance sweeps
    pub sweep_interval: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            task_horizon: Duration::from_secs(DEFAULT_TASK_HORIZON_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Imagery upstream configuration.
///
/// The scene-selection knobs (`max_cloud_cover`, `mosaicking_order`,
/// `search_window_days`) tune how the upstream resolves a requested date to
/// an actual acquisition; they are not part of the analysis contract.
#[derive(Debug, Clone)]
pub struct SentinelSettings {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// Process API endpoint
    pub process_url: String,
    /// Maximum acceptable cloud coverage, percent
    pub max_cloud_cover: u8,
    /// Scene ordering within the search window
    pub mosaicking_order: String,
    /// Half-width of the acquisition search window, days
    pub search_window_days: i64,
    /// Output raster width, pixels
    pub image_width: u32,
    /// Output raster height, pixels
    pub image_height: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl SentinelSettings {
    /// Builds settings with credentials from `SH_CLIENT_ID` /
    /// `SH_CLIENT_SECRET` and defaults for everything else.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: required_env(ENV_SENTINEL_CLIENT_ID)?,
            client_secret: required_env(ENV_SENTINEL_CLIENT_SECRET)?,
            ..Self::with_credentials(String::new(), String::new())
        })
    }

    /// Builds settings with explicit credentials and defaults for
    /// everything else. Useful in tests and embedded setups.
    pub fn with_credentials(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            process_url: DEFAULT_PROCESS_URL.to_string(),
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
            mosaicking_order: DEFAULT_MOSAICKING_ORDER.to_string(),
            search_window_days: DEFAULT_SEARCH_WINDOW_DAYS,
            image_width: DEFAULT_IMAGE_SIZE,
            image_height: DEFAULT_IMAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

/// Summarization upstream configuration.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// API key appended to the request URL
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GeminiSettings {
    /// Builds settings with the API key from `GOOGLE_API_KEY` and defaults
    /// for everything else.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: required_env(ENV_GEMINI_API_KEY)?,
            ..Self::default()
        })
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}
