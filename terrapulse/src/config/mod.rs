//! Service configuration.
//!
//! Settings are plain structs with sensible defaults; only upstream
//! credentials come from the environment. Upstream query behavior that the
//! providers do not contractually guarantee (cloud-cover threshold,
//! mosaicking order, how far the acquisition search window is widened) is
//! deliberately configuration, not code.

mod defaults;
mod settings;

pub use defaults::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_IMAGE_SIZE,
    DEFAULT_MAX_CLOUD_COVER, DEFAULT_MOSAICKING_ORDER, DEFAULT_PROCESS_URL,
    DEFAULT_SEARCH_WINDOW_DAYS, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TASK_HORIZON_SECS,
    DEFAULT_TOKEN_URL, DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_WORKER_COUNT, ENV_GEMINI_API_KEY,
    ENV_SENTINEL_CLIENT_ID, ENV_SENTINEL_CLIENT_SECRET,
};
pub use settings::{ConfigError, GeminiSettings, SentinelSettings, ServiceSettings};
