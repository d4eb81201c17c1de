//! Default values and environment variable names for all settings.

/// Number of concurrent workers draining the task queue.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Result cache TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;

/// Age after which terminal task records are evicted, in seconds (24 hours).
pub const DEFAULT_TASK_HORIZON_SECS: u64 = 86_400;

/// Interval of the maintenance sweep, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Per-request timeout for upstream HTTP calls, in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Maximum acceptable cloud coverage, percent, for scene selection.
pub const DEFAULT_MAX_CLOUD_COVER: u8 = 30;

/// Scene selection order within the search window.
pub const DEFAULT_MOSAICKING_ORDER: &str = "leastCC";

/// Half-width of the acquisition search window around a requested date, in
/// days. Widening the window raises the chance of a cloud-free scene.
pub const DEFAULT_SEARCH_WINDOW_DAYS: i64 = 180;

/// Output raster edge length in pixels (width and height).
pub const DEFAULT_IMAGE_SIZE: u32 = 512;

/// Sentinel Hub OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://services.sentinel-hub.com/oauth/token";

/// Sentinel Hub Process API endpoint.
pub const DEFAULT_PROCESS_URL: &str = "https://services.sentinel-hub.com/api/v1/process";

/// Summarization model identifier.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

/// Summarization API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the imagery OAuth client id.
pub const ENV_SENTINEL_CLIENT_ID: &str = "SH_CLIENT_ID";

/// Environment variable holding the imagery OAuth client secret.
pub const ENV_SENTINEL_CLIENT_SECRET: &str = "SH_CLIENT_SECRET";

/// Environment variable holding the summarization API key.
pub const ENV_GEMINI_API_KEY: &str = "GOOGLE_API_KEY";
