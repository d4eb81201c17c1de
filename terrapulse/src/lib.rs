//! Terrapulse - geospatial change-detection job service
//!
//! This library implements the job lifecycle and result-caching layer behind
//! a change-detection API: a submitted analysis request becomes a uniquely
//! identified task, a bounded worker pool drains the queue, results are
//! cached under a deterministic request fingerprint, and upstream failures
//! are classified without corrupting task state.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use terrapulse::config::{GeminiSettings, SentinelSettings, ServiceSettings};
//! use terrapulse::provider::{ReqwestHttp, SentinelHubProvider};
//! use terrapulse::service::AnalysisService;
//! use terrapulse::summary::GeminiSummarizer;
//!
//! let settings = ServiceSettings::default();
//! let http = ReqwestHttp::new(std::time::Duration::from_secs(60))?;
//! let imagery = SentinelHubProvider::new(http.clone(), SentinelSettings::from_env()?);
//! let summarizer = GeminiSummarizer::new(http, GeminiSettings::from_env()?);
//!
//! let service = AnalysisService::new(&settings, imagery, summarizer);
//! let task_id = service.submit(request)?;
//! // ... later ...
//! let snapshot = service.poll(task_id);
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod geo;
pub mod logging;
pub mod provider;
pub mod raster;
pub mod service;
pub mod store;
pub mod summary;
pub mod worker;

/// Version of the Terrapulse library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
