//! Satellite imagery upstream abstraction.
//!
//! The worker consumes imagery through the [`ImageryProvider`] trait:
//! a bounding box and a date in, a raster sample (or true-color JPEG) or a
//! typed failure out. The production implementation talks to the Sentinel
//! Hub Process API; tests substitute stubs. The HTTP transport is itself a
//! trait ([`UpstreamHttp`]) so provider logic can be exercised against a
//! mock client.

mod http;
mod sentinel;
mod types;

pub use http::{HttpFailure, ReqwestHttp, UpstreamHttp};
pub use sentinel::SentinelHubProvider;
pub use types::{ImageryProvider, ProviderError};

#[cfg(test)]
pub(crate) use http::tests::MockHttp;
