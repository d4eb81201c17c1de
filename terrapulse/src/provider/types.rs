//! Imagery provider trait and error classification.

use std::future::Future;

use chrono::NaiveDate;
use thiserror::Error;

use super::http::HttpFailure;
use crate::geo::{BoundingBox, IndexKind};
use crate::raster::RasterSample;

/// Errors from imagery operations, already classified for the task error
/// taxonomy. Messages are client-safe; raw upstream bodies stay in logs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The upstream has no usable scene for the area and window
    #[error("no usable satellite data for the requested area and dates")]
    NoData,

    /// Credentials were rejected. Deliberately carries no detail: the
    /// upstream response may echo parts of the credential exchange.
    #[error("imagery upstream rejected the configured credentials")]
    Auth,

    /// Network error, timeout, or upstream 5xx; retrying later may succeed
    #[error("transient imagery upstream failure: {0}")]
    Transient(String),

    /// The upstream accepted the request but returned something unusable
    #[error("invalid imagery upstream response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Default mapping from transport failures. Callers layer
    /// endpoint-specific rules (e.g. a 400 that means "no data") on top.
    pub(crate) fn from_http(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::TimedOut => Self::Transient("upstream request timed out".into()),
            HttpFailure::Network(message) => Self::Transient(message),
            HttpFailure::Status { code: 401 | 403, .. } => Self::Auth,
            HttpFailure::Status { code, .. } if code >= 500 => {
                Self::Transient(format!("upstream returned HTTP {code}"))
            }
            HttpFailure::Status { code, .. } => {
                Self::InvalidResponse(format!("unexpected HTTP {code}"))
            }
        }
    }
}

/// A satellite imagery source keyed by bounding box, date, and band script.
///
/// Implementations resolve the requested date to an actual acquisition
/// (search window, cloud filtering, mosaicking are theirs to decide) and
/// return either a per-pixel index raster or encoded true-color imagery.
pub trait ImageryProvider: Send + Sync {
    /// Fetches the per-pixel index raster for one date.
    fn fetch_index_raster(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
        kind: IndexKind,
    ) -> impl Future<Output = Result<RasterSample, ProviderError>> + Send;

    /// Fetches a true-color JPEG for one date.
    fn fetch_true_color(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
