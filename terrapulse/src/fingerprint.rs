//! Deterministic request fingerprints for result caching.
//!
//! The fingerprint is a pure function of the semantically relevant request
//! fields: bounding box edges, both dates, the analysis kind, and the fixed
//! prompt version tag. Nothing non-deterministic (wall-clock time, request
//! ordering) participates, so two textually different but semantically
//! identical requests collide to the same cache entry. Box edges are hashed
//! as their IEEE-754 bit patterns, which makes `0.50` and `0.5` (the same
//! f64 after parsing) indistinguishable by construction.

use sha2::{Digest, Sha256};

use crate::geo::AnalysisRequest;
use crate::summary::PROMPT_VERSION_TAG;

/// Separator between hashed fields, so adjacent fields cannot alias.
const FIELD_SEPARATOR: &[u8] = b"|";

/// SHA-256 digest identifying a semantically unique request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the digest as lowercase hex.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the cache fingerprint for a request.
pub fn fingerprint(request: &AnalysisRequest) -> Fingerprint {
    let mut hasher = Sha256::new();

    for edge in request.bbox.to_wsen() {
        hasher.update(edge.to_le_bytes());
        hasher.update(FIELD_SEPARATOR);
    }
    hasher.update(request.from_date.to_string().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(request.to_date.to_string().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(request.kind.as_str().as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(PROMPT_VERSION_TAG.as_bytes());

    Fingerprint(format!("{:x}", hasher.finalize()))
}
