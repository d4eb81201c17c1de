//! Generative summarization upstream.
//!
//! The comparative-imagery mode sends the before/after scenes to a
//! generative model with a fixed comparison prompt and records the returned
//! text. The prompt carries a version tag that participates in the cache
//! fingerprint, so revising the prompt invalidates cached summaries instead
//! of silently reusing them.

use std::future::Future;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::GeminiSettings;
use crate::provider::{HttpFailure, UpstreamHttp};

/// Fixed prompt sent with every comparative-imagery request.
pub const COMPARISON_PROMPT: &str = "Analyze the provided satellite image(s) of this geographical area. \
If two images are provided, compare them and describe any significant changes related to \
urban development, deforestation, agricultural expansion, water body changes, \
or other notable human activities or natural shifts. Provide a concise summary of your observations.";

/// Version tag for [`COMPARISON_PROMPT`]. Bumped whenever the prompt
/// changes so cached results are not reused across prompt revisions.
pub const PROMPT_VERSION_TAG: &str = "compare-prompt-v1";

/// Errors from summarization, classified for the task error taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SummaryError {
    /// The API key was rejected. Carries no detail by design.
    #[error("summarization upstream rejected the configured API key")]
    Auth,

    /// Network error, timeout, or upstream 5xx
    #[error("transient summarization upstream failure: {0}")]
    Transient(String),

    /// The upstream accepted the request but the response held no usable text
    #[error("invalid summarization response: {0}")]
    InvalidResponse(String),
}

/// An image attached inline to a summarization request.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// MIME type of the encoded image
    pub mime_type: &'static str,
    /// Base64-encoded image bytes
    pub data: String,
}

impl InlineImage {
    /// Wraps raw JPEG bytes for inline transfer.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            mime_type: "image/jpeg",
            data: BASE64.encode(bytes),
        }
    }
}

/// A text-generation upstream that can describe a set of images.
pub trait Summarizer: Send + Sync {
    /// Describes the images according to the prompt.
    fn describe(
        &self,
        images: &[InlineImage],
        prompt: &str,
    ) -> impl Future<Output = Result<String, SummaryError>> + Send;

    /// Upstream name for logging and identification.
    fn name(&self) -> &str;
}

/// Gemini `generateContent` summarizer, generic over the HTTP transport.
pub struct GeminiSummarizer<C: UpstreamHttp> {
    http: C,
    settings: GeminiSettings,
}

impl<C: UpstreamHttp> GeminiSummarizer<C> {
    /// Creates a summarizer with the given transport and settings.
    pub fn new(http: C, settings: GeminiSettings) -> Self {
        Self { http, settings }
    }

    /// Request URL. Carries the API key as a query parameter, so it must
    /// never be echoed into errors or logs.
    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url, self.settings.model, self.settings.api_key
        )
    }

    fn build_payload(images: &[InlineImage], prompt: &str) -> serde_json::Value {
        let mut parts = vec![json!({ "text": prompt })];
        for image in images {
            parts.push(json!({
                "inlineData": { "mimeType": image.mime_type, "data": image.data }
            }));
        }
        json!({ "contents": [{ "parts": parts }] })
    }
}

impl<C: UpstreamHttp> Summarizer for GeminiSummarizer<C> {
    async fn describe(
        &self,
        images: &[InlineImage],
        prompt: &str,
    ) -> Result<String, SummaryError> {
        let payload = Self::build_payload(images, prompt);
        let body = self
            .http
            .post_json(&self.request_url(), &payload)
            .await
            .map_err(classify_failure)?;

        let response: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| SummaryError::InvalidResponse(format!("malformed response body: {e}")))?;

        let text = response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(SummaryError::InvalidResponse(
                "model content is empty or malformed".into(),
            ));
        }

        debug!(images = images.len(), chars = text.len(), "Generated summary");
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

fn classify_failure(failure: HttpFailure) -> SummaryError {
    match failure {
        HttpFailure::TimedOut => SummaryError::Transient("upstream request timed out".into()),
        HttpFailure::Network(message) => SummaryError::Transient(message),
        HttpFailure::Status { code: 401 | 403, .. } => SummaryError::Auth,
        HttpFailure::Status { code, .. } if code == 429 || code >= 500 => {
            SummaryError::Transient(format!("upstream returned HTTP {code}"))
        }
        HttpFailure::Status { code, .. } => {
            SummaryError::InvalidResponse(format!("unexpected HTTP {code}"))
        }
    }
}
