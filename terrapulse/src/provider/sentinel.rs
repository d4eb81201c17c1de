//! Sentinel Hub Process API provider.
//!
//! Fetches Sentinel-2 L2A scenes through the Process API. A requested date
//! is widened into a configurable search window and the least-cloudy scene
//! within it is selected, so a single cloudy acquisition does not doom the
//! analysis. OAuth client-credentials tokens are cached in-process and
//! refreshed shortly before expiry.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::http::{HttpFailure, UpstreamHttp};
use super::types::{ImageryProvider, ProviderError};
use crate::config::SentinelSettings;
use crate::geo::{BoundingBox, IndexKind};
use crate::raster::RasterSample;

/// Reuse a cached token only while it has at least this much validity left.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Slack subtracted from the upstream-reported token lifetime.
const TOKEN_EXPIRY_SLACK: u64 = 60;

/// NDVI band script: red/near-infrared ratio with the scene classification
/// cloud classes (8, 9, 10) masked out. Emits one UINT8 band where 0 is the
/// no-data sentinel and 1..=255 spans index values -1..=1.
const NDVI_EVALSCRIPT: &str = r#"
//VERSION=3
function setup() {
    return { input: ["B04", "B08", "SCL"], output: { bands: 1, sampleType: "UINT8" } };
}
function evaluatePixel(sample) {
    if ([8, 9, 10].includes(sample.SCL)) { return [0]; }
    if (sample.B08 + sample.B04 === 0) { return [0]; }
    var index = (sample.B08 - sample.B04) / (sample.B08 + sample.B04);
    return [Math.round((Math.min(Math.max(index, -1), 1) + 1) * 127) + 1];
}
"#;

/// NDWI band script: green/near-infrared ratio, same masking and encoding
/// as the NDVI script.
const NDWI_EVALSCRIPT: &str = r#"
//VERSION=3
function setup() {
    return { input: ["B03", "B08", "SCL"], output: { bands: 1, sampleType: "UINT8" } };
}
function evaluatePixel(sample) {
    if ([8, 9, 10].includes(sample.SCL)) { return [0]; }
    if (sample.B08 + sample.B03 === 0) { return [0]; }
    var index = (sample.B03 - sample.B08) / (sample.B03 + sample.B08);
    return [Math.round((Math.min(Math.max(index, -1), 1) + 1) * 127) + 1];
}
"#;

/// True-color band script with brightness scaling suited to Sentinel-2
/// reflectance values.
const TRUE_COLOR_EVALSCRIPT: &str = r#"
//VERSION=3
function setup() {
    return { input: ["B04", "B03", "B02"], output: { bands: 3, sampleType: "UINT8" } };
}
function evaluatePixel(sample) {
    const factor = 3.0;
    let red = Math.min(Math.max(sample.B04 / 10000 * factor, 0), 1);
    let green = Math.min(Math.max(sample.B03 / 10000 * factor, 0), 1);
    let blue = Math.min(Math.max(sample.B02 / 10000 * factor, 0), 1);
    return [red * 255, green * 255, blue * 255];
}
"#;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Sentinel Hub imagery provider, generic over the HTTP transport.
pub struct SentinelHubProvider<C: UpstreamHttp> {
    http: C,
    settings: SentinelSettings,
    token: Mutex<Option<CachedToken>>,
}

impl<C: UpstreamHttp> SentinelHubProvider<C> {
    /// Creates a provider with the given transport and settings.
    pub fn new(http: C, settings: SentinelSettings) -> Self {
        Self {
            http,
            settings,
            token: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a fresh one when the cached
    /// token is absent or close to expiry.
    ///
    /// The lock is held across the refresh so concurrent workers do not
    /// race duplicate token requests.
    async fn ensure_token(&self) -> Result<String, ProviderError> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let body = self
            .http
            .post_form(
                &self.settings.token_url,
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                ],
            )
            .await
            .map_err(classify_token_failure)?;

        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("malformed token response: {e}")))?;

        let lifetime = response.expires_in.saturating_sub(TOKEN_EXPIRY_SLACK);
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        };
        debug!(lifetime_secs = lifetime, "Refreshed imagery access token");

        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    /// Widens the requested date into the configured search window.
    fn time_range(&self, date: NaiveDate) -> (String, String) {
        let window = chrono::Duration::days(self.settings.search_window_days);
        let from = date - window;
        let to = date + window;
        (
            format!("{from}T00:00:00Z"),
            format!("{to}T23:59:59Z"),
        )
    }

    /// Builds the Process API request body for one scene.
    fn process_payload(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
        evalscript: &str,
        mime_type: &str,
    ) -> serde_json::Value {
        let (from, to) = self.time_range(date);
        json!({
            "input": {
                "bounds": {
                    "bbox": bbox.to_wsen(),
                    "properties": { "crs": "http://www.opengis.net/def/crs/EPSG/0/4326" }
                },
                "data": [{
                    "type": "sentinel-2-l2a",
                    "dataFilter": {
                        "timeRange": { "from": from, "to": to },
                        "mosaickingOrder": self.settings.mosaicking_order.as_str(),
                        "maxcc": self.settings.max_cloud_cover
                    }
                }]
            },
            "output": {
                "width": self.settings.image_width,
                "height": self.settings.image_height,
                "responses": [{
                    "identifier": "default",
                    "format": { "type": mime_type }
                }]
            },
            "evalscript": evalscript
        })
    }

    async fn process_request(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        let token = self.ensure_token().await?;
        self.http
            .post_json_with_bearer(&self.settings.process_url, &token, payload)
            .await
            .map_err(classify_process_failure)
    }
}

impl<C: UpstreamHttp> ImageryProvider for SentinelHubProvider<C> {
    async fn fetch_index_raster(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
        kind: IndexKind,
    ) -> Result<RasterSample, ProviderError> {
        let evalscript = match kind {
            IndexKind::Ndvi => NDVI_EVALSCRIPT,
            IndexKind::Ndwi => NDWI_EVALSCRIPT,
        };
        let payload = self.process_payload(bbox, date, evalscript, "image/png");
        let body = self.process_request(&payload).await?;
        debug!(date = %date, bytes = body.len(), "Fetched index raster");
        decode_index_raster(&body)
    }

    async fn fetch_true_color(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
    ) -> Result<Vec<u8>, ProviderError> {
        let payload = self.process_payload(bbox, date, TRUE_COLOR_EVALSCRIPT, "image/jpeg");
        let body = self.process_request(&payload).await?;
        debug!(date = %date, bytes = body.len(), "Fetched true-color scene");
        Ok(body)
    }

    fn name(&self) -> &str {
        "Sentinel Hub"
    }
}

/// Token endpoint classification: any 4xx means the credentials themselves
/// were rejected.
fn classify_token_failure(failure: HttpFailure) -> ProviderError {
    match failure {
        HttpFailure::Status {
            code: 400..=499, ..
        } => ProviderError::Auth,
        other => ProviderError::from_http(other),
    }
}

/// Process endpoint classification: a 400 whose body reports missing data
/// is the upstream's way of saying no cloud-free scene exists.
fn classify_process_failure(failure: HttpFailure) -> ProviderError {
    match failure {
        HttpFailure::Status { code: 400, ref body } if body.contains("No data available") => {
            ProviderError::NoData
        }
        other => ProviderError::from_http(other),
    }
}

/// Decodes the UINT8 index raster into the float grid.
///
/// 0 is the no-data sentinel; 1..=255 maps linearly back onto [-1, 1].
fn decode_index_raster(body: &[u8]) -> Result<RasterSample, ProviderError> {
    let image = image::load_from_memory(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("undecodable raster response: {e}")))?;
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let pixels = gray
        .pixels()
        .map(|pixel| {
            let value = pixel.0[0];
            if value == 0 {
                f32::NAN
            } else {
                (f32::from(value) - 1.0) / 127.0 - 1.0
            }
        })
        .collect();

    RasterSample::from_pixels(width, height, pixels)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}
