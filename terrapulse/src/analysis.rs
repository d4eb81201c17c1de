//! The computed result of a completed analysis task.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::AnalysisKind;

/// Value object stored on a completed task and in the result cache.
///
/// Index kinds carry the rounded means and change percentage; the
/// comparative-imagery kind carries the generated summary instead. Previews
/// are `data:` URLs and each is independently optional: single-image mode
/// produces only the "from" preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Analysis that produced this result
    pub analysis_kind: AnalysisKind,
    /// Date of the "before" scene
    pub from_date: NaiveDate,
    /// Date of the "after" scene
    pub to_date: NaiveDate,
    /// Mean index value of the "before" scene, rounded to 4 decimals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_value: Option<f64>,
    /// Mean index value of the "after" scene, rounded to 4 decimals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_value: Option<f64>,
    /// Relative change between the means, rounded to 2 decimals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percentage: Option<f64>,
    /// Encoded preview of the "before" scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_from: Option<String>,
    /// Encoded preview of the "after" scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_to: Option<String>,
    /// Generated description of the observed changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
