//! Geographic request types.
//!
//! A change-detection request names an area of interest (a WGS84 bounding
//! box), two acquisition dates, and the analysis to run over them. These
//! types carry the validation rules the submission path applies before any
//! task is created.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for a submitted request.
///
/// These are rejected synchronously at submission time; no task is created
/// for an invalid request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A bounding box edge was NaN or infinite
    #[error("bounding box coordinates must be finite numbers")]
    NonFiniteCoordinate,

    /// West edge not strictly less than east edge
    #[error("west edge {west} must be strictly less than east edge {east}")]
    EastWestOrder { west: f64, east: f64 },

    /// South edge not strictly less than north edge
    #[error("south edge {south} must be strictly less than north edge {north}")]
    NorthSouthOrder { south: f64, north: f64 },

    /// Longitude outside the WGS84 range
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeRange(f64),

    /// Latitude outside the WGS84 range
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeRange(f64),
}

/// Axis-aligned WGS84 bounding box.
///
/// Serialized as the 4-element array `[west, south, east, north]` to match
/// the submission wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", try_from = "[f64; 4]")]
pub struct BoundingBox {
    /// Western edge, degrees longitude
    pub west: f64,
    /// Southern edge, degrees latitude
    pub south: f64,
    /// Eastern edge, degrees longitude
    pub east: f64,
    /// Northern edge, degrees latitude
    pub north: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, ValidationError> {
        let bbox = Self {
            west,
            south,
            east,
            north,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks the box invariants: finite edges, west < east, south < north,
    /// edges within the WGS84 coordinate ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let edges = self.to_wsen();
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        for lon in [self.west, self.east] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ValidationError::LongitudeRange(lon));
            }
        }
        for lat in [self.south, self.north] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ValidationError::LatitudeRange(lat));
            }
        }
        if self.west >= self.east {
            return Err(ValidationError::EastWestOrder {
                west: self.west,
                east: self.east,
            });
        }
        if self.south >= self.north {
            return Err(ValidationError::NorthSouthOrder {
                south: self.south,
                north: self.north,
            });
        }
        Ok(())
    }

    /// Returns the edges in west, south, east, north order.
    pub fn to_wsen(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_wsen()
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = ValidationError;

    fn try_from(edges: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(edges[0], edges[1], edges[2], edges[3])
    }
}

/// The analysis to run over the area of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Normalized difference vegetation index comparison
    Ndvi,
    /// Normalized difference water index comparison
    Ndwi,
    /// Comparative true-color imagery with generated summary text
    TrueColor,
}

impl AnalysisKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Ndwi => "ndwi",
            Self::TrueColor => "truecolor",
        }
    }

    /// Returns the spectral index behind this kind, or `None` for the
    /// comparative-imagery mode.
    pub fn index(self) -> Option<IndexKind> {
        match self {
            Self::Ndvi => Some(IndexKind::Ndvi),
            Self::Ndwi => Some(IndexKind::Ndwi),
            Self::TrueColor => None,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spectral index computed per pixel by the imagery upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Vegetation index over the red and near-infrared bands
    Ndvi,
    /// Water index over the green and near-infrared bands
    Ndwi,
}

impl From<IndexKind> for AnalysisKind {
    fn from(kind: IndexKind) -> Self {
        match kind {
            IndexKind::Ndvi => Self::Ndvi,
            IndexKind::Ndwi => Self::Ndwi,
        }
    }
}

/// A submitted change-detection request.
///
/// Equal `from_date` and `to_date` are permitted and signal single-image
/// mode: one scene is fetched and compared against itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Area of interest
    pub bbox: BoundingBox,
    /// Acquisition date of the "before" scene
    pub from_date: NaiveDate,
    /// Acquisition date of the "after" scene
    pub to_date: NaiveDate,
    /// Analysis to run
    #[serde(rename = "analysis_kind")]
    pub kind: AnalysisKind,
}

impl AnalysisRequest {
    /// Validates the request.
    ///
    /// Date validity and a known analysis kind are enforced by the types;
    /// only the bounding box invariants need a runtime check.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.bbox.validate()
    }

    /// Returns true when both dates are equal and only one scene is fetched.
    pub fn is_single_image(&self) -> bool {
        self.from_date == self.to_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn test_bounding_box_valid() {
        let bbox = BoundingBox::new(2.2, 48.8, 2.4, 48.9).unwrap();
        assert_eq!(bbox.to_wsen(), [2.2, 48.8, 2.4, 48.9]);
    }

    #[test]
    fn test_bounding_box_rejects_swapped_edges() {
        assert_eq!(
            BoundingBox::new(2.4, 48.8, 2.2, 48.9),
            Err(ValidationError::EastWestOrder {
                west: 2.4,
                east: 2.2
            })
        );
        assert_eq!(
            BoundingBox::new(2.2, 48.9, 2.4, 48.8),
            Err(ValidationError::NorthSouthOrder {
                south: 48.9,
                north: 48.8
            })
        );
    }

    #[test]
    fn test_bounding_box_rejects_degenerate_box() {
        assert!(BoundingBox::new(2.2, 48.8, 2.2, 48.9).is_err());
        assert!(BoundingBox::new(2.2, 48.8, 2.4, 48.8).is_err());
    }

    #[test]
    fn test_bounding_box_rejects_non_finite() {
        assert_eq!(
            BoundingBox::new(f64::NAN, 48.8, 2.4, 48.9),
            Err(ValidationError::NonFiniteCoordinate)
        );
        assert_eq!(
            BoundingBox::new(2.2, f64::INFINITY, 2.4, 48.9),
            Err(ValidationError::NonFiniteCoordinate)
        );
    }

    #[test]
    fn test_bounding_box_rejects_out_of_range() {
        assert_eq!(
            BoundingBox::new(-181.0, 48.8, 2.4, 48.9),
            Err(ValidationError::LongitudeRange(-181.0))
        );
        assert_eq!(
            BoundingBox::new(2.2, -91.0, 2.4, 48.9),
            Err(ValidationError::LatitudeRange(-91.0))
        );
    }

    #[test]
    fn test_bounding_box_serde_array_shape() {
        let bbox = BoundingBox::new(2.2, 48.8, 2.4, 48.9).unwrap();
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[2.2,48.8,2.4,48.9]");

        let parsed: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bbox);
    }

    #[test]
    fn test_bounding_box_deserialize_rejects_invalid() {
        let result: Result<BoundingBox, _> = serde_json::from_str("[2.4,48.8,2.2,48.9]");
        assert!(result.is_err());
    }

    #[test]
    fn test_analysis_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&AnalysisKind::Ndvi).unwrap(),
            "\"ndvi\""
        );
        assert_eq!(
            serde_json::to_string(&AnalysisKind::TrueColor).unwrap(),
            "\"truecolor\""
        );

        let parsed: AnalysisKind = serde_json::from_str("\"ndwi\"").unwrap();
        assert_eq!(parsed, AnalysisKind::Ndwi);
    }

    #[test]
    fn test_analysis_kind_rejects_unknown() {
        let result: Result<AnalysisKind, _> = serde_json::from_str("\"evi\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_analysis_kind_index_mapping() {
        assert_eq!(AnalysisKind::Ndvi.index(), Some(IndexKind::Ndvi));
        assert_eq!(AnalysisKind::Ndwi.index(), Some(IndexKind::Ndwi));
        assert_eq!(AnalysisKind::TrueColor.index(), None);
    }

    #[test]
    fn test_request_single_image_mode() {
        let request = AnalysisRequest {
            bbox: BoundingBox::new(2.2, 48.8, 2.4, 48.9).unwrap(),
            from_date: date("2023-06-01"),
            to_date: date("2023-06-01"),
            kind: AnalysisKind::Ndvi,
        };
        assert!(request.is_single_image());

        let two_dates = AnalysisRequest {
            to_date: date("2024-06-01"),
            ..request
        };
        assert!(!two_dates.is_single_image());
    }
}
