//! Core data types
//!
//! Landmark geometry flows in, feature tuples are derived per frame, and a
//! sealed capture window is reduced to a [`Report`] or an insufficient-data
//! outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One detected facial point in normalized frame coordinates.
///
/// `x` and `y` are in [0,1] relative to frame width/height; `z` is a relative
/// depth that some detectors omit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl LandmarkPoint {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Euclidean distance in the image plane (depth ignored)
    pub fn planar_distance(&self, other: &LandmarkPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Planar midpoint of two points
    pub fn midpoint(&self, other: &LandmarkPoint) -> LandmarkPoint {
        LandmarkPoint::planar((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// All landmarks detected for one face in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LandmarkPoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }
}

impl From<Vec<LandmarkPoint>> for LandmarkSet {
    fn from(points: Vec<LandmarkPoint>) -> Self {
        Self::new(points)
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = LandmarkPoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// Scale-normalized geometric features of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureTuple {
    /// Signed vertical mouth-corner asymmetry relative to the nose.
    /// Positive means the left corner sits lower than the right.
    pub mouth_asym: f64,
    /// Signed horizontal eye-center asymmetry relative to the nose
    pub gaze_asym: f64,
    /// Mouth-corner distance divided by face scale
    pub mouth_width: f64,
    /// Inter-eye distance used as the normalization denominator
    pub face_scale: f64,
}

/// Per-feature statistics over a capture window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mouth_asym_mean: f64,
    pub gaze_mean: f64,
    pub mouth_width_mean: f64,
    /// Population standard deviation of `mouth_asym`
    pub mouth_asym_std: f64,
}

/// Advisory tier derived from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "low risk",
            RiskTier::Moderate => "moderate risk",
            RiskTier::High => "high risk",
        }
    }

    /// Fixed advisory message shown with the tier
    pub fn advisory(&self) -> &'static str {
        match self {
            RiskTier::High => {
                "High risk flag — Suggest immediate medical evaluation. If sudden onset, call emergency services."
            }
            RiskTier::Moderate => {
                "Moderate risk — Recommend contacting a clinician for evaluation."
            }
            RiskTier::Low => {
                "Low risk — No immediate alarm; if symptoms persist or are sudden, seek medical care."
            }
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of reducing a non-empty capture window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Instant the capture window was sealed
    pub timestamp: DateTime<Utc>,
    /// Final score, 0-100
    pub score: u8,
    pub tier: RiskTier,
    /// Weighted sum before scaling and clamping
    pub raw_score: f64,
    /// Number of frames that contributed features
    pub frames: u32,
    pub details: FeatureSummary,
}

/// Outcome of aggregating one sealed capture window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScreeningOutcome {
    Scored(Report),
    /// The window closed without a single usable frame
    InsufficientData,
}

impl ScreeningOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            ScreeningOutcome::Scored(report) => Some(report),
            ScreeningOutcome::InsufficientData => None,
        }
    }

    /// User-facing status line
    pub fn message(&self) -> String {
        match self {
            ScreeningOutcome::Scored(report) => {
                format!("Screening score: {} / 100", report.score)
            }
            ScreeningOutcome::InsufficientData => INSUFFICIENT_DATA_MESSAGE.to_string(),
        }
    }
}

/// Shown when a window closes with zero usable frames
pub const INSUFFICIENT_DATA_MESSAGE: &str =
    "No face detected. Try again with better lighting and face the camera.";

/// What closed a capture window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealReason {
    Deadline,
    Manual,
}

/// A sealed and aggregated capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sealed_at: DateTime<Utc>,
    pub sealed_by: SealReason,
    /// Frames delivered while collecting that had no detected face
    pub no_face_frames: u32,
    /// Frames whose landmarks were rejected and skipped
    pub rejected_frames: u32,
    pub outcome: ScreeningOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_distance_ignores_depth() {
        let a = LandmarkPoint::new(0.0, 0.0, 5.0);
        let b = LandmarkPoint::new(3.0, 4.0, -5.0);
        assert!((a.planar_distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_depth_defaults_to_zero() {
        let point: LandmarkPoint = serde_json::from_str(r#"{"x": 0.25, "y": 0.75}"#).unwrap();
        assert_eq!(point, LandmarkPoint::planar(0.25, 0.75));
    }

    #[test]
    fn test_landmark_set_serializes_as_array() {
        let set = LandmarkSet::new(vec![LandmarkPoint::planar(0.1, 0.2)]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["x"], 0.1);
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            ScreeningOutcome::InsufficientData.message(),
            INSUFFICIENT_DATA_MESSAGE
        );
        assert!(RiskTier::High.advisory().starts_with("High risk flag"));
        assert_eq!(RiskTier::Moderate.to_string(), "moderate risk");
    }
}
