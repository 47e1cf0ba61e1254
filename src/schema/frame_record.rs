//! face.landmark_frame.v1 schema definition
//!
//! One record per processed camera frame, carrying zero or more detected
//! faces as normalized landmark arrays. Only the first face is screened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LandmarkPoint, LandmarkSet};

/// Current schema version
pub const SCHEMA_VERSION: &str = "face.landmark_frame.v1";

/// Normalized coordinates outside this band are treated as corrupt
const COORDINATE_MIN: f64 = -0.5;
const COORDINATE_MAX: f64 = 1.5;

/// Landmark detector that produced the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSource {
    /// Detector name (e.g. "mediapipe_face_mesh")
    pub detector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Frame width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Frame height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// The face.landmark_frame.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Schema version identifier
    pub schema_version: String,
    /// Frame identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    /// Capture timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<FrameSource>,
    /// Detected faces; empty when no face was found
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
}

impl FrameRecord {
    /// Create a record with one detected face
    pub fn with_face(timestamp: DateTime<Utc>, landmarks: Vec<LandmarkPoint>) -> Self {
        FrameRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            frame_id: None,
            timestamp,
            source: None,
            faces: vec![LandmarkSet::new(landmarks)],
        }
    }

    /// Create a record for a frame without a detected face
    pub fn no_face(timestamp: DateTime<Utc>) -> Self {
        FrameRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            frame_id: None,
            timestamp,
            source: None,
            faces: Vec::new(),
        }
    }

    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = Some(frame_id.into());
        self
    }

    pub fn with_source(mut self, source: FrameSource) -> Self {
        self.source = Some(source);
        self
    }

    /// The face that gets screened, if any
    pub fn primary_face(&self) -> Option<&LandmarkSet> {
        self.faces.first()
    }

    /// Validate the record schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        for (face, landmarks) in self.faces.iter().enumerate() {
            if landmarks.is_empty() {
                return Err(ValidationError::EmptyFace { face });
            }
            for (index, point) in landmarks.points().iter().enumerate() {
                let in_band = |v: f64| (COORDINATE_MIN..=COORDINATE_MAX).contains(&v);
                if !point.is_finite() || !in_band(point.x) || !in_band(point.y) {
                    return Err(ValidationError::InvalidCoordinate { face, index });
                }
            }
        }

        Ok(())
    }
}

/// Validation errors for frame records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Face {face} has no landmarks")]
    EmptyFace { face: usize },

    #[error("Face {face} landmark {index} is not a normalized coordinate")]
    InvalidCoordinate { face: usize, index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_record_without_depth() {
        let json = r#"{
            "schema_version": "face.landmark_frame.v1",
            "frame_id": "f-1",
            "timestamp": "2024-05-02T09:30:00Z",
            "source": { "detector": "mediapipe_face_mesh", "width": 640, "height": 480 },
            "faces": [[{ "x": 0.1, "y": 0.2 }, { "x": 0.3, "y": 0.4, "z": -0.01 }]]
        }"#;

        let record: FrameRecord = serde_json::from_str(json).unwrap();
        assert!(record.validate().is_ok());
        assert_eq!(record.timestamp, ts());
        let face = record.primary_face().unwrap();
        assert_eq!(face.len(), 2);
        assert_eq!(face[0].z, 0.0);
        assert_eq!(record.source.unwrap().width, Some(640));
    }

    #[test]
    fn test_missing_faces_means_no_face() {
        let json = r#"{"schema_version": "face.landmark_frame.v1", "timestamp": "2024-05-02T09:30:00Z"}"#;
        let record: FrameRecord = serde_json::from_str(json).unwrap();
        assert!(record.primary_face().is_none());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_only_first_face_is_primary() {
        let mut record = FrameRecord::with_face(ts(), vec![LandmarkPoint::planar(0.1, 0.1)]);
        record
            .faces
            .push(LandmarkSet::new(vec![LandmarkPoint::planar(0.9, 0.9)]));
        assert_eq!(record.primary_face().unwrap()[0].x, 0.1);
    }

    #[test]
    fn test_wrong_schema_version() {
        let mut record = FrameRecord::no_face(ts());
        record.schema_version = "face.landmark_frame.v0".to_string();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_empty_face_rejected() {
        let record = FrameRecord::with_face(ts(), Vec::new());
        assert_eq!(record.validate(), Err(ValidationError::EmptyFace { face: 0 }));
    }

    #[test]
    fn test_out_of_band_coordinate_rejected() {
        let record = FrameRecord::with_face(
            ts(),
            vec![LandmarkPoint::planar(0.5, 0.5), LandmarkPoint::planar(0.5, 7.0)],
        );
        assert_eq!(
            record.validate(),
            Err(ValidationError::InvalidCoordinate { face: 0, index: 1 })
        );
    }

    #[test]
    fn test_serialize_round_trip_keeps_schema_version() {
        let record = FrameRecord::no_face(ts()).with_frame_id("f-9");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(SCHEMA_VERSION));
        assert!(json.contains("f-9"));
    }
}
