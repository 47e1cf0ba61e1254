//! Per-frame feature extraction
//!
//! Turns one frame's landmark set into scale-normalized asymmetry proxies.
//! Every measurement is divided by the inter-eye distance so the features do
//! not depend on how far the face is from the camera.

use crate::config::{ScreenConfig, DEFAULT_FACE_SCALE_EPSILON};
use crate::error::ScreenError;
use crate::landmarks::{FaceAnchors, LandmarkIndexMap};
use crate::types::{FeatureTuple, LandmarkSet};

/// Stateless feature extractor bound to a landmark topology
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    indices: LandmarkIndexMap,
    face_scale_epsilon: f64,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(LandmarkIndexMap::default())
    }
}

impl FeatureExtractor {
    pub fn new(indices: LandmarkIndexMap) -> Self {
        Self {
            indices,
            face_scale_epsilon: DEFAULT_FACE_SCALE_EPSILON,
        }
    }

    pub fn from_config(config: &ScreenConfig) -> Self {
        Self {
            indices: config.landmarks,
            face_scale_epsilon: config.face_scale_epsilon,
        }
    }

    pub fn indices(&self) -> &LandmarkIndexMap {
        &self.indices
    }

    /// Compute the feature tuple of one frame.
    ///
    /// Fails when the set is too short to hold every anchor index or an anchor
    /// coordinate is not finite.
    pub fn extract(&self, landmarks: &LandmarkSet) -> Result<FeatureTuple, ScreenError> {
        let anchors = self.indices.anchors(landmarks)?;
        Ok(features_from_anchors(&anchors, self.face_scale_epsilon))
    }
}

/// Compute features with the default MediaPipe FaceMesh indices.
pub fn compute_features(landmarks: &LandmarkSet) -> Result<FeatureTuple, ScreenError> {
    FeatureExtractor::default().extract(landmarks)
}

fn features_from_anchors(anchors: &FaceAnchors, epsilon: f64) -> FeatureTuple {
    let left_eye = anchors.left_eye_center();
    let right_eye = anchors.right_eye_center();
    let face_scale = compute_face_scale(left_eye.planar_distance(&right_eye), epsilon);

    let nose = &anchors.nose;
    let mouth_asym = compute_side_difference(
        anchors.left_mouth.y - nose.y,
        anchors.right_mouth.y - nose.y,
        face_scale,
    );
    let gaze_asym = compute_side_difference(left_eye.x - nose.x, right_eye.x - nose.x, face_scale);
    let mouth_width = anchors.left_mouth.planar_distance(&anchors.right_mouth) / face_scale;

    FeatureTuple {
        mouth_asym,
        gaze_asym,
        mouth_width,
        face_scale,
    }
}

/// Inter-eye distance, with `epsilon` standing in for a zero or non-finite distance
fn compute_face_scale(eye_distance: f64, epsilon: f64) -> f64 {
    if eye_distance == 0.0 || !eye_distance.is_finite() {
        epsilon
    } else {
        eye_distance
    }
}

/// Formula: `left_offset / scale - right_offset / scale`
fn compute_side_difference(left_offset: f64, right_offset: f64, face_scale: f64) -> f64 {
    left_offset / face_scale - right_offset / face_scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FACE_MESH_REFINED_LANDMARKS;
    use crate::types::LandmarkPoint;

    const NOSE_X: f64 = 0.5;

    /// Face mesh with the seven anchors set and every other point at the nose
    fn face(
        left_mouth: (f64, f64),
        right_mouth: (f64, f64),
        left_eye: [(f64, f64); 2],
        right_eye: [(f64, f64); 2],
    ) -> LandmarkSet {
        let map = LandmarkIndexMap::face_mesh();
        let mut points = vec![LandmarkPoint::planar(NOSE_X, 0.5); FACE_MESH_REFINED_LANDMARKS];
        points[map.left_mouth_corner] = LandmarkPoint::planar(left_mouth.0, left_mouth.1);
        points[map.right_mouth_corner] = LandmarkPoint::planar(right_mouth.0, right_mouth.1);
        points[map.left_eye_outer] = LandmarkPoint::planar(left_eye[0].0, left_eye[0].1);
        points[map.left_eye_inner] = LandmarkPoint::planar(left_eye[1].0, left_eye[1].1);
        points[map.right_eye_inner] = LandmarkPoint::planar(right_eye[0].0, right_eye[0].1);
        points[map.right_eye_outer] = LandmarkPoint::planar(right_eye[1].0, right_eye[1].1);
        LandmarkSet::new(points)
    }

    fn symmetric_face() -> LandmarkSet {
        face(
            (0.42, 0.65),
            (0.58, 0.65),
            [(0.35, 0.40), (0.45, 0.40)],
            [(0.55, 0.40), (0.65, 0.40)],
        )
    }

    #[test]
    fn test_mirror_symmetric_face_has_zero_mouth_asymmetry() {
        let features = compute_features(&symmetric_face()).unwrap();
        assert!(features.mouth_asym.abs() < 1e-9);
        // Eye centers at 0.40 and 0.60 around a nose at 0.50. The gaze term is the
        // scaled horizontal separation of the centers, so level eyes give -1.
        assert!((features.face_scale - 0.2).abs() < 1e-9);
        assert!((features.gaze_asym - (-0.1 / 0.2 - 0.1 / 0.2)).abs() < 1e-9);
        assert!((features.mouth_width - 0.16 / 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_gaze_asym_zero_when_eye_centers_share_x() {
        let set = face(
            (0.42, 0.65),
            (0.58, 0.65),
            [(0.35, 0.40), (0.45, 0.40)],
            [(0.35, 0.45), (0.45, 0.45)],
        );
        let features = compute_features(&set).unwrap();
        assert!(features.gaze_asym.abs() < 1e-9);
    }

    #[test]
    fn test_left_droop_is_positive() {
        let set = face(
            (0.42, 0.70),
            (0.58, 0.65),
            [(0.35, 0.40), (0.45, 0.40)],
            [(0.55, 0.40), (0.65, 0.40)],
        );
        let features = compute_features(&set).unwrap();
        assert!(features.mouth_asym > 0.0);
        assert!((features.mouth_asym - 0.05 / 0.2).abs() < 1e-9);

        let mirrored = face(
            (0.42, 0.65),
            (0.58, 0.70),
            [(0.35, 0.40), (0.45, 0.40)],
            [(0.55, 0.40), (0.65, 0.40)],
        );
        assert!(compute_features(&mirrored).unwrap().mouth_asym < 0.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let set = face(
            (0.41, 0.66),
            (0.57, 0.64),
            [(0.34, 0.41), (0.44, 0.39)],
            [(0.56, 0.40), (0.66, 0.42)],
        );
        let first = compute_features(&set).unwrap();
        let second = compute_features(&set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_coincident_eyes_use_epsilon() {
        let set = face(
            (0.42, 0.65),
            (0.58, 0.66),
            [(0.50, 0.40), (0.50, 0.40)],
            [(0.50, 0.40), (0.50, 0.40)],
        );
        let features = compute_features(&set).unwrap();
        assert_eq!(features.face_scale, DEFAULT_FACE_SCALE_EPSILON);
        assert!(features.mouth_asym.is_finite());
        assert!(features.gaze_asym.is_finite());
        assert!(features.mouth_width.is_finite());
    }

    #[test]
    fn test_non_finite_eye_distance_uses_epsilon() {
        assert_eq!(compute_face_scale(f64::NAN, 1e-6), 1e-6);
        assert_eq!(compute_face_scale(f64::INFINITY, 1e-6), 1e-6);
        assert_eq!(compute_face_scale(0.25, 1e-6), 0.25);
    }

    #[test]
    fn test_non_finite_anchor_rejected() {
        let mut points = symmetric_face().points().to_vec();
        points[LandmarkIndexMap::face_mesh().left_mouth_corner] =
            LandmarkPoint::planar(f64::NAN, 0.65);
        assert!(matches!(
            compute_features(&LandmarkSet::new(points)),
            Err(ScreenError::NonFiniteLandmark { index: 61 })
        ));
    }

    #[test]
    fn test_configured_epsilon() {
        let config = ScreenConfig {
            face_scale_epsilon: 0.5,
            ..ScreenConfig::default()
        };
        let set = face(
            (0.40, 0.65),
            (0.60, 0.65),
            [(0.50, 0.40), (0.50, 0.40)],
            [(0.50, 0.40), (0.50, 0.40)],
        );
        let features = FeatureExtractor::from_config(&config).extract(&set).unwrap();
        assert_eq!(features.face_scale, 0.5);
        assert!((features.mouth_width - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_short_landmark_set_rejected() {
        let set = LandmarkSet::new(vec![LandmarkPoint::planar(0.5, 0.5); 10]);
        assert!(matches!(
            compute_features(&set),
            Err(ScreenError::IncompleteLandmarkSet { len: 10, .. })
        ));
    }

    #[test]
    fn test_custom_topology() {
        let indices = LandmarkIndexMap {
            left_mouth_corner: 0,
            right_mouth_corner: 1,
            nose_tip: 2,
            left_eye_outer: 3,
            left_eye_inner: 4,
            right_eye_inner: 5,
            right_eye_outer: 6,
        };
        let set = LandmarkSet::new(vec![
            LandmarkPoint::planar(0.4, 0.7),
            LandmarkPoint::planar(0.6, 0.7),
            LandmarkPoint::planar(0.5, 0.5),
            LandmarkPoint::planar(0.3, 0.4),
            LandmarkPoint::planar(0.4, 0.4),
            LandmarkPoint::planar(0.6, 0.4),
            LandmarkPoint::planar(0.7, 0.4),
        ]);
        let features = FeatureExtractor::new(indices).extract(&set).unwrap();
        assert!((features.face_scale - 0.3).abs() < 1e-9);
        assert!(features.mouth_asym.abs() < 1e-9);
    }
}
