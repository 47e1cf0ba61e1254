//! Anatomical landmark roles and their indices in the detector topology
//!
//! The detector is treated as a black box that emits a fixed-length landmark
//! array. The handful of indices the feature extractor needs are bound to
//! named roles here, and checked against the detector's output length once
//! at the boundary.

use crate::error::ScreenError;
use crate::types::{LandmarkPoint, LandmarkSet};
use serde::{Deserialize, Serialize};

/// Landmarks emitted by MediaPipe FaceMesh without iris refinement
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Landmarks emitted by MediaPipe FaceMesh with `refineLandmarks` enabled
pub const FACE_MESH_REFINED_LANDMARKS: usize = 478;

/// Anatomical roles the extractor reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRole {
    LeftMouthCorner,
    RightMouthCorner,
    NoseTip,
    LeftEyeOuter,
    LeftEyeInner,
    RightEyeInner,
    RightEyeOuter,
}

impl LandmarkRole {
    pub const ALL: [LandmarkRole; 7] = [
        LandmarkRole::LeftMouthCorner,
        LandmarkRole::RightMouthCorner,
        LandmarkRole::NoseTip,
        LandmarkRole::LeftEyeOuter,
        LandmarkRole::LeftEyeInner,
        LandmarkRole::RightEyeInner,
        LandmarkRole::RightEyeOuter,
    ];
}

/// Role → index mapping into the detector's landmark array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkIndexMap {
    pub left_mouth_corner: usize,
    pub right_mouth_corner: usize,
    pub nose_tip: usize,
    pub left_eye_outer: usize,
    pub left_eye_inner: usize,
    pub right_eye_inner: usize,
    pub right_eye_outer: usize,
}

impl Default for LandmarkIndexMap {
    fn default() -> Self {
        Self::face_mesh()
    }
}

impl LandmarkIndexMap {
    /// Indices for the MediaPipe FaceMesh topology
    pub const fn face_mesh() -> Self {
        Self {
            left_mouth_corner: 61,
            right_mouth_corner: 291,
            nose_tip: 1,
            left_eye_outer: 33,
            left_eye_inner: 133,
            right_eye_inner: 362,
            right_eye_outer: 263,
        }
    }

    pub fn index_of(&self, role: LandmarkRole) -> usize {
        match role {
            LandmarkRole::LeftMouthCorner => self.left_mouth_corner,
            LandmarkRole::RightMouthCorner => self.right_mouth_corner,
            LandmarkRole::NoseTip => self.nose_tip,
            LandmarkRole::LeftEyeOuter => self.left_eye_outer,
            LandmarkRole::LeftEyeInner => self.left_eye_inner,
            LandmarkRole::RightEyeInner => self.right_eye_inner,
            LandmarkRole::RightEyeOuter => self.right_eye_outer,
        }
    }

    /// Minimum landmark-set length that covers every role
    pub fn required_len(&self) -> usize {
        LandmarkRole::ALL
            .iter()
            .map(|role| self.index_of(*role))
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Confirm a detector emitting `detector_len` points covers every role.
    pub fn validate_for(&self, detector_len: usize) -> Result<(), ScreenError> {
        let required = self.required_len();
        if detector_len < required {
            return Err(ScreenError::InvalidConfig(format!(
                "landmark map needs {required} points but the detector emits {detector_len}"
            )));
        }
        Ok(())
    }

    /// Resolve the anchor points of one landmark set.
    ///
    /// Fails when the set is too short or an anchor is NaN or infinite.
    pub fn anchors(&self, landmarks: &LandmarkSet) -> Result<FaceAnchors, ScreenError> {
        let required = self.required_len();
        if landmarks.len() < required {
            return Err(ScreenError::IncompleteLandmarkSet {
                len: landmarks.len(),
                required,
            });
        }

        for role in LandmarkRole::ALL {
            let index = self.index_of(role);
            if !landmarks[index].is_finite() {
                return Err(ScreenError::NonFiniteLandmark { index });
            }
        }

        let at = |role: LandmarkRole| landmarks[self.index_of(role)];
        Ok(FaceAnchors {
            left_mouth: at(LandmarkRole::LeftMouthCorner),
            right_mouth: at(LandmarkRole::RightMouthCorner),
            nose: at(LandmarkRole::NoseTip),
            left_eye_outer: at(LandmarkRole::LeftEyeOuter),
            left_eye_inner: at(LandmarkRole::LeftEyeInner),
            right_eye_inner: at(LandmarkRole::RightEyeInner),
            right_eye_outer: at(LandmarkRole::RightEyeOuter),
        })
    }
}

/// Anchor points of one face, copied out of the landmark set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAnchors {
    pub left_mouth: LandmarkPoint,
    pub right_mouth: LandmarkPoint,
    pub nose: LandmarkPoint,
    pub left_eye_outer: LandmarkPoint,
    pub left_eye_inner: LandmarkPoint,
    pub right_eye_inner: LandmarkPoint,
    pub right_eye_outer: LandmarkPoint,
}

impl FaceAnchors {
    pub fn left_eye_center(&self) -> LandmarkPoint {
        self.left_eye_outer.midpoint(&self.left_eye_inner)
    }

    pub fn right_eye_center(&self) -> LandmarkPoint {
        self.right_eye_inner.midpoint(&self.right_eye_outer)
    }
}
