//! Screening configuration
//!
//! The scoring weights, mouth-width baseline and score scale are opaque
//! tuning constants chosen so demo sessions produce plausible numbers. They
//! are not calibrated clinical thresholds.

use crate::error::ScreenError;
use crate::landmarks::LandmarkIndexMap;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Weight of `|mean(mouth_asym)|` in the raw score
pub const DEFAULT_MOUTH_ASYM_WEIGHT: f64 = 2.5;

/// Weight of `|mean(gaze_asym)|` in the raw score
pub const DEFAULT_GAZE_ASYM_WEIGHT: f64 = 1.5;

/// Weight of the mouth-width shortfall below the baseline
pub const DEFAULT_MOUTH_WIDTH_WEIGHT: f64 = 1.0;

/// Mean normalized mouth width below which the shortfall term contributes
pub const DEFAULT_MOUTH_WIDTH_BASELINE: f64 = 0.6;

/// Multiplier mapping the raw score onto the 0-100 range
pub const DEFAULT_SCORE_SCALE: f64 = 35.0;

/// Capture window length (8 seconds)
pub const DEFAULT_CAPTURE_WINDOW_MS: i64 = 8_000;

/// Longest capture window accepted by [`ScreenConfig::validate`] (1 hour)
pub const MAX_CAPTURE_WINDOW_MS: i64 = 3_600_000;

/// Substitute face scale when both eye centers coincide
pub const DEFAULT_FACE_SCALE_EPSILON: f64 = 1e-6;

/// Lowest score classified as moderate risk
pub const DEFAULT_MODERATE_THRESHOLD: u8 = 35;

/// Lowest score classified as high risk
pub const DEFAULT_HIGH_THRESHOLD: u8 = 60;

/// Weights of the three aggregate signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub mouth_asym: f64,
    pub gaze_asym: f64,
    pub mouth_width: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            mouth_asym: DEFAULT_MOUTH_ASYM_WEIGHT,
            gaze_asym: DEFAULT_GAZE_ASYM_WEIGHT,
            mouth_width: DEFAULT_MOUTH_WIDTH_WEIGHT,
        }
    }
}

/// Lower bounds (inclusive) of the moderate and high tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub moderate: u8,
    pub high: u8,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            moderate: DEFAULT_MODERATE_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

/// Full configuration of the extractor, aggregator and capture window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub weights: ScoringWeights,
    pub mouth_width_baseline: f64,
    pub score_scale: f64,
    pub capture_window_ms: i64,
    pub face_scale_epsilon: f64,
    pub tiers: TierThresholds,
    pub landmarks: LandmarkIndexMap,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            mouth_width_baseline: DEFAULT_MOUTH_WIDTH_BASELINE,
            score_scale: DEFAULT_SCORE_SCALE,
            capture_window_ms: DEFAULT_CAPTURE_WINDOW_MS,
            face_scale_epsilon: DEFAULT_FACE_SCALE_EPSILON,
            tiers: TierThresholds::default(),
            landmarks: LandmarkIndexMap::default(),
        }
    }
}

impl ScreenConfig {
    /// Load and validate a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ScreenError> {
        let config: ScreenConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ScreenError> {
        serde_json::to_string_pretty(self).map_err(ScreenError::JsonError)
    }

    pub fn capture_window(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.capture_window_ms)
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        let weights = [
            ("weights.mouth_asym", self.weights.mouth_asym),
            ("weights.gaze_asym", self.weights.gaze_asym),
            ("weights.mouth_width", self.weights.mouth_width),
            ("mouth_width_baseline", self.mouth_width_baseline),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ScreenError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if !self.score_scale.is_finite() || self.score_scale <= 0.0 {
            return Err(ScreenError::InvalidConfig(format!(
                "score_scale must be positive, got {}",
                self.score_scale
            )));
        }

        if self.capture_window_ms <= 0 || self.capture_window_ms > MAX_CAPTURE_WINDOW_MS {
            return Err(ScreenError::InvalidConfig(format!(
                "capture_window_ms must be in 1..={MAX_CAPTURE_WINDOW_MS}, got {}",
                self.capture_window_ms
            )));
        }

        if !self.face_scale_epsilon.is_finite() || self.face_scale_epsilon <= 0.0 {
            return Err(ScreenError::InvalidConfig(format!(
                "face_scale_epsilon must be positive, got {}",
                self.face_scale_epsilon
            )));
        }

        if self.tiers.moderate >= self.tiers.high || self.tiers.high > 100 {
            return Err(ScreenError::InvalidConfig(format!(
                "tier thresholds must satisfy moderate < high <= 100, got {} and {}",
                self.tiers.moderate, self.tiers.high
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_demo_constants() {
        let config = ScreenConfig::default();
        assert_eq!(config.weights.mouth_asym, 2.5);
        assert_eq!(config.weights.gaze_asym, 1.5);
        assert_eq!(config.weights.mouth_width, 1.0);
        assert_eq!(config.mouth_width_baseline, 0.6);
        assert_eq!(config.score_scale, 35.0);
        assert_eq!(config.capture_window(), TimeDelta::seconds(8));
        assert_eq!(config.tiers, TierThresholds { moderate: 35, high: 60 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ScreenConfig::from_json(r#"{"capture_window_ms": 5000}"#).unwrap();
        assert_eq!(config.capture_window_ms, 5000);
        assert_eq!(config.weights, ScoringWeights::default());
        assert_eq!(config.landmarks, LandmarkIndexMap::face_mesh());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ScreenConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(ScreenConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_inverted_tiers() {
        let result = ScreenConfig::from_json(r#"{"tiers": {"moderate": 60, "high": 35}}"#);
        assert!(matches!(result, Err(ScreenError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let config = ScreenConfig {
            capture_window_ms: 0,
            ..ScreenConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = ScreenConfig::default();
        config.weights.gaze_asym = -1.0;
        assert!(config.validate().is_err());
    }
}
