//! Capture-window aggregation
//!
//! Reduces the feature tuples collected during one capture window to a single
//! 0-100 score, descriptive statistics and an advisory tier.

use crate::config::{ScoringWeights, ScreenConfig, TierThresholds};
use crate::types::{FeatureSummary, FeatureTuple, Report, RiskTier};
use chrono::{DateTime, Utc};

/// Session aggregator holding the scoring constants
#[derive(Debug, Clone, Copy)]
pub struct SessionAggregator {
    weights: ScoringWeights,
    mouth_width_baseline: f64,
    score_scale: f64,
    tiers: TierThresholds,
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::from_config(&ScreenConfig::default())
    }
}

impl SessionAggregator {
    pub fn from_config(config: &ScreenConfig) -> Self {
        Self {
            weights: config.weights,
            mouth_width_baseline: config.mouth_width_baseline,
            score_scale: config.score_scale,
            tiers: config.tiers,
        }
    }

    /// Reduce one window of features to a report stamped with `timestamp`.
    ///
    /// Returns `None` for an empty window; callers must treat that as
    /// insufficient data rather than a score of zero.
    pub fn aggregate(&self, features: &[FeatureTuple], timestamp: DateTime<Utc>) -> Option<Report> {
        if features.is_empty() {
            return None;
        }

        let details = summarize(features);
        let raw_score = self.raw_score(&details);
        let score = self.normalize(raw_score);
        let tier = self.classify(score);

        Some(Report {
            timestamp,
            score,
            tier,
            raw_score,
            frames: u32::try_from(features.len()).unwrap_or(u32::MAX),
            details,
        })
    }

    /// Weighted sum of the three window signals
    ///
    /// Formula:
    /// ```text
    /// raw = 2.5 * |mean(mouth_asym)|
    ///     + 1.5 * |mean(gaze_asym)|
    ///     + 1.0 * max(0, 0.6 - mean(mouth_width))
    /// ```
    pub fn raw_score(&self, details: &FeatureSummary) -> f64 {
        let width_shortfall = (self.mouth_width_baseline - details.mouth_width_mean).max(0.0);
        details.mouth_asym_mean.abs() * self.weights.mouth_asym
            + details.gaze_mean.abs() * self.weights.gaze_asym
            + width_shortfall * self.weights.mouth_width
    }

    /// Map a raw score onto the integer 0-100 range
    pub fn normalize(&self, raw_score: f64) -> u8 {
        let scaled = (raw_score.max(0.0) * self.score_scale).round();
        // NaN falls through both comparisons and lands on 0
        if scaled >= 100.0 {
            100
        } else if scaled > 0.0 {
            scaled as u8
        } else {
            0
        }
    }

    pub fn classify(&self, score: u8) -> RiskTier {
        classify_score(score, &self.tiers)
    }
}

/// Classify a score; lower bounds are inclusive.
pub fn classify_score(score: u8, tiers: &TierThresholds) -> RiskTier {
    if score >= tiers.high {
        RiskTier::High
    } else if score >= tiers.moderate {
        RiskTier::Moderate
    } else {
        RiskTier::Low
    }
}

/// Aggregate with the default scoring constants.
pub fn aggregate(features: &[FeatureTuple], timestamp: DateTime<Utc>) -> Option<Report> {
    SessionAggregator::default().aggregate(features, timestamp)
}

fn summarize(features: &[FeatureTuple]) -> FeatureSummary {
    let mouth_asym: Vec<f64> = features.iter().map(|f| f.mouth_asym).collect();
    let gaze: Vec<f64> = features.iter().map(|f| f.gaze_asym).collect();
    let widths: Vec<f64> = features.iter().map(|f| f.mouth_width).collect();

    FeatureSummary {
        mouth_asym_mean: mean(&mouth_asym),
        gaze_mean: mean(&gaze),
        mouth_width_mean: mean(&widths),
        mouth_asym_std: population_std(&mouth_asym),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
