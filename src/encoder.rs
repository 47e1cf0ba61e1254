//! Report encoder
//!
//! Renders a sealed session outcome into the exported JSON payload and the
//! plain-text report the demo offers for download.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScreenError;
use crate::types::{
    FeatureSummary, Report, RiskTier, ScreeningOutcome, SealReason, SessionOutcome,
    INSUFFICIENT_DATA_MESSAGE,
};
use crate::{PRODUCER_NAME, SCREEN_VERSION};

/// Current report payload version
pub const REPORT_VERSION: &str = "1.0.0";

/// File name the text report is offered under
pub const REPORT_FILE_NAME: &str = "stroke_screening_report.txt";

/// Fixed disclaimer attached to every exported report
pub const DISCLAIMER: &str = "DISCLAIMER: This is a development/demo screening tool. NOT a medical diagnosis.\nIf you suspect stroke, call emergency services immediately.";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Capture window provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSession {
    pub session_id: String,
    pub started_at: String,
    pub sealed_at: String,
    pub sealed_by: SealReason,
    pub no_face_frames: u32,
    pub rejected_frames: u32,
}

/// Screening result, tagged by status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportResult {
    Scored {
        /// ISO-8601 instant the window was sealed
        timestamp: String,
        score: u8,
        tier: RiskTier,
        advisory: String,
        frames: u32,
        raw_score: f64,
        details: FeatureSummary,
    },
    InsufficientData {
        message: String,
    },
}

/// Exported report payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report_version: String,
    pub producer: ReportProducer,
    pub session: ReportSession,
    pub result: ReportResult,
    pub disclaimer: String,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a session outcome into a report payload
    pub fn encode(&self, outcome: &SessionOutcome) -> ReportPayload {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: SCREEN_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let session = ReportSession {
            session_id: outcome.session_id.to_string(),
            started_at: iso8601(&outcome.started_at),
            sealed_at: iso8601(&outcome.sealed_at),
            sealed_by: outcome.sealed_by,
            no_face_frames: outcome.no_face_frames,
            rejected_frames: outcome.rejected_frames,
        };

        let result = match &outcome.outcome {
            ScreeningOutcome::Scored(report) => ReportResult::Scored {
                timestamp: iso8601(&report.timestamp),
                score: report.score,
                tier: report.tier,
                advisory: report.tier.advisory().to_string(),
                frames: report.frames,
                raw_score: report.raw_score,
                details: report.details,
            },
            ScreeningOutcome::InsufficientData => ReportResult::InsufficientData {
                message: INSUFFICIENT_DATA_MESSAGE.to_string(),
            },
        };

        ReportPayload {
            report_version: REPORT_VERSION.to_string(),
            producer,
            session,
            result,
            disclaimer: DISCLAIMER.to_string(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, outcome: &SessionOutcome) -> Result<String, ScreenError> {
        let payload = self.encode(outcome);
        serde_json::to_string_pretty(&payload).map_err(ScreenError::JsonError)
    }
}

/// Detail block as it appears in the text report (camelCase keys)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextDetails {
    mouth_asym_mean: f64,
    gaze_mean: f64,
    mouth_width_mean: f64,
    mouth_asym_std: f64,
}

impl From<&FeatureSummary> for TextDetails {
    fn from(details: &FeatureSummary) -> Self {
        Self {
            mouth_asym_mean: details.mouth_asym_mean,
            gaze_mean: details.gaze_mean,
            mouth_width_mean: details.mouth_width_mean,
            mouth_asym_std: details.mouth_asym_std,
        }
    }
}

/// Render the downloadable plain-text report.
pub fn render_text(report: &Report) -> Result<String, ScreenError> {
    let details = serde_json::to_string_pretty(&TextDetails::from(&report.details))
        .map_err(|e| ScreenError::EncodingError(e.to_string()))?;

    Ok(format!(
        "Stroke Screening Report (Demo)\n\
         Timestamp: {}\n\
         Score: {} / 100\n\
         Frames captured: {}\n\
         Details: {}\n\
         \n\
         {}\n",
        iso8601(&report.timestamp),
        report.score,
        report.frames,
        details,
        DISCLAIMER
    ))
}

fn iso8601(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
