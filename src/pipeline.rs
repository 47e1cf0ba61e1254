//! Pipeline orchestration
//!
//! Wires the feature extractor, the capture session and the aggregator into a
//! single stateful processor, and provides a one-shot entry point for a
//! recorded sequence of frame records.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::aggregate::SessionAggregator;
use crate::config::ScreenConfig;
use crate::encoder::{render_text, ReportEncoder, ReportPayload};
use crate::error::ScreenError;
use crate::features::FeatureExtractor;
use crate::schema::{FrameRecord, FrameRecordAdapter};
use crate::session::{CaptureSession, CaptureStarted, DeadlineToken, SealTrigger, SealedCapture};
use crate::types::{LandmarkSet, Report, ScreeningOutcome, SessionOutcome};

/// Screen a JSON array of frame records as one capture window (stateless, one-shot).
///
/// The window opens at the first record's timestamp. Records at or after the
/// deadline close it; the end of input acts as a manual stop.
///
/// # Returns
/// Report payload JSON string
///
/// # Example
/// ```ignore
/// let report_json = screen_frames(frames_json)?;
/// ```
pub fn screen_frames(records_json: String) -> Result<String, ScreenError> {
    let records = FrameRecordAdapter::parse_array(&records_json)?;
    let mut processor = ScreeningProcessor::new();
    let outcome = processor.screen_records(&records)?;
    processor.encode_to_json(&outcome)
}

/// What happened to one observed frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDisposition {
    /// Features were appended to the collecting window
    Recorded,
    /// No face this frame; counted, nothing appended
    NoFace,
    /// The landmarks could not be used; counted, nothing appended
    Rejected { reason: String },
    /// No window is collecting
    NotCollecting,
    /// The frame arrived at or after the deadline, which sealed the window.
    /// The frame itself was not appended.
    WindowClosed(SessionOutcome),
}

/// Stateful processor owning one capture session and the last completed report.
pub struct ScreeningProcessor {
    config: ScreenConfig,
    extractor: FeatureExtractor,
    aggregator: SessionAggregator,
    session: CaptureSession,
    encoder: ReportEncoder,
    last_report: Option<Report>,
}

impl Default for ScreeningProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreeningProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::build(ScreenConfig::default())
    }

    /// Create a processor from a validated configuration
    pub fn with_config(config: ScreenConfig) -> Result<Self, ScreenError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Load configuration from JSON
    pub fn from_config_json(json: &str) -> Result<Self, ScreenError> {
        Ok(Self::build(ScreenConfig::from_json(json)?))
    }

    fn build(config: ScreenConfig) -> Self {
        Self {
            extractor: FeatureExtractor::from_config(&config),
            aggregator: SessionAggregator::from_config(&config),
            session: CaptureSession::new(config.capture_window()),
            encoder: ReportEncoder::new(),
            last_report: None,
            config,
        }
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn is_collecting(&self) -> bool {
        self.session.is_collecting()
    }

    /// Open a capture window at `now`, discarding any window in flight.
    pub fn start(&mut self, now: DateTime<Utc>) -> CaptureStarted {
        self.session.start(now)
    }

    /// Feed one detector callback: `None` when no face was detected.
    ///
    /// Unusable landmark sets are counted and skipped; they never end the window.
    pub fn observe(&mut self, landmarks: Option<&LandmarkSet>, at: DateTime<Utc>) -> FrameDisposition {
        if let Some(outcome) = self.poll(at) {
            return FrameDisposition::WindowClosed(outcome);
        }
        if !self.session.is_collecting() {
            return FrameDisposition::NotCollecting;
        }

        match landmarks {
            Some(landmarks) => match self.extractor.extract(landmarks) {
                Ok(features) => {
                    self.session.append(features);
                    FrameDisposition::Recorded
                }
                Err(e) => self.reject(&e.to_string(), at),
            },
            None => {
                self.session.note_missing_face();
                FrameDisposition::NoFace
            }
        }
    }

    /// Feed one serialized frame record.
    ///
    /// A record that fails validation is rejected like an unusable landmark set.
    pub fn observe_record(&mut self, record: &FrameRecord) -> FrameDisposition {
        match record.validate() {
            Ok(()) => self.observe(record.primary_face(), record.timestamp),
            Err(e) => {
                if let Some(outcome) = self.poll(record.timestamp) {
                    return FrameDisposition::WindowClosed(outcome);
                }
                if !self.session.is_collecting() {
                    return FrameDisposition::NotCollecting;
                }
                self.reject(&e.to_string(), record.timestamp)
            }
        }
    }

    fn reject(&mut self, reason: &str, at: DateTime<Utc>) -> FrameDisposition {
        warn!(%reason, timestamp = %at, "skipping unusable frame");
        self.session.note_rejected_frame();
        FrameDisposition::Rejected {
            reason: reason.to_string(),
        }
    }

    /// Seal the window if its deadline has passed at `now`.
    ///
    /// The window is sealed at the deadline instant, not at `now`.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<SessionOutcome> {
        if !self.session.deadline_elapsed(now) {
            return None;
        }
        let token = self.session.token()?;
        let sealed = self.session.seal(SealTrigger::Deadline(token))?;
        Some(self.finish(sealed, token.deadline))
    }

    /// Host timer callback. Stale tokens (stopped or replaced sessions) are ignored.
    pub fn on_deadline(&mut self, token: DeadlineToken, now: DateTime<Utc>) -> Option<SessionOutcome> {
        let sealed = self.session.seal(SealTrigger::Deadline(token))?;
        Some(self.finish(sealed, now))
    }

    /// Manual stop. Returns `None` if no window is collecting.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<SessionOutcome> {
        let sealed = self.session.seal(SealTrigger::Manual)?;
        Some(self.finish(sealed, now))
    }

    /// Most recent scored report
    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    pub fn clear_last_report(&mut self) {
        self.last_report = None;
    }

    /// Plain-text rendering of the most recent scored report
    pub fn last_report_text(&self) -> Result<Option<String>, ScreenError> {
        self.last_report.as_ref().map(render_text).transpose()
    }

    pub fn encode(&self, outcome: &SessionOutcome) -> ReportPayload {
        self.encoder.encode(outcome)
    }

    pub fn encode_to_json(&self, outcome: &SessionOutcome) -> Result<String, ScreenError> {
        self.encoder.encode_to_json(outcome)
    }

    /// Run one capture window over recorded frames.
    ///
    /// The window opens at the first record (or now, for empty input) and the
    /// end of input stops it manually if the deadline has not closed it.
    pub fn screen_records(&mut self, records: &[FrameRecord]) -> Result<SessionOutcome, ScreenError> {
        let opened_at = records.first().map_or_else(Utc::now, |r| r.timestamp);
        self.start(opened_at);

        let mut last_seen = opened_at;
        for (index, record) in records.iter().enumerate() {
            if let FrameDisposition::WindowClosed(outcome) = self.observe_record(record) {
                debug!(
                    ignored_frames = records.len() - index,
                    "capture window closed before end of input"
                );
                return Ok(outcome);
            }
            last_seen = last_seen.max(record.timestamp);
        }

        self.stop(last_seen).ok_or_else(|| {
            ScreenError::InvalidRecord("capture window closed without an outcome".to_string())
        })
    }

    fn finish(&mut self, sealed: SealedCapture, sealed_at: DateTime<Utc>) -> SessionOutcome {
        let outcome = match self.aggregator.aggregate(&sealed.features, sealed_at) {
            Some(report) => {
                self.last_report = Some(report.clone());
                ScreeningOutcome::Scored(report)
            }
            None => ScreeningOutcome::InsufficientData,
        };

        SessionOutcome {
            session_id: sealed.session_id,
            started_at: sealed.started_at,
            sealed_at,
            sealed_by: sealed.reason,
            no_face_frames: sealed.no_face_frames,
            rejected_frames: sealed.rejected_frames,
            outcome,
        }
    }
}
