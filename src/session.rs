//! Capture session state machine
//!
//! `Idle -> Collecting -> Sealed -> Idle`. A session collects feature tuples
//! until its deadline elapses or it is stopped manually. Sealing moves the
//! collected data out exactly once, so a sealed window can never be
//! aggregated twice.
//!
//! The host owns the timer. Each started session hands out a
//! [`DeadlineToken`]; a token that does not belong to the session currently
//! collecting is stale and sealing with it is a no-op. This covers a deadline
//! firing after a manual stop and a deadline left over from a replaced
//! session.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_CAPTURE_WINDOW_MS;
use crate::types::{FeatureTuple, SealReason};

/// Handle to the pending deadline of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineToken {
    pub session_id: Uuid,
    pub deadline: DateTime<Utc>,
}

/// Emitted when collection starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStarted {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub window_ms: i64,
    /// In-flight session discarded by this start, if any
    pub replaced: Option<Uuid>,
}

impl CaptureStarted {
    pub fn token(&self) -> DeadlineToken {
        DeadlineToken {
            session_id: self.session_id,
            deadline: self.deadline,
        }
    }

    /// User-facing status line shown while collecting
    pub fn message(&self) -> String {
        let seconds = self.window_ms as f64 / 1000.0;
        format!(
            "Collecting {seconds} seconds of data... Please face camera straight on and keep neutral expression."
        )
    }
}

/// What asks for a session to be sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealTrigger {
    Manual,
    Deadline(DeadlineToken),
}

/// Data moved out of a session when it is sealed
#[derive(Debug, Clone, PartialEq)]
pub struct SealedCapture {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub reason: SealReason,
    pub features: Vec<FeatureTuple>,
    pub no_face_frames: u32,
    pub rejected_frames: u32,
}

/// Externally visible phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Collecting,
}

#[derive(Debug, Clone)]
struct ActiveCapture {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    features: Vec<FeatureTuple>,
    no_face_frames: u32,
    rejected_frames: u32,
}

/// One capture session slot; at most one window collects at a time.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    window: TimeDelta,
    active: Option<ActiveCapture>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(TimeDelta::milliseconds(DEFAULT_CAPTURE_WINDOW_MS))
    }
}

impl CaptureSession {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window,
            active: None,
        }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn phase(&self) -> SessionPhase {
        if self.active.is_some() {
            SessionPhase::Collecting
        } else {
            SessionPhase::Idle
        }
    }

    pub fn is_collecting(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.session_id)
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|a| a.deadline)
    }

    /// Token for the current deadline, if collecting
    pub fn token(&self) -> Option<DeadlineToken> {
        self.active.as_ref().map(|a| DeadlineToken {
            session_id: a.session_id,
            deadline: a.deadline,
        })
    }

    /// Number of feature tuples collected so far
    pub fn collected(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.features.len())
    }

    /// Start collecting. An in-flight session is discarded along with its
    /// unsealed tuples, and its deadline token becomes stale.
    pub fn start(&mut self, now: DateTime<Utc>) -> CaptureStarted {
        let replaced = self.active.take().map(|old| {
            warn!(
                session_id = %old.session_id,
                discarded_frames = old.features.len(),
                "capture restarted while collecting; discarding in-flight session"
            );
            old.session_id
        });

        let session_id = Uuid::new_v4();
        let deadline = now + self.window;
        self.active = Some(ActiveCapture {
            session_id,
            started_at: now,
            deadline,
            features: Vec::new(),
            no_face_frames: 0,
            rejected_frames: 0,
        });

        info!(%session_id, window_ms = self.window.num_milliseconds(), "capture started");

        CaptureStarted {
            session_id,
            started_at: now,
            deadline,
            window_ms: self.window.num_milliseconds(),
            replaced,
        }
    }

    /// Append one frame's features. Returns `false` when not collecting.
    pub fn append(&mut self, features: FeatureTuple) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.features.push(features);
                true
            }
            None => false,
        }
    }

    /// Count a frame that arrived without a detected face.
    pub fn note_missing_face(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.no_face_frames = active.no_face_frames.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Count a frame whose landmarks could not be used. The window keeps collecting.
    pub fn note_rejected_frame(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.rejected_frames = active.rejected_frames.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Whether the current window's deadline has passed at `now`
    pub fn deadline_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.active.as_ref().is_some_and(|a| now >= a.deadline)
    }

    /// Seal the collecting session and move its data out.
    ///
    /// Returns `None` when idle or when a deadline token is stale.
    pub fn seal(&mut self, trigger: SealTrigger) -> Option<SealedCapture> {
        let reason = match trigger {
            SealTrigger::Manual => SealReason::Manual,
            SealTrigger::Deadline(token) => {
                let current = self.active.as_ref().map(|a| a.session_id);
                if current != Some(token.session_id) {
                    debug!(session_id = %token.session_id, "ignoring stale deadline");
                    return None;
                }
                SealReason::Deadline
            }
        };

        let active = self.active.take()?;
        info!(
            session_id = %active.session_id,
            frames = active.features.len(),
            no_face_frames = active.no_face_frames,
            rejected_frames = active.rejected_frames,
            ?reason,
            "capture sealed"
        );

        Some(SealedCapture {
            session_id: active.session_id,
            started_at: active.started_at,
            deadline: active.deadline,
            reason,
            features: active.features,
            no_face_frames: active.no_face_frames,
            rejected_frames: active.rejected_frames,
        })
    }

    /// Drop the collecting session without producing an outcome.
    pub fn cancel(&mut self) -> Option<Uuid> {
        self.active.take().map(|a| a.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap()
    }

    fn tuple(mouth_asym: f64) -> FeatureTuple {
        FeatureTuple {
            mouth_asym,
            gaze_asym: 0.0,
            mouth_width: 0.6,
            face_scale: 0.2,
        }
    }

    #[test]
    fn test_idle_session_ignores_frames() {
        let mut session = CaptureSession::default();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(!session.append(tuple(0.1)));
        assert!(!session.note_missing_face());
        assert!(!session.note_rejected_frame());
        assert!(session.seal(SealTrigger::Manual).is_none());
    }

    #[test]
    fn test_start_sets_eight_second_deadline() {
        let mut session = CaptureSession::default();
        let started = session.start(t0());
        assert_eq!(started.window_ms, 8_000);
        assert_eq!(started.deadline, t0() + TimeDelta::seconds(8));
        assert_eq!(started.replaced, None);
        assert_eq!(session.phase(), SessionPhase::Collecting);
        assert!(started.message().starts_with("Collecting 8 seconds of data"));
    }

    #[test]
    fn test_manual_seal_moves_data_once() {
        let mut session = CaptureSession::default();
        session.start(t0());
        session.append(tuple(0.1));
        session.append(tuple(0.2));
        session.note_missing_face();
        session.note_rejected_frame();

        let sealed = session.seal(SealTrigger::Manual).unwrap();
        assert_eq!(sealed.reason, SealReason::Manual);
        assert_eq!(sealed.features.len(), 2);
        assert_eq!(sealed.no_face_frames, 1);
        assert_eq!(sealed.rejected_frames, 1);

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.seal(SealTrigger::Manual).is_none());
    }

    #[test]
    fn test_deadline_after_manual_stop_is_ignored() {
        let mut session = CaptureSession::default();
        let token = session.start(t0()).token();
        session.append(tuple(0.1));

        assert!(session.seal(SealTrigger::Manual).is_some());
        assert!(session.seal(SealTrigger::Deadline(token)).is_none());
    }

    #[test]
    fn test_restart_discards_in_flight_data() {
        let mut session = CaptureSession::default();
        let first = session.start(t0());
        session.append(tuple(0.1));
        session.append(tuple(0.2));

        let second = session.start(t0() + TimeDelta::seconds(3));
        assert_eq!(second.replaced, Some(first.session_id));
        assert_ne!(second.session_id, first.session_id);
        assert_eq!(session.collected(), 0);

        // The replaced session's timer must not seal the new one
        assert!(session.seal(SealTrigger::Deadline(first.token())).is_none());
        assert!(session.is_collecting());

        let sealed = session.seal(SealTrigger::Deadline(second.token())).unwrap();
        assert_eq!(sealed.session_id, second.session_id);
        assert_eq!(sealed.reason, SealReason::Deadline);
        assert!(sealed.features.is_empty());
    }

    #[test]
    fn test_deadline_elapsed_is_inclusive() {
        let mut session = CaptureSession::new(TimeDelta::milliseconds(500));
        session.start(t0());
        assert!(!session.deadline_elapsed(t0() + TimeDelta::milliseconds(499)));
        assert!(session.deadline_elapsed(t0() + TimeDelta::milliseconds(500)));
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut session = CaptureSession::default();
        let started = session.start(t0());
        assert_eq!(session.cancel(), Some(started.session_id));
        assert!(session.seal(SealTrigger::Deadline(started.token())).is_none());
    }
}
