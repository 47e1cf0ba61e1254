//! Asymmetry Screen - facial-asymmetry screening score from facial landmarks
//!
//! Turns a short window of per-frame facial landmarks into a 0-100 asymmetry
//! score through a deterministic pipeline: landmark anchoring → per-frame
//! feature extraction → capture-window collection → aggregation → report
//! encoding.
//!
//! This is a demo screening aid, not a medical device. Every exported report
//! carries a fixed disclaimer.
//!
//! ## Modules
//!
//! - **Features**: Scale-normalized mouth and eye asymmetry proxies per frame
//! - **Session**: Time-boxed capture window with manual stop and stale-deadline guards
//! - **Aggregate**: Window statistics, weighted score and advisory tier

pub mod aggregate;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod landmarks;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregate::{aggregate, classify_score, SessionAggregator};
pub use config::ScreenConfig;
pub use encoder::{render_text, ReportEncoder, ReportPayload};
pub use error::ScreenError;
pub use features::{compute_features, FeatureExtractor};
pub use landmarks::LandmarkIndexMap;
pub use pipeline::{screen_frames, FrameDisposition, ScreeningProcessor};
pub use session::{CaptureSession, CaptureStarted, DeadlineToken};
pub use types::{
    FeatureSummary, FeatureTuple, LandmarkPoint, LandmarkSet, Report, RiskTier, ScreeningOutcome,
    SessionOutcome,
};

// Schema exports
pub use schema::{FrameRecord, FrameRecordAdapter, SCHEMA_VERSION};

/// Crate version embedded in all report payloads
pub const SCREEN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report payloads
pub const PRODUCER_NAME: &str = "asymmetry-screen";
