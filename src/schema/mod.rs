//! face.landmark_frame.v1 input schema
//!
//! Serialized form of the per-frame detector callback, used by the CLI, the
//! FFI surface and the one-shot pipeline entry point.

mod adapter;
mod frame_record;

pub use adapter::*;
pub use frame_record::*;
