//! FFI bindings for Asymmetry Screen
//!
//! This module provides C-compatible functions for calling the screening core from
//! other languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `asym_free_string`.
//!
//! Timestamps cross the boundary as milliseconds since the Unix epoch (UTC).

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::encoder::ReportPayload;
use crate::pipeline::{screen_frames, FrameDisposition, ScreeningProcessor};
use crate::schema::FrameRecord;
use crate::session::CaptureStarted;
use crate::types::SessionOutcome;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Serialize a value, recording the error on failure
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Encode a sealed outcome; `None` becomes NULL without an error
fn outcome_to_cstr(processor: &ScreeningProcessor, outcome: Option<SessionOutcome>) -> *mut c_char {
    match outcome {
        Some(outcome) => match processor.encode_to_json(&outcome) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => ptr::null_mut(),
    }
}

#[derive(Serialize)]
struct StartResponse {
    #[serde(flatten)]
    started: CaptureStarted,
    message: String,
}

#[derive(Serialize)]
struct ObserveResponse {
    disposition: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReportPayload>,
}

impl ObserveResponse {
    fn plain(disposition: &'static str) -> Self {
        Self {
            disposition,
            reason: None,
            report: None,
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Screen a JSON array of frame records as one capture window.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `asym_free_string`.
/// - Returns NULL on error; call `asym_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn asym_screen_frames(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match screen_frames(json_str) {
        Ok(payload) => string_to_cstr(&payload),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a ScreeningProcessor
pub struct ScreeningProcessorHandle {
    processor: ScreeningProcessor,
}

/// Create a new ScreeningProcessor.
///
/// # Safety
/// - `config_json` may be NULL for the default configuration, otherwise it must be a
///   valid null-terminated C string holding a configuration object.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `asym_processor_free`.
/// - Returns NULL on error; call `asym_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_new(
    config_json: *const c_char,
) -> *mut ScreeningProcessorHandle {
    clear_last_error();

    let processor = if config_json.is_null() {
        ScreeningProcessor::new()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match ScreeningProcessor::from_config_json(&json_str) {
            Ok(processor) => processor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(ScreeningProcessorHandle { processor });
    Box::into_raw(handle)
}

/// Free a ScreeningProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_free(processor: *mut ScreeningProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Open a capture window at `now_ms`, discarding any window in flight.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - Returns a newly allocated JSON string describing the window (session id,
///   deadline, status message) that must be freed with `asym_free_string`.
/// - Returns NULL on error; call `asym_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_start(
    processor: *mut ScreeningProcessorHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let now = match millis_to_utc(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let started = handle.processor.start(now);
    let message = started.message();
    json_to_cstr(&StartResponse { started, message })
}

/// Feed one face.landmark_frame.v1 record.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - `record_json` must be a valid null-terminated C string.
/// - Returns a newly allocated JSON string `{"disposition": ...}` that must be freed
///   with `asym_free_string`. When the record closed the window, `report` holds the
///   encoded report payload. Unusable records come back as `rejected` with a `reason`
///   and leave the window collecting.
/// - Returns NULL on error; call `asym_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_observe(
    processor: *mut ScreeningProcessorHandle,
    record_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(record_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let record: FrameRecord = match serde_json::from_str(&json_str) {
        Ok(record) => record,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let response = match handle.processor.observe_record(&record) {
        FrameDisposition::Recorded => ObserveResponse::plain("recorded"),
        FrameDisposition::NoFace => ObserveResponse::plain("no_face"),
        FrameDisposition::Rejected { reason } => ObserveResponse {
            reason: Some(reason),
            ..ObserveResponse::plain("rejected")
        },
        FrameDisposition::NotCollecting => ObserveResponse::plain("not_collecting"),
        FrameDisposition::WindowClosed(outcome) => ObserveResponse {
            report: Some(handle.processor.encode(&outcome)),
            ..ObserveResponse::plain("window_closed")
        },
    };

    json_to_cstr(&response)
}

/// Seal the window if its deadline has passed at `now_ms`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - Returns a newly allocated report payload JSON string that must be freed with
///   `asym_free_string`.
/// - Returns NULL with no error set when nothing was sealed.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_poll(
    processor: *mut ScreeningProcessorHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let now = match millis_to_utc(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let outcome = handle.processor.poll(now);
    outcome_to_cstr(&handle.processor, outcome)
}

/// Stop the collecting window manually at `now_ms`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - Returns a newly allocated report payload JSON string that must be freed with
///   `asym_free_string`.
/// - Returns NULL with no error set when no window was collecting.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_stop(
    processor: *mut ScreeningProcessorHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let now = match millis_to_utc(now_ms) {
        Some(now) => now,
        None => {
            set_last_error("Timestamp out of range");
            return ptr::null_mut();
        }
    };

    let outcome = handle.processor.stop(now);
    outcome_to_cstr(&handle.processor, outcome)
}

/// Render the most recent scored report as downloadable text.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `asym_processor_new`.
/// - Returns a newly allocated string that must be freed with `asym_free_string`.
/// - Returns NULL with no error set when no report has been produced yet.
#[no_mangle]
pub unsafe extern "C" fn asym_processor_report_text(
    processor: *mut ScreeningProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.last_report_text() {
        Ok(Some(text)) => string_to_cstr(&text),
        Ok(None) => ptr::null_mut(),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by asym functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an asym function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn asym_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next asym function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn asym_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn asym_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
