//! Parsing and bulk validation of face.landmark_frame.v1 records

use crate::error::ScreenError;
use crate::schema::frame_record::*;

/// Adapter for reading frame records from JSON and NDJSON
pub struct FrameRecordAdapter;

impl FrameRecordAdapter {
    /// Parse a JSON string containing an array of FrameRecords
    pub fn parse_array(json: &str) -> Result<Vec<FrameRecord>, ScreenError> {
        let records: Vec<FrameRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing FrameRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameRecord>, ScreenError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FrameRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ScreenError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[FrameRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index,
                    frame_id: record.frame_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub frame_id: Option<String>,
    pub error: ValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"schema_version": "face.landmark_frame.v1", "frame_id": "a", "timestamp": "2024-05-02T09:30:00Z"}"#;
    const BAD_VERSION: &str = r#"{"schema_version": "other", "frame_id": "b", "timestamp": "2024-05-02T09:30:01Z"}"#;

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let input = format!("{GOOD}\n\n  \n{GOOD}\n");
        let records = FrameRecordAdapter::parse_ndjson(&input).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let input = format!("{GOOD}\nnot json\n");
        match FrameRecordAdapter::parse_ndjson(&input) {
            Err(ScreenError::ParseError(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_array() {
        let input = format!("[{GOOD}, {BAD_VERSION}]");
        let records = FrameRecordAdapter::parse_array(&input).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_validate_records_returns_failures_only() {
        let input = format!("[{GOOD}, {BAD_VERSION}, {GOOD}]");
        let records = FrameRecordAdapter::parse_array(&input).unwrap();
        let failures = FrameRecordAdapter::validate_records(&records);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].frame_id.as_deref(), Some("b"));
    }
}
