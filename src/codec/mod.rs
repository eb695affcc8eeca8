//! Record codec: delimited-text round trip for the roster and attendance files
//!
//! One record per line, comma-delimited, header row first. A field containing
//! the delimiter, a double quote, or a newline is wrapped in double quotes
//! with inner quotes doubled. Decoding uses a single strict quote-aware
//! parser for both streams; a delimiter or newline inside quotes is literal
//! data. Purely functional, no state.

use std::string::FromUtf8Error;

use chrono::{DateTime, Utc};
use chrono::Local;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AttendanceRecord, AttendanceStatus, Identity};

/// Header row of the roster file
pub const ROSTER_HEADER: &str = "id,name,role,department,image,registeredAt";

/// Header row of the attendance log file
pub const LOG_HEADER: &str = "id,userId,userName,role,timestamp,status,confidence";

// Reserved marker columns used to validate that a file is what it claims
// to be before any row is applied.
const ROSTER_MARKER: &str = "image";
const LOG_MARKER: &str = "timestamp";

const ROSTER_MIN_COLUMNS: usize = 6;
const LOG_MIN_COLUMNS: usize = 7;
const DELIMITER: char = ',';

/// Codec failures; a failed decode never partially applies a file
#[derive(Error, Debug)]
pub enum CodecError {
    /// The header row is missing the reserved marker column
    #[error("unrecognized file format: header is missing the '{0}' column")]
    InvalidHeader(&'static str),

    /// The byte stream is not valid UTF-8 text
    #[error("file is not valid UTF-8 text")]
    InvalidUtf8(#[from] FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Decode a raw byte blob into text, the first step of every import
pub fn text_from_bytes(bytes: Vec<u8>) -> Result<String> {
    Ok(String::from_utf8(bytes)?)
}

/// Encode the roster into its delimited-text form
pub fn encode_roster(roster: &[Identity]) -> String {
    let mut out = String::from(ROSTER_HEADER);
    for identity in roster {
        let row = [
            identity.id.to_string(),
            quoted(&identity.name),
            field(&identity.role),
            quoted(&identity.department),
            quoted(&identity.image),
            identity.registered_at.to_rfc3339(),
        ];
        out.push('\n');
        out.push_str(&row.join(","));
    }
    out
}

/// Encode the attendance log into its delimited-text form
pub fn encode_log(log: &[AttendanceRecord]) -> String {
    let mut out = String::from(LOG_HEADER);
    for record in log {
        let row = [
            record.id.to_string(),
            record.user_id.to_string(),
            quoted(&record.user_name),
            field(&record.role),
            record.timestamp.to_rfc3339(),
            record.status.to_string(),
            record.confidence.to_string(),
        ];
        out.push('\n');
        out.push_str(&row.join(","));
    }
    out
}

/// Decode a roster file.
///
/// The header must carry the `image` marker column or the whole file is
/// rejected. Blank lines and rows with fewer than the minimum column count
/// (or unparseable id/timestamp fields) are skipped so a partially corrupt
/// file still yields its good rows.
pub fn decode_roster(text: &str) -> Result<Vec<Identity>> {
    let mut records = split_records(text).into_iter();
    let header = records.next().unwrap_or_default();
    if !header.to_lowercase().contains(ROSTER_MARKER) {
        return Err(CodecError::InvalidHeader(ROSTER_MARKER));
    }

    let mut roster = Vec::new();
    for line in records {
        if line.trim().is_empty() {
            continue;
        }
        let cols = parse_record(&line);
        if cols.len() < ROSTER_MIN_COLUMNS {
            continue;
        }
        let Ok(id) = cols[0].parse::<Uuid>() else {
            continue;
        };
        let Ok(registered_at) = DateTime::parse_from_rfc3339(&cols[5]) else {
            continue;
        };
        roster.push(Identity {
            id,
            name: cols[1].clone(),
            role: cols[2].clone(),
            department: cols[3].clone(),
            image: cols[4].clone(),
            registered_at: registered_at.with_timezone(&Utc),
        });
    }
    Ok(roster)
}

/// Decode an attendance log file, with the same header and row tolerances
/// as [`decode_roster`]
pub fn decode_log(text: &str) -> Result<Vec<AttendanceRecord>> {
    let mut records = split_records(text).into_iter();
    let header = records.next().unwrap_or_default();
    if !header.to_lowercase().contains(LOG_MARKER) {
        return Err(CodecError::InvalidHeader(LOG_MARKER));
    }

    let mut log = Vec::new();
    for line in records {
        if line.trim().is_empty() {
            continue;
        }
        let cols = parse_record(&line);
        if cols.len() < LOG_MIN_COLUMNS {
            continue;
        }
        let Ok(id) = cols[0].parse::<Uuid>() else {
            continue;
        };
        let Ok(user_id) = cols[1].parse::<Uuid>() else {
            continue;
        };
        let Ok(timestamp) = DateTime::parse_from_rfc3339(&cols[4]) else {
            continue;
        };
        let Ok(status) = cols[5].parse::<AttendanceStatus>() else {
            continue;
        };
        let Ok(confidence) = cols[6].trim().parse::<f64>() else {
            continue;
        };
        log.push(AttendanceRecord {
            id,
            user_id,
            user_name: cols[2].clone(),
            role: cols[3].clone(),
            timestamp: timestamp.with_timezone(&Local),
            status,
            confidence,
        });
    }
    Ok(log)
}

/// Wrap a field in quotes, doubling any quotes it contains
pub(crate) fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quote a field only when it contains a character that needs it
fn field(value: &str) -> String {
    if value.contains([DELIMITER, '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

/// Split text into records on newlines that fall outside quoted fields.
///
/// A newline inside a quoted field is part of the field, so records cannot
/// be found with a plain line split.
fn split_records(text: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '\n' if !in_quotes => {
                if current.ends_with('\r') {
                    current.pop();
                }
                records.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Parse one record into fields.
///
/// Scans character by character toggling an in-quotes flag on each quote; a
/// delimiter seen while the flag is set is literal data. Outer quotes are
/// stripped and doubled quotes collapsed only after each field's span is
/// fully identified.
fn parse_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            DELIMITER if !in_quotes => {
                fields.push(unquote(std::mem::take(&mut current)));
            }
            _ => current.push(ch),
        }
    }
    fields.push(unquote(current));
    fields
}

/// Strip outer quotes and collapse doubled quotes from a raw field span
fn unquote(raw: String) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1].replace("\"\"", "\"")
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_identity(name: &str) -> Identity {
        Identity::new(name, "Student", "Physics, Applied", "aGVsbG8=")
    }

    fn sample_record(identity: &Identity) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: identity.id,
            user_name: identity.name.clone(),
            role: identity.role.clone(),
            timestamp: Local
                .with_ymd_and_hms(2026, 3, 2, 9, 12, 41)
                .single()
                .expect("valid local time"),
            status: AttendanceStatus::Present,
            confidence: 0.93,
        }
    }

    #[test]
    fn roster_round_trip_preserves_embedded_commas() {
        let roster = vec![sample_identity("Ana, T.")];
        let decoded = decode_roster(&encode_roster(&roster)).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "Ana, T.");
        assert_eq!(decoded[0].department, "Physics, Applied");
        assert_eq!(decoded[0].id, roster[0].id);
    }

    #[test]
    fn roster_round_trip_preserves_quotes_and_newlines() {
        let mut identity = sample_identity("Jo \"JJ\" Ngata");
        identity.department = "Line one\nLine two".to_string();
        let decoded = decode_roster(&encode_roster(&[identity.clone()])).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "Jo \"JJ\" Ngata");
        assert_eq!(decoded[0].department, "Line one\nLine two");
    }

    #[test]
    fn log_round_trip_is_exact() {
        let identity = sample_identity("Ana, T.");
        let record = sample_record(&identity);
        let decoded = decode_log(&encode_log(&[record.clone()])).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, record.id);
        assert_eq!(decoded[0].user_id, record.user_id);
        assert_eq!(decoded[0].user_name, "Ana, T.");
        assert_eq!(decoded[0].timestamp, record.timestamp);
        assert_eq!(decoded[0].status, record.status);
        assert_eq!(decoded[0].confidence, record.confidence);
    }

    #[test]
    fn roster_decode_rejects_missing_marker_column() {
        let text = "id,name,role\nabc,Ana,Student";
        let err = decode_roster(text).expect_err("should reject");
        assert!(matches!(err, CodecError::InvalidHeader("image")));
    }

    #[test]
    fn log_decode_rejects_missing_marker_column() {
        let text = "id,name,role\nabc,Ana,Student";
        let err = decode_log(text).expect_err("should reject");
        assert!(matches!(err, CodecError::InvalidHeader("timestamp")));
    }

    #[test]
    fn decode_skips_blank_lines_and_short_rows() {
        let identity = sample_identity("Ana");
        let mut text = encode_roster(&[identity]);
        text.push_str("\n\n   \nonly,three,columns\n");
        let decoded = decode_roster(&text).expect("decode");
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn decode_skips_rows_with_unparseable_fields() {
        let identity = sample_identity("Ana");
        let mut text = encode_roster(&[identity]);
        text.push_str("\nnot-a-uuid,\"Bo\",Student,\"Math\",\"img\",not-a-date");
        let decoded = decode_roster(&text).expect("decode");
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn delimiter_inside_quotes_is_literal() {
        let cols = parse_record("a,\"b,c\",d");
        assert_eq!(cols, vec!["a", "b,c", "d"]);
    }

    #[test]
    fn doubled_quotes_collapse_after_span_is_identified() {
        let cols = parse_record("\"say \"\"hi\"\", then go\",next");
        assert_eq!(cols, vec!["say \"hi\", then go", "next"]);
    }

    #[test]
    fn crlf_input_decodes_cleanly() {
        let identity = sample_identity("Ana");
        let text = encode_roster(&[identity.clone()]).replace('\n', "\r\n");
        let decoded = decode_roster(&text).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].name, "Ana");
    }
}
