//! CSV import and export of the pipeline's tables.

pub mod export;
pub mod import;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Timestamp layout written to every output table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses a timestamp in any of the accepted input layouts.
///
/// # Examples
///
/// ```
/// use dc_flex::io::parse_timestamp;
///
/// let a = parse_timestamp("2024-07-01 13:15:00").unwrap();
/// let b = parse_timestamp("2024-07-01T13:15:00").unwrap();
/// let c = parse_timestamp("2024-07-01 13:15").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b, c);
/// ```
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| Error::Timestamp {
            raw: raw.to_string(),
        })
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
