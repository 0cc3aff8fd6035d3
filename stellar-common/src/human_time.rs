//! Human-readable timestamps
//!
//! Parsing of transcript timestamps written by people (`"1:02.5"`,
//! `"0:01:02.500"`, `"62.5"`) and display formatting of millisecond
//! positions for the current/duration labels.

use crate::{Error, Result};

/// Display format selection thresholds (milliseconds)
const SHORT_FORMAT_MAX_MS: u64 = 100_000; // < 100s → X.XXs
const MEDIUM_FORMAT_MAX_MS: u64 = 6_000_000; // < 100m → M:SS.Xs
                                             // >= 100m → H:MM:SS

/// Parse a human-written timestamp into milliseconds.
///
/// Accepted forms:
/// - `SS` or `SS.fff` (seconds)
/// - `M:SS` or `M:SS.fff`
/// - `H:MM:SS` or `H:MM:SS.fff`
///
/// Fractional digits beyond milliseconds are truncated. Minutes and seconds
/// after the first field must be below 60.
///
/// # Examples
///
/// ```
/// use stellar_common::human_time::parse_timestamp_ms;
///
/// assert_eq!(parse_timestamp_ms("12.5").unwrap(), 12_500);
/// assert_eq!(parse_timestamp_ms("1:02.250").unwrap(), 62_250);
/// assert_eq!(parse_timestamp_ms("1:00:00").unwrap(), 3_600_000);
/// assert!(parse_timestamp_ms("1:75").is_err());
/// ```
pub fn parse_timestamp_ms(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTimestamp("empty timestamp".to_string()));
    }

    let invalid = || Error::InvalidTimestamp(trimmed.to_string());

    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() > 3 {
        return Err(invalid());
    }

    // Last field carries seconds and the optional fraction
    let (seconds_text, fraction_text) = match fields[fields.len() - 1].split_once('.') {
        Some((secs, frac)) => (secs, Some(frac)),
        None => (fields[fields.len() - 1], None),
    };

    let seconds = parse_digits(seconds_text).ok_or_else(invalid)?;
    let millis = match fraction_text {
        Some(frac) => parse_fraction_ms(frac).ok_or_else(invalid)?,
        None => 0,
    };

    let mut total_seconds = seconds;
    if fields.len() > 1 {
        if seconds >= 60 {
            return Err(invalid());
        }
        let minutes = parse_digits(fields[fields.len() - 2]).ok_or_else(invalid)?;
        if fields.len() == 3 && minutes >= 60 {
            return Err(invalid());
        }
        total_seconds = minutes
            .checked_mul(60)
            .and_then(|secs| secs.checked_add(total_seconds))
            .ok_or_else(invalid)?;
    }
    if fields.len() == 3 {
        let hours = parse_digits(fields[0]).ok_or_else(invalid)?;
        total_seconds = hours
            .checked_mul(3600)
            .and_then(|secs| secs.checked_add(total_seconds))
            .ok_or_else(invalid)?;
    }

    total_seconds
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(invalid)
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_fraction_ms(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: String = text.chars().chain("000".chars()).take(3).collect();
    digits.parse().ok()
}

/// Format a millisecond position for display.
///
/// Format selection by typical maximum value (usually the content duration):
/// - Short format (`X.XXs`): typical max < 100 seconds
/// - Medium format (`M:SS.Xs`): typical max 100s to 100m
/// - Long format (`H:MM:SS`): typical max >= 100m
///
/// Using the duration as `typical_max` keeps the current and duration labels
/// in the same format while playback advances.
///
/// # Examples
///
/// ```
/// use stellar_common::human_time::format_position_ms;
///
/// assert_eq!(format_position_ms(4_500, 60_000), "4.50s");
/// assert_eq!(format_position_ms(330_000, 600_000), "5:30.0s");
/// assert_eq!(format_position_ms(3_661_000, 7_200_000), "1:01:01");
/// ```
pub fn format_position_ms(position_ms: u64, typical_max_ms: u64) -> String {
    if typical_max_ms < SHORT_FORMAT_MAX_MS {
        format!("{:.2}s", position_ms as f64 / 1000.0)
    } else if typical_max_ms < MEDIUM_FORMAT_MAX_MS {
        let minutes = position_ms / 60_000;
        let secs = (position_ms % 60_000) as f64 / 1000.0;
        // Round down to tenths so 59.96s never renders as "60.0"
        let secs = (secs * 10.0).floor() / 10.0;
        format!("{}:{:04.1}s", minutes, secs)
    } else {
        let total_seconds = position_ms / 1000;
        let hours = total_seconds / 3600;
        let mins = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}
