//! Transcript file format
//!
//! Transcripts are TOML documents with one `[[line]]` table per spoken line.
//! Timestamps are either integer milliseconds or human-readable strings
//! (`"SS.fff"`, `"M:SS.fff"`, `"H:MM:SS.fff"`).
//!
//! ```toml
//! [[line]]
//! start = "0:00"
//! end = "0:04.250"
//! speaker = "Host"
//! text = "Welcome back to the show."
//!
//! [[line]]
//! start = 4250
//! text = "Thanks for having me."
//! ```
//!
//! Parsing only turns the file into raw records. Ordering and overlap rules
//! are enforced by `TranscriptIndex::build`.

use super::index::{MalformedTranscript, RawLine};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use stellar_common::human_time::parse_timestamp_ms;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TranscriptFile {
    #[serde(default)]
    line: Vec<LineRecord>,
}

#[derive(Debug, Deserialize)]
struct LineRecord {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    speaker: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Millis(u64),
    Text(String),
}

impl Timestamp {
    fn resolve(self, line: usize) -> std::result::Result<u64, MalformedTranscript> {
        match self {
            Timestamp::Millis(ms) => Ok(ms),
            Timestamp::Text(value) => parse_timestamp_ms(&value)
                .map_err(|_| MalformedTranscript::InvalidTimestamp { line, value }),
        }
    }
}

/// Parse transcript TOML into raw line records
pub fn parse_transcript(content: &str) -> Result<Vec<RawLine>> {
    let file: TranscriptFile =
        toml::from_str(content).map_err(|e| Error::TranscriptFile(e.to_string()))?;

    let lines = file
        .line
        .into_iter()
        .enumerate()
        .map(|(line, record)| {
            Ok(RawLine {
                start_ms: record.start.map(|t| t.resolve(line)).transpose()?,
                end_ms: record.end.map(|t| t.resolve(line)).transpose()?,
                speaker: record.speaker,
                text: record.text,
            })
        })
        .collect::<std::result::Result<Vec<_>, MalformedTranscript>>()?;

    Ok(lines)
}

/// Read and parse a transcript file
pub fn load_transcript_file(path: &Path) -> Result<Vec<RawLine>> {
    let content = std::fs::read_to_string(path)?;
    let lines = parse_transcript(&content)?;
    debug!("Read {} transcript lines from {}", lines.len(), path.display());
    Ok(lines)
}
