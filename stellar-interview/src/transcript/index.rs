//! Transcript timeline index
//!
//! Turns the raw line annotations of an interview transcript into a sorted,
//! non-overlapping timeline and answers "which line is active at T?".
//!
//! **Design:**
//! - Lines keep their input order; the builder validates ordering instead of
//!   sorting, so a transcript with shuffled lines is rejected rather than
//!   silently reinterpreted
//! - A missing end defaults to the next line's start; the last line may stay
//!   open until the content duration is known
//! - Lookup is a binary search over start times, cheap enough for every
//!   time-update tick

use serde::Serialize;
use stellar_common::LineId;
use thiserror::Error;

/// Reasons a transcript cannot be indexed
///
/// Line numbers are zero-based positions in the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTranscript {
    #[error("line {line} has no start timestamp")]
    MissingStart { line: usize },

    #[error("line {line} has an unreadable timestamp {value:?}")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line} starts at {start_ms}ms, before the previous line ({previous_start_ms}ms)")]
    OutOfOrder {
        line: usize,
        start_ms: u64,
        previous_start_ms: u64,
    },

    #[error("line {line} ends at {end_ms}ms, before its start ({start_ms}ms)")]
    EndBeforeStart {
        line: usize,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("line {line} ends at {end_ms}ms, overlapping the next line ({next_start_ms}ms)")]
    Overlap {
        line: usize,
        end_ms: u64,
        next_start_ms: u64,
    },
}

/// One line annotation as supplied by the transcript content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLine {
    /// Start of the line in milliseconds (required)
    pub start_ms: Option<u64>,
    /// End of the line in milliseconds (defaults to the next line's start)
    pub end_ms: Option<u64>,
    /// Speaker label, if the transcript names one
    pub speaker: Option<String>,
    /// Spoken text
    pub text: String,
}

impl RawLine {
    /// Line with explicit start and end
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            speaker: None,
            text: text.into(),
        }
    }

    /// Line with only a start; its end is derived when indexed
    pub fn starting_at(start_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: None,
            speaker: None,
            text: text.into(),
        }
    }

    /// Attach a speaker label
    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

/// A validated transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedLine {
    /// Handle of this line within its index
    pub id: LineId,
    /// Inclusive start (milliseconds)
    pub start_ms: u64,
    /// Exclusive end (milliseconds); None only for a trailing line that
    /// runs until the end of the content
    pub end_ms: Option<u64>,
    pub speaker: Option<String>,
    pub text: String,
}

impl TimedLine {
    /// Whether `timestamp_ms` falls in `[start, end)`
    ///
    /// An open end is closed by `content_end_ms` when the duration is known.
    pub fn contains(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> bool {
        if timestamp_ms < self.start_ms {
            return false;
        }
        match self.end_ms.or(content_end_ms) {
            Some(end) => timestamp_ms < end,
            None => true,
        }
    }
}

/// Immutable, sorted transcript timeline
///
/// # Examples
/// ```
/// use stellar_interview::transcript::{RawLine, TranscriptIndex};
///
/// let index = TranscriptIndex::build(vec![
///     RawLine::new(0, 1000, "Hello"),
///     RawLine::new(1000, 2000, "World"),
/// ]).unwrap();
///
/// assert_eq!(index.lookup(500).map(|id| id.index()), Some(0));
/// assert_eq!(index.lookup(1000).map(|id| id.index()), Some(1));
/// assert_eq!(index.lookup(2000), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TranscriptIndex {
    lines: Vec<TimedLine>,
}

impl TranscriptIndex {
    /// Validate and index raw line annotations
    ///
    /// Fails on the first line that lacks a start, starts before its
    /// predecessor, ends before it starts, or ends after the next line starts.
    pub fn build(raw: Vec<RawLine>) -> Result<Self, MalformedTranscript> {
        // Pass 1: every line needs a start, and starts must not go backwards
        let mut starts = Vec::with_capacity(raw.len());
        for (line, entry) in raw.iter().enumerate() {
            let start_ms = entry
                .start_ms
                .ok_or(MalformedTranscript::MissingStart { line })?;
            if let Some(&previous_start_ms) = starts.last() {
                if start_ms < previous_start_ms {
                    return Err(MalformedTranscript::OutOfOrder {
                        line,
                        start_ms,
                        previous_start_ms,
                    });
                }
            }
            starts.push(start_ms);
        }

        // Pass 2: resolve ends and check the non-overlap invariant
        let mut lines = Vec::with_capacity(raw.len());
        for (line, entry) in raw.into_iter().enumerate() {
            let start_ms = starts[line];
            let next_start_ms = starts.get(line + 1).copied();

            let end_ms = match (entry.end_ms, next_start_ms) {
                (Some(end_ms), Some(next_start_ms)) if end_ms > next_start_ms => {
                    return Err(MalformedTranscript::Overlap {
                        line,
                        end_ms,
                        next_start_ms,
                    });
                }
                (Some(end_ms), _) => Some(end_ms),
                (None, next) => next,
            };

            if let Some(end_ms) = end_ms {
                if end_ms < start_ms {
                    return Err(MalformedTranscript::EndBeforeStart {
                        line,
                        start_ms,
                        end_ms,
                    });
                }
            }

            lines.push(TimedLine {
                id: LineId(line),
                start_ms,
                end_ms,
                speaker: entry.speaker,
                text: entry.text,
            });
        }

        Ok(Self { lines })
    }

    /// Active line at `timestamp_ms`, treating an open trailing line as
    /// running forever
    pub fn lookup(&self, timestamp_ms: u64) -> Option<LineId> {
        self.lookup_bounded(timestamp_ms, None)
    }

    /// Active line at `timestamp_ms`, closing an open trailing line at
    /// `content_end_ms`
    ///
    /// Binary search on start times: the only candidate is the last line
    /// starting at or before the timestamp, because lines never overlap.
    pub fn lookup_bounded(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId> {
        let after = self.lines.partition_point(|l| l.start_ms <= timestamp_ms);
        let candidate = self.lines.get(after.checked_sub(1)?)?;
        candidate
            .contains(timestamp_ms, content_end_ms)
            .then_some(candidate.id)
    }

    /// Linear reference lookup
    ///
    /// Same answer as `lookup_bounded`; used to cross-check it.
    pub fn scan(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId> {
        self.lines
            .iter()
            .find(|l| l.contains(timestamp_ms, content_end_ms))
            .map(|l| l.id)
    }

    /// Line for a handle produced by this index
    pub fn line(&self, id: LineId) -> Option<&TimedLine> {
        self.lines.get(id.index())
    }

    /// All lines in timeline order
    pub fn lines(&self) -> &[TimedLine] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the transcript has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
