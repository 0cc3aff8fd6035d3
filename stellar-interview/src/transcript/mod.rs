//! Transcript indexing and active-line lookup
//!
//! - `index`: immutable, sorted `TranscriptIndex` built once per player
//! - `cache`: `ActiveLineCache` memoizing the last timestamp lookup
//! - `source`: TOML transcript files → raw line records

pub mod cache;
pub mod index;
pub mod source;

pub use cache::{ActiveLineCache, LineLookup};
pub use index::{MalformedTranscript, RawLine, TimedLine, TranscriptIndex};
pub use source::{load_transcript_file, parse_transcript};
