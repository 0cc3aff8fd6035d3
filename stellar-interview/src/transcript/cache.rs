//! Memoized active-line lookup
//!
//! Time updates arrive several times per second and most of them repeat the
//! previous timestamp or land inside the same line. The cache remembers the
//! last (timestamp, answer) pair and only consults the index when the
//! timestamp differs.

use super::index::TranscriptIndex;
use std::sync::Arc;
use stellar_common::LineId;

/// Anything that can answer "which line is active at T?"
pub trait LineLookup {
    fn lookup_bounded(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId>;
}

impl LineLookup for TranscriptIndex {
    fn lookup_bounded(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId> {
        TranscriptIndex::lookup_bounded(self, timestamp_ms, content_end_ms)
    }
}

impl<L: LineLookup + ?Sized> LineLookup for Arc<L> {
    fn lookup_bounded(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId> {
        (**self).lookup_bounded(timestamp_ms, content_end_ms)
    }
}

impl<L: LineLookup + ?Sized> LineLookup for &L {
    fn lookup_bounded(&self, timestamp_ms: u64, content_end_ms: Option<u64>) -> Option<LineId> {
        (**self).lookup_bounded(timestamp_ms, content_end_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    timestamp_ms: u64,
    line: Option<LineId>,
}

/// Single-entry memo in front of a `LineLookup`
///
/// Invariant: `active_line(t)` always equals `source.lookup_bounded(t, end)`
/// for the current content end; the memo only avoids recomputation.
#[derive(Debug)]
pub struct ActiveLineCache<L = Arc<TranscriptIndex>> {
    source: L,
    content_end_ms: Option<u64>,
    last: Option<CacheEntry>,
}

impl<L: LineLookup> ActiveLineCache<L> {
    pub fn new(source: L) -> Self {
        Self {
            source,
            content_end_ms: None,
            last: None,
        }
    }

    /// Active line at `timestamp_ms`
    pub fn active_line(&mut self, timestamp_ms: u64) -> Option<LineId> {
        if let Some(entry) = self.last {
            if entry.timestamp_ms == timestamp_ms {
                return entry.line;
            }
        }

        let line = self.source.lookup_bounded(timestamp_ms, self.content_end_ms);
        self.last = Some(CacheEntry { timestamp_ms, line });
        line
    }

    /// Record the content duration used to close an open trailing line
    ///
    /// A zero duration means "unknown". Changing the bound drops the memo.
    pub fn set_content_end(&mut self, duration_ms: u64) {
        let content_end_ms = (duration_ms > 0).then_some(duration_ms);
        if content_end_ms != self.content_end_ms {
            self.content_end_ms = content_end_ms;
            self.invalidate();
        }
    }

    /// Forget the memoized answer
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn source(&self) -> &L {
        &self.source
    }
}
