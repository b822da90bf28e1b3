//! Watermark disciplines deduplicating overlapping feed polls.
//!
//! The feed re-delivers its full window every poll, so the engine keeps a
//! watermark below which everything is already forwarded. Two disciplines
//! exist because the two sinks resume differently after a failure; each
//! gives at-most-once delivery per running instance. A process restart
//! re-derives a fresh watermark and may re-deliver records written before
//! the restart; there is no cross-restart deduplication.

use crate::feed::TickRecord;

/// Count-of-consumed-records watermark, used with the file sink.
///
/// Relies on the feed window being append-only across polls: records at
/// index >= the watermark are new, and after a pass the watermark moves to
/// the window size.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexCursor {
    seen: usize,
}

impl IndexCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice of `snapshot` not yet consumed.
    pub fn unseen<'a>(&self, snapshot: &'a [TickRecord]) -> &'a [TickRecord] {
        snapshot.get(self.seen..).unwrap_or(&[])
    }

    /// Mark the whole snapshot consumed.
    pub fn commit(&mut self, snapshot_len: usize) {
        self.seen = snapshot_len;
    }

    pub fn position(&self) -> usize {
        self.seen
    }
}

/// Feed-sequence watermark, used with the socket sink.
///
/// Tracks the feed's own sequence of the last examined record, so replay
/// after a disconnect resumes exactly where it left off without re-scanning
/// records that were filtered out.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeqCursor {
    last: Option<u64>,
}

impl SeqCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// First-activation latch: seed the watermark off the newest record so
    /// the backlog already buffered at startup is skipped instead of
    /// flooding the sink. Returns true when it seeded, in which case
    /// nothing from this snapshot is forwarded.
    pub fn seed(&mut self, snapshot: &[TickRecord]) -> bool {
        if self.last.is_some() {
            return false;
        }
        match snapshot.last() {
            Some(newest) => {
                self.last = Some(newest.sequence);
                true
            }
            None => false,
        }
    }

    pub fn is_new(&self, sequence: u64) -> bool {
        self.last.is_none_or(|w| sequence > w)
    }

    /// Advance past an examined record. Called for every record looked at,
    /// including kinds the encoder filters out.
    pub fn advance(&mut self, sequence: u64) {
        self.last = Some(self.last.map_or(sequence, |w| w.max(sequence)));
    }

    pub fn watermark(&self) -> Option<u64> {
        self.last
    }
}
