//! Feed collaborator contract and feed implementations.
//!
//! The engine never subscribes to events: it is re-invoked on the host's
//! own cadence and pulls the feed's full current window through a single
//! snapshot call. Record retrieval and symbol resolution stay on the feed
//! side of the boundary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Classification the feed assigns to each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickKind {
    Bid,
    Ask,
    /// Anything that is not a trade at bid or ask (markers, settlements).
    Other,
}

impl TickKind {
    /// Whether this kind is a trade at bid or ask. The socket path forwards
    /// only these; the file path forwards everything.
    pub fn is_trade(self) -> bool {
        matches!(self, TickKind::Bid | TickKind::Ask)
    }
}

/// One record as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub kind: TickKind,
    /// Feed-assigned sequence, non-decreasing within and across snapshots.
    pub sequence: u64,
    /// Serial date-time, elapsed days since 1899-12-31.
    pub serial: f64,
    /// Millisecond of the second; authoritative for the final three digits
    /// of the converted timestamp.
    pub millis: i32,
    pub price: f64,
    pub volume: u32,
}

/// Pull-based market data source.
///
/// `snapshot` returns the feed's full current record window, oldest first.
/// The window must be append-only across calls: new records only ever
/// appear at the end, never reordered. The engine relies on that contract
/// without verifying it.
pub trait TickFeed {
    fn symbol(&self) -> &str;
    fn snapshot(&self) -> &[TickRecord];
}

/// In-memory feed: the building block for tests and embedders that push
/// records from their own source.
pub struct MemoryFeed {
    symbol: String,
    records: Vec<TickRecord>,
}

impl MemoryFeed {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), records: Vec::new() }
    }

    /// Append one record to the window.
    pub fn push(&mut self, record: TickRecord) {
        self.records.push(record);
    }
}

impl TickFeed for MemoryFeed {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn snapshot(&self) -> &[TickRecord] {
        &self.records
    }
}

/// Feed that replays a capture file, one JSON `TickRecord` per line,
/// revealing up to `chunk` more records per [`ReplayFeed::advance`] call so
/// a driver loop can mimic live arrival.
pub struct ReplayFeed {
    symbol: String,
    records: Vec<TickRecord>,
    visible: usize,
    chunk: usize,
}

impl ReplayFeed {
    /// Load a capture file. `chunk` of zero reveals everything on the first
    /// advance.
    pub fn open(path: impl AsRef<Path>, symbol: impl Into<String>, chunk: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open capture {}", path.display()))?;
        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read {}:{}", path.display(), n + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TickRecord = serde_json::from_str(&line)
                .with_context(|| format!("parse {}:{}", path.display(), n + 1))?;
            records.push(record);
        }
        Ok(Self { symbol: symbol.into(), records, visible: 0, chunk })
    }

    /// Reveal the next batch of captured records; returns how many became
    /// visible.
    pub fn advance(&mut self) -> usize {
        let step = if self.chunk == 0 { self.records.len() } else { self.chunk };
        let next = (self.visible + step).min(self.records.len());
        let revealed = next - self.visible;
        self.visible = next;
        revealed
    }

    /// True once the whole capture is visible.
    pub fn exhausted(&self) -> bool {
        self.visible == self.records.len()
    }
}

impl TickFeed for ReplayFeed {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn snapshot(&self) -> &[TickRecord] {
        &self.records[..self.visible]
    }
}
