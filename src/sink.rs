//! Delivery capability and the file sink.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::wire::OutputRecord;

/// Outcome of handing one record to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Record lost to a transient condition; the batch continues and the
    /// record is not retried.
    Skipped,
    /// Connection-level failure; the batch is abandoned.
    Down,
}

/// An output destination accepting encoded records one at a time.
///
/// `begin` prepares the sink for a batch and reports whether it can accept
/// records this poll: the file sink runs its rotation check and opens the
/// file, the socket sink drives its connect state machine. `end` closes
/// out the batch.
pub trait Sink {
    fn begin(&mut self) -> bool;
    fn deliver(&mut self, record: &OutputRecord) -> Delivery;
    fn end(&mut self);
}

/// Append-only, size-bounded file sink.
///
/// With a nonzero `max_kb`, a file grown past the limit is deleted before
/// the next batch. Full rotation, no archival: the size bound is a disk
/// safety valve, and readers must tolerate truncation-to-zero followed by
/// fresh appends. Rotation and append are not atomic with respect to a
/// concurrent reader.
pub struct FileSink {
    path: PathBuf,
    max_kb: u64,
    out: Option<BufWriter<File>>,
}

impl FileSink {
    /// `max_kb` of zero disables rotation.
    pub fn new(path: impl Into<PathBuf>, max_kb: u64) -> Self {
        Self { path: path.into(), max_kb, out: None }
    }

    fn rotate_if_oversized(&self) {
        if self.max_kb == 0 {
            return;
        }
        let Ok(meta) = fs::metadata(&self.path) else {
            return;
        };
        if meta.len() > self.max_kb * 1024 {
            match fs::remove_file(&self.path) {
                Ok(()) => info!(path = %self.path.display(), "tick file rotated (size limit reached)"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "tick file rotation failed"),
            }
        }
    }
}

impl Sink for FileSink {
    fn begin(&mut self) -> bool {
        self.rotate_if_oversized();
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => {
                self.out = Some(BufWriter::new(file));
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to open tick file");
                false
            }
        }
    }

    fn deliver(&mut self, record: &OutputRecord) -> Delivery {
        let Some(out) = self.out.as_mut() else {
            return Delivery::Skipped;
        };
        match writeln!(out, "{}", record.encode()) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!(seq = record.seq, error = %e, "tick write failed");
                Delivery::Skipped
            }
        }
    }

    fn end(&mut self) {
        if let Some(mut out) = self.out.take() {
            if let Err(e) = out.flush() {
                warn!(path = %self.path.display(), error = %e, "tick file flush failed");
            }
        }
    }
}
