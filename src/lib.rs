//! Tick forwarding engine.
//!
//! Given the ordered record stream of an external market-data feed, this
//! crate assigns a monotonic, gap-free output sequence to each qualifying
//! record exactly once, encodes records into a line-delimited JSON wire
//! format, and delivers the stream to one of two interchangeable sinks: an
//! append-only size-bounded file, or a reconnecting loopback TCP client.
//!
//! - `feed`: the feed collaborator contract plus in-memory and replay feeds
//! - `serial`: serial date-time to Unix-milliseconds conversion
//! - `cursor`: watermark disciplines deduplicating overlapping polls
//! - `wire`: output record and wire-line encoding
//! - `sink`: the delivery capability and the file sink
//! - `socket`: the non-blocking TCP client sink
//! - `export`: orchestration tying feed, cursor, encoder and sink together
//!
//! The binaries in this repository (`src/main.rs` and `src/bin/receiver.rs`)
//! use these modules to replay captured ticks into a sink and to watch the
//! socket stream.
pub mod cursor;
pub mod export;
pub mod feed;
pub mod serial;
pub mod sink;
pub mod socket;
pub mod wire;
