//! Exporter orchestration: feed snapshot → cursor → encode → sink.
//!
//! One exporter instance lives for the whole session and is re-invoked by
//! the host loop; one invocation runs to completion before the next
//! begins, so no locking is needed anywhere below. Data-path failures are
//! logged and never surfaced as errors: the policy throughout is forward
//! progress and bounded latency over completeness.

use std::path::PathBuf;

use tracing::info;

use crate::cursor::{IndexCursor, SeqCursor};
use crate::feed::{TickFeed, TickRecord};
use crate::serial::serial_to_unix_ms;
use crate::sink::{Delivery, FileSink, Sink};
use crate::socket::SocketSink;
use crate::wire::{OutputRecord, side_label_lenient, side_label_strict};

/// Delivered records between informational log lines.
const LOG_EVERY: u64 = 100;

/// Watermark discipline, tied to the sink kind because the two sinks have
/// different failure and resume semantics.
enum Discipline {
    Index(IndexCursor),
    Sequence(SeqCursor),
}

/// Forwards qualifying feed records to a sink exactly once each, in feed
/// order, with a gap-free output sequence.
pub struct Exporter {
    sink: Box<dyn Sink>,
    discipline: Discipline,
    /// Last assigned output sequence; the next record gets `out_seq + 1`.
    out_seq: u64,
    total: u64,
    since_log: u64,
}

impl Exporter {
    /// File-backed exporter: index watermark, lenient side labels.
    pub fn to_file(path: impl Into<PathBuf>, max_kb: u64) -> Self {
        Self::with_sink(
            Box::new(FileSink::new(path, max_kb)),
            Discipline::Index(IndexCursor::new()),
        )
    }

    /// Socket-backed exporter: sequence watermark, strict side labels.
    pub fn to_socket(port: u16) -> Self {
        Self::with_sink(
            Box::new(SocketSink::new(port)),
            Discipline::Sequence(SeqCursor::new()),
        )
    }

    fn with_sink(sink: Box<dyn Sink>, discipline: Discipline) -> Self {
        Self { sink, discipline, out_seq: 0, total: 0, since_log: 0 }
    }

    /// Records delivered since construction.
    pub fn delivered(&self) -> u64 {
        self.total
    }

    /// Run one host-driven poll. Returns how many records the sink
    /// accepted this pass.
    pub fn poll(&mut self, feed: &dyn TickFeed) -> usize {
        let snapshot = feed.snapshot();
        let sent = match self.discipline {
            Discipline::Index(_) => self.poll_index(feed.symbol(), snapshot),
            Discipline::Sequence(_) => self.poll_sequence(feed.symbol(), snapshot),
        };
        self.note_delivered(sent as u64);
        sent
    }

    fn poll_index(&mut self, symbol: &str, snapshot: &[TickRecord]) -> usize {
        if snapshot.is_empty() {
            return 0;
        }
        let Discipline::Index(cursor) = &mut self.discipline else {
            return 0;
        };
        if cursor.unseen(snapshot).is_empty() {
            cursor.commit(snapshot.len());
            return 0;
        }
        // An unopenable file drops the batch but the watermark advances
        // anyway; those records are not retried.
        if !self.sink.begin() {
            cursor.commit(snapshot.len());
            return 0;
        }
        let mut sent = 0;
        for record in cursor.unseen(snapshot) {
            // The file path does not filter: unrecognized kinds go out
            // labeled UNKNOWN. Only the socket path drops non-trades.
            self.out_seq += 1;
            let out = OutputRecord {
                seq: self.out_seq,
                timestamp_ms: serial_to_unix_ms(record.serial, record.millis),
                price: record.price,
                volume: record.volume,
                side: side_label_lenient(record.kind),
                symbol: symbol.to_string(),
            };
            match self.sink.deliver(&out) {
                Delivery::Sent => sent += 1,
                Delivery::Skipped => {}
                Delivery::Down => break,
            }
        }
        self.sink.end();
        cursor.commit(snapshot.len());
        sent
    }

    fn poll_sequence(&mut self, symbol: &str, snapshot: &[TickRecord]) -> usize {
        // The connection is driven before any records are consumed; while
        // the socket is down the watermark stays put and the unseen range
        // is retried entirely on the next poll.
        if !self.sink.begin() {
            return 0;
        }
        if snapshot.is_empty() {
            return 0;
        }
        let Discipline::Sequence(cursor) = &mut self.discipline else {
            return 0;
        };
        if cursor.seed(snapshot) {
            return 0;
        }
        let mut sent = 0;
        for record in snapshot {
            if !cursor.is_new(record.sequence) {
                continue;
            }
            // The watermark moves per examined record, filtered kinds
            // included, so a resume never re-scans non-trades.
            cursor.advance(record.sequence);
            if !record.kind.is_trade() {
                continue;
            }
            self.out_seq += 1;
            let out = OutputRecord {
                seq: self.out_seq,
                timestamp_ms: serial_to_unix_ms(record.serial, record.millis),
                price: record.price,
                volume: record.volume,
                side: side_label_strict(record.kind),
                symbol: symbol.to_string(),
            };
            match self.sink.deliver(&out) {
                Delivery::Sent => sent += 1,
                // transient backpressure: the one record is lost, the
                // batch continues and the watermark stands
                Delivery::Skipped => {}
                // connection lost: batch abandoned, records examined so
                // far are gone, the rest resume after reconnect
                Delivery::Down => break,
            }
        }
        self.sink.end();
        sent
    }

    fn note_delivered(&mut self, sent: u64) {
        self.total += sent;
        self.since_log += sent;
        if self.since_log >= LOG_EVERY {
            info!(recent = self.since_log, total = self.total, "exported ticks");
            self.since_log = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{MemoryFeed, TickKind};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct SinkLog {
        accept: bool,
        lines: Vec<String>,
        /// Scripted outcomes for upcoming deliveries; defaults to Sent.
        outcomes: VecDeque<Delivery>,
        begins: usize,
        ends: usize,
    }

    #[derive(Clone)]
    struct ScriptedSink(Rc<RefCell<SinkLog>>);

    impl ScriptedSink {
        fn accepting() -> Self {
            Self(Rc::new(RefCell::new(SinkLog { accept: true, ..SinkLog::default() })))
        }

        fn lines(&self) -> Vec<String> {
            self.0.borrow().lines.clone()
        }
    }

    impl Sink for ScriptedSink {
        fn begin(&mut self) -> bool {
            let mut log = self.0.borrow_mut();
            log.begins += 1;
            log.accept
        }

        fn deliver(&mut self, record: &OutputRecord) -> Delivery {
            let mut log = self.0.borrow_mut();
            let outcome = log.outcomes.pop_front().unwrap_or(Delivery::Sent);
            if outcome == Delivery::Sent {
                log.lines.push(record.encode());
            }
            outcome
        }

        fn end(&mut self) {
            self.0.borrow_mut().ends += 1;
        }
    }

    fn tick(kind: TickKind, sequence: u64, price: f64) -> TickRecord {
        TickRecord { kind, sequence, serial: 25569.0, millis: 0, price, volume: 1 }
    }

    fn file_exporter(sink: &ScriptedSink) -> Exporter {
        Exporter::with_sink(Box::new(sink.clone()), Discipline::Index(IndexCursor::new()))
    }

    fn socket_exporter(sink: &ScriptedSink) -> Exporter {
        Exporter::with_sink(Box::new(sink.clone()), Discipline::Sequence(SeqCursor::new()))
    }

    #[test]
    fn index_discipline_forwards_each_record_once_in_order() {
        let sink = ScriptedSink::accepting();
        let mut exporter = file_exporter(&sink);
        let mut feed = MemoryFeed::new("ES");
        feed.push(tick(TickKind::Bid, 1, 10.0));
        feed.push(tick(TickKind::Ask, 2, 11.0));

        assert_eq!(exporter.poll(&feed), 2);
        // same snapshot again: nothing new
        assert_eq!(exporter.poll(&feed), 0);

        feed.push(tick(TickKind::Bid, 3, 12.0));
        assert_eq!(exporter.poll(&feed), 1);

        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"seq\":1") && lines[0].contains("\"p\":10.00"));
        assert!(lines[1].contains("\"seq\":2") && lines[1].contains("\"s\":\"ASK\""));
        assert!(lines[2].contains("\"seq\":3") && lines[2].contains("\"p\":12.00"));
    }

    #[test]
    fn file_path_forwards_unrecognized_kinds_as_unknown() {
        let sink = ScriptedSink::accepting();
        let mut exporter = file_exporter(&sink);
        let mut feed = MemoryFeed::new("ES");
        feed.push(tick(TickKind::Other, 1, 0.0));
        feed.push(tick(TickKind::Bid, 2, 10.0));
        feed.push(tick(TickKind::Other, 3, 0.0));
        feed.push(tick(TickKind::Ask, 4, 11.0));

        // nothing is filtered on the file path
        assert_eq!(exporter.poll(&feed), 4);
        let lines = sink.lines();
        assert!(lines[0].contains("\"seq\":1") && lines[0].contains("\"s\":\"UNKNOWN\""));
        assert!(lines[1].contains("\"seq\":2") && lines[1].contains("\"s\":\"BID\""));
        assert!(lines[2].contains("\"seq\":3") && lines[2].contains("\"s\":\"UNKNOWN\""));
        assert!(lines[3].contains("\"seq\":4") && lines[3].contains("\"s\":\"ASK\""));
    }

    #[test]
    fn unacceptable_sink_drops_batch_but_index_watermark_advances() {
        let sink = ScriptedSink(Rc::new(RefCell::new(SinkLog::default())));
        let mut exporter = file_exporter(&sink);
        let mut feed = MemoryFeed::new("ES");
        feed.push(tick(TickKind::Bid, 1, 10.0));

        assert_eq!(exporter.poll(&feed), 0);
        sink.0.borrow_mut().accept = true;

        // the dropped record is not retried; only newly appended ones flow
        feed.push(tick(TickKind::Ask, 2, 11.0));
        assert_eq!(exporter.poll(&feed), 1);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"seq\":1") && lines[0].contains("\"s\":\"ASK\""));
    }

    #[test]
    fn skipped_delivery_is_lost_but_batch_continues() {
        let sink = ScriptedSink::accepting();
        sink.0.borrow_mut().outcomes = VecDeque::from([Delivery::Sent, Delivery::Skipped]);
        let mut exporter = file_exporter(&sink);
        let mut feed = MemoryFeed::new("ES");
        feed.push(tick(TickKind::Bid, 1, 10.0));
        feed.push(tick(TickKind::Bid, 2, 11.0));
        feed.push(tick(TickKind::Bid, 3, 12.0));

        assert_eq!(exporter.poll(&feed), 2);
        // the skipped record still consumed out_seq 2 and is never retried
        let lines = sink.lines();
        assert!(lines[0].contains("\"seq\":1"));
        assert!(lines[1].contains("\"seq\":3"));
        assert_eq!(exporter.poll(&feed), 0);
    }

    #[test]
    fn sequence_discipline_seeds_then_forwards_only_new_records() {
        let sink = ScriptedSink::accepting();
        let mut exporter = socket_exporter(&sink);
        let mut feed = MemoryFeed::new("NQ");
        feed.push(tick(TickKind::Bid, 11, 10.0));
        feed.push(tick(TickKind::Ask, 12, 11.0));

        // first activation seeds the watermark off the newest record
        assert_eq!(exporter.poll(&feed), 0);
        assert!(sink.lines().is_empty());

        feed.push(tick(TickKind::Bid, 13, 12.0));
        assert_eq!(exporter.poll(&feed), 1);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"seq\":1") && lines[0].contains("\"p\":12.00"));
    }

    #[test]
    fn sequence_watermark_advances_past_filtered_kinds() {
        let sink = ScriptedSink::accepting();
        let mut exporter = socket_exporter(&sink);
        let mut feed = MemoryFeed::new("NQ");
        feed.push(tick(TickKind::Bid, 1, 10.0));
        assert_eq!(exporter.poll(&feed), 0); // seed

        feed.push(tick(TickKind::Other, 2, 0.0));
        assert_eq!(exporter.poll(&feed), 0);
        // the non-trade was examined, not forwarded, and is never revisited
        assert_eq!(exporter.poll(&feed), 0);

        feed.push(tick(TickKind::Ask, 3, 11.0));
        assert_eq!(exporter.poll(&feed), 1);
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn down_sink_abandons_batch_and_resumes_after_reconnect() {
        let sink = ScriptedSink::accepting();
        sink.0.borrow_mut().outcomes = VecDeque::from([Delivery::Sent, Delivery::Down]);
        let mut exporter = socket_exporter(&sink);
        let mut feed = MemoryFeed::new("NQ");
        feed.push(tick(TickKind::Bid, 1, 10.0));
        assert_eq!(exporter.poll(&feed), 0); // seed

        feed.push(tick(TickKind::Bid, 2, 11.0));
        feed.push(tick(TickKind::Bid, 3, 12.0));
        feed.push(tick(TickKind::Bid, 4, 13.0));
        // record 2 sent, record 3 lost to the failure, 4 left unexamined
        assert_eq!(exporter.poll(&feed), 1);

        // next poll resumes at record 4
        assert_eq!(exporter.poll(&feed), 1);
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"p\":11.00"));
        assert!(lines[1].contains("\"p\":13.00"));
        // out_seq 2 was consumed by the lost record; delivery resumes at 3
        assert!(lines[1].contains("\"seq\":3"));
    }

    #[test]
    fn disconnected_sink_leaves_sequence_watermark_untouched() {
        let sink = ScriptedSink::accepting();
        let mut exporter = socket_exporter(&sink);
        let mut feed = MemoryFeed::new("NQ");
        feed.push(tick(TickKind::Bid, 1, 10.0));
        assert_eq!(exporter.poll(&feed), 0); // seed

        sink.0.borrow_mut().accept = false;
        feed.push(tick(TickKind::Ask, 2, 11.0));
        assert_eq!(exporter.poll(&feed), 0);

        // once the sink accepts again the held-back record flows
        sink.0.borrow_mut().accept = true;
        assert_eq!(exporter.poll(&feed), 1);
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn empty_snapshot_is_a_no_op() {
        let sink = ScriptedSink::accepting();
        let mut exporter = file_exporter(&sink);
        let feed = MemoryFeed::new("ES");
        assert_eq!(exporter.poll(&feed), 0);
        assert_eq!(sink.0.borrow().begins, 0);
    }
}
