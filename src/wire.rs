//! Output record and line-delimited wire encoding.
//!
//! One JSON object per line, UTF-8, newline-terminated by the sinks:
//!
//! ```text
//! {"seq":3,"ts":1000,"p":1234.50,"v":7,"s":"BID","sym":"ES"}
//! ```
//!
//! `p` is pinned to exactly two decimal digits, which no JSON serializer
//! emits for an `f64`, so the line is formatted by hand; only the symbol
//! goes through serde_json, for string escaping.

use crate::feed::TickKind;

/// A fully prepared output record: engine sequence assigned, timestamp
/// converted, side labeled. Immutable, consumed once by a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// Engine-assigned sequence, strictly increasing from 1, never reset
    /// for the life of the exporter.
    pub seq: u64,
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: u32,
    pub side: &'static str,
    pub symbol: String,
}

/// Side label used on the file path: an unrecognized kind passes through
/// as `"UNKNOWN"` instead of being dropped here.
pub fn side_label_lenient(kind: TickKind) -> &'static str {
    match kind {
        TickKind::Ask => "ASK",
        TickKind::Bid => "BID",
        TickKind::Other => "UNKNOWN",
    }
}

/// Side label used on the socket path, which filters non-trades before
/// encoding: anything that is not an ask is labeled a bid. Kept distinct
/// from the lenient labeler on purpose; the two paths have always
/// disagreed on this and downstream consumers may rely on either.
pub fn side_label_strict(kind: TickKind) -> &'static str {
    if kind == TickKind::Ask { "ASK" } else { "BID" }
}

impl OutputRecord {
    /// Encode to one wire line, without the trailing newline.
    pub fn encode(&self) -> String {
        let symbol = serde_json::to_string(&self.symbol).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            "{{\"seq\":{},\"ts\":{},\"p\":{:.2},\"v\":{},\"s\":\"{}\",\"sym\":{}}}",
            self.seq, self.timestamp_ms, self.price, self.volume, self.side, symbol,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_exact_wire_line() {
        let rec = OutputRecord {
            seq: 3,
            timestamp_ms: 1000,
            price: 1234.5,
            volume: 7,
            side: side_label_lenient(TickKind::Bid),
            symbol: "ES".to_string(),
        };
        assert_eq!(rec.encode(), r#"{"seq":3,"ts":1000,"p":1234.50,"v":7,"s":"BID","sym":"ES"}"#);
    }

    #[test]
    fn symbol_is_json_escaped() {
        let rec = OutputRecord {
            seq: 1,
            timestamp_ms: 0,
            price: 1.0,
            volume: 1,
            side: "ASK",
            symbol: "E\"S".to_string(),
        };
        assert_eq!(rec.encode(), r#"{"seq":1,"ts":0,"p":1.00,"v":1,"s":"ASK","sym":"E\"S"}"#);
    }

    #[test]
    fn side_labels_disagree_on_unrecognized_kinds() {
        assert_eq!(side_label_lenient(TickKind::Ask), "ASK");
        assert_eq!(side_label_lenient(TickKind::Bid), "BID");
        assert_eq!(side_label_lenient(TickKind::Other), "UNKNOWN");

        assert_eq!(side_label_strict(TickKind::Ask), "ASK");
        assert_eq!(side_label_strict(TickKind::Bid), "BID");
        assert_eq!(side_label_strict(TickKind::Other), "BID");
    }

    #[test]
    fn negative_timestamps_encode_as_signed() {
        let rec = OutputRecord {
            seq: 2,
            timestamp_ms: -86_400_000,
            price: 0.5,
            volume: 10,
            side: "BID",
            symbol: "ES".to_string(),
        };
        assert_eq!(rec.encode(), r#"{"seq":2,"ts":-86400000,"p":0.50,"v":10,"s":"BID","sym":"ES"}"#);
    }
}
