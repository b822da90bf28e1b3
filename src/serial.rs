//! Serial date-time conversion.
//!
//! The feed timestamps records as "elapsed days since 1899-12-31" floats,
//! where serial day 25569.0 is 1970-01-01. At present-day day counts the
//! float has lost sub-second precision, so the feed supplies the
//! millisecond of the second separately and the conversion takes the whole
//! seconds from the serial value and the final three digits from the
//! explicit millisecond field. Substituting a direct float-to-millisecond
//! conversion makes day-boundary-adjacent timestamps disagree with the feed.

/// Serial day number of the Unix epoch (1970-01-01).
pub const UNIX_EPOCH_SERIAL_DAYS: f64 = 25569.0;

/// Milliseconds in one day.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Convert a serial date-time plus an explicit millisecond-of-second into
/// Unix epoch milliseconds.
///
/// `millis` is composed as-is: values outside `0..1000`, including negative
/// ones, are not clamped.
pub fn serial_to_unix_ms(serial: f64, millis: i32) -> i64 {
    let whole_ms = ((serial - UNIX_EPOCH_SERIAL_DAYS) * MS_PER_DAY).round() as i64;
    (whole_ms / 1000) * 1000 + i64::from(millis)
}
