// ISO-8601 timestamp decoding shared by the Fermi and ICAT payloads

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::warn;

/// Decode an ISO-8601 timestamp with optional fractional seconds.
///
/// Accepts `2013-04-05T16:17:56.246-04:00`, `2013-04-05T16:17:56-04:00`,
/// compact offsets (`-0400`) and offset-less values, which are read as UTC.
/// Anything else decodes to `None`.
pub fn decode_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }

    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().fixed_offset());
    }

    warn!(timestamp = %value, "Could not parse timestamp");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_fractional_and_whole_seconds() {
        let with_frac = decode_time("2013-04-05T16:17:56.246-04:00").unwrap();
        let whole = decode_time("2013-04-05T16:17:56-04:00").unwrap();

        assert_eq!(with_frac.timestamp(), whole.timestamp());
        assert_eq!(with_frac.offset(), whole.offset());
        assert_eq!(with_frac.nanosecond() / 1_000_000, 246);
        assert_eq!(whole.nanosecond(), 0);
        assert_eq!(
            (with_frac - whole).num_milliseconds(),
            246,
            "only sub-second precision differs"
        );
    }

    #[test]
    fn test_fermi_utc_offset() {
        let ts = decode_time("2014-02-14T21:25:58+00:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.hour(), 21);
    }

    #[test]
    fn test_compact_offset() {
        let ts = decode_time("2013-04-05T16:17:56.246-0400").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_unparseable_is_none() {
        assert!(decode_time("not a timestamp").is_none());
        assert!(decode_time("").is_none());
        assert!(decode_time("2013-13-45T99:00:00").is_none());
    }
}
