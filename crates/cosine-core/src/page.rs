//! Pagination primitives: timeline cursors and page-size resolution.
//!
//! Cursors are stateless RFC 3339 timestamps. They are emitted with
//! microsecond precision, matching what the stores persist, so a cursor
//! round-trips to exactly the boundary it was cut at.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{CosineError, CosineResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Default and maximum page sizes for feeds and neighbor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default: usize,
    pub max: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: DEFAULT_PAGE_SIZE,
            max: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Resolve a caller-supplied limit: absent → default, zero → rejected,
    /// above the maximum → clamped.
    pub fn resolve(&self, requested: Option<usize>) -> CosineResult<usize> {
        match requested {
            None => Ok(self.default),
            Some(0) => Err(CosineError::invalid("limit must be >= 1")),
            Some(n) => Ok(n.min(self.max)),
        }
    }
}

pub fn format_cursor(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an optional cursor. Absent or blank means "first page".
pub fn parse_cursor(cursor: Option<&str>) -> CosineResult<Option<DateTime<Utc>>> {
    match cursor.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| CosineError::invalid(format!("cursor '{}' is not RFC 3339: {}", raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_and_clamps() {
        let limits = PageLimits::default();
        assert_eq!(limits.resolve(None).unwrap(), 20);
        assert_eq!(limits.resolve(Some(5)).unwrap(), 5);
        assert_eq!(limits.resolve(Some(5_000)).unwrap(), 100);
        assert!(matches!(
            limits.resolve(Some(0)),
            Err(CosineError::InvalidInput(_))
        ));
    }

    #[test]
    fn cursor_round_trips_at_micro_precision() {
        let ts = DateTime::from_timestamp_micros(1_760_000_000_123_456).unwrap();
        let cursor = format_cursor(ts);
        assert_eq!(cursor, "2025-10-09T08:53:20.123456Z");
        assert_eq!(parse_cursor(Some(&cursor)).unwrap(), Some(ts));
    }

    #[test]
    fn parse_accepts_millisecond_and_offset_forms() {
        let parsed = parse_cursor(Some("2025-10-09T10:53:20.123+02:00"))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_760_000_000_123);
    }

    #[test]
    fn blank_cursor_is_first_page() {
        assert_eq!(parse_cursor(None).unwrap(), None);
        assert_eq!(parse_cursor(Some("  ")).unwrap(), None);
    }

    #[test]
    fn garbage_cursor_is_invalid_input() {
        assert!(matches!(
            parse_cursor(Some("yesterday")),
            Err(CosineError::InvalidInput(_))
        ));
    }
}
