//! Neighbourhood time window around a connection timestamp.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// `[ts - half_width, ts + half_width]`, bounds rendered RFC3339 in UTC (`Z`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    /// `None` when `ts` is not RFC3339.
    pub fn around(ts: &str, half_width: Duration) -> Option<Self> {
        let at = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
        Some(Self {
            start: format_ts(at - half_width),
            end: format_ts(at + half_width),
        })
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
