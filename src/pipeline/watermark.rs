// src/pipeline/watermark.rs

//! Lower time bound of each fetch.
//!
//! The first cycle after start looks back to local midnight. Every later
//! cycle looks back one polling interval, so consecutive windows overlap
//! and deduplication absorbs the repeats.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Timelike};

/// Which watermark rule a cycle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// First cycle of the process
    Initial,
    /// Any later cycle
    Periodic,
}

/// Seconds since epoch of the most recent local midnight before `now`.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(start) => start.timestamp(),
        // Midnight skipped by a DST jump.
        None => now.timestamp() - i64::from(now.num_seconds_from_midnight()),
    }
}

/// Watermark for a cycle of `kind` starting at `now`.
pub fn watermark<Tz: TimeZone>(kind: CycleKind, now: &DateTime<Tz>, interval: Duration) -> i64 {
    match kind {
        CycleKind::Initial => start_of_day(now),
        CycleKind::Periodic => {
            let lookback = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
            now.timestamp().saturating_sub(lookback)
        }
    }
}

/// Local `%Y-%m-%d %H:%M:%S` rendering of a watermark.
pub fn format_watermark(watermark: i64) -> String {
    Local
        .timestamp_opt(watermark, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| watermark.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    const INTERVAL: Duration = Duration::from_secs(180);

    #[test]
    fn test_initial_uses_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 14, 30, 15).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        assert_eq!(watermark(CycleKind::Initial, &now, INTERVAL), midnight.timestamp());
    }

    #[test]
    fn test_initial_uses_local_midnight_of_the_zone() {
        let zone = FixedOffset::east_opt(3 * 3600).unwrap();
        // 01:00 local is 22:00 UTC on the previous day.
        let now = zone.with_ymd_and_hms(2026, 10, 17, 1, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 10, 16, 21, 0, 0).unwrap();
        assert_eq!(start_of_day(&now), midnight.timestamp());
    }

    #[test]
    fn test_periodic_looks_back_one_interval() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 14, 30, 0).unwrap();
        assert_eq!(
            watermark(CycleKind::Periodic, &now, INTERVAL),
            now.timestamp() - 180
        );
    }

    #[test]
    fn test_on_time_trigger_covers_previous_start() {
        let first = Utc.with_ymd_and_hms(2026, 10, 17, 14, 30, 0).unwrap();
        let second = first + chrono::Duration::seconds(180);
        assert_eq!(
            watermark(CycleKind::Periodic, &second, INTERVAL),
            first.timestamp()
        );
    }
}
