//! Time source abstraction and day-window computation.
//!
//! "Today" is always the half-open interval `[local midnight, +24h)` in the
//! shop's timezone. The offset is threaded in explicitly - never read from
//! an ambient global - so window math is deterministic under test and
//! correct across regions.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use parking_lot::Mutex;

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to an explicit instant, advanced manually.
///
/// Used by tests that need deterministic day windows.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock pinned to `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A half-open time interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Inclusive start (local midnight).
    pub start: DateTime<Utc>,
    /// Exclusive end (next local midnight).
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Whether an instant falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Compute the tenant-local "today" window for an instant.
///
/// The window is computed once per call; every aggregate of one snapshot
/// must reuse the same `DayWindow` value so the figures cannot straddle two
/// different midnights.
#[must_use]
pub fn day_window(now: DateTime<Utc>, offset: FixedOffset) -> DayWindow {
    let local = now.with_timezone(&offset);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);
    // FixedOffset has no DST gaps, so local midnight always exists exactly once.
    let start = midnight
        .and_local_timezone(offset)
        .single()
        .map_or(now, |dt| dt.with_timezone(&Utc));
    DayWindow {
        start,
        end: start + Duration::days(1),
    }
}

/// Build a `FixedOffset` from minutes east of UTC, clamped to the valid
/// range chrono accepts.
#[must_use]
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    let seconds = minutes.clamp(-18 * 60, 18 * 60) * 60;
    // Clamped into chrono's accepted range, so construction cannot fail.
    FixedOffset::east_opt(seconds).expect("offset clamped to valid range")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_day_window_utc() {
        let window = day_window(utc(2024, 1, 1, 9, 30), offset_from_minutes(0));
        assert_eq!(window.start, utc(2024, 1, 1, 0, 0));
        assert_eq!(window.end, utc(2024, 1, 2, 0, 0));
    }

    #[test]
    fn test_day_window_half_open() {
        let window = day_window(utc(2024, 1, 1, 12, 0), offset_from_minutes(0));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
        assert!(window.contains(utc(2024, 1, 1, 23, 59)));
        assert!(!window.contains(utc(2023, 12, 31, 23, 59)));
    }

    #[test]
    fn test_day_window_positive_offset() {
        // 02:00 UTC on Jan 2 is already Jan 2 in UTC+3; local midnight is
        // 21:00 UTC the previous day.
        let window = day_window(utc(2024, 1, 2, 2, 0), offset_from_minutes(180));
        assert_eq!(window.start, utc(2024, 1, 1, 21, 0));
        assert_eq!(window.end, utc(2024, 1, 2, 21, 0));
    }

    #[test]
    fn test_day_window_negative_offset() {
        // 02:00 UTC on Jan 2 is still Jan 1 in UTC-5.
        let window = day_window(utc(2024, 1, 2, 2, 0), offset_from_minutes(-300));
        assert_eq!(window.start, utc(2024, 1, 1, 5, 0));
        assert_eq!(window.end, utc(2024, 1, 2, 5, 0));
    }

    #[test]
    fn test_offset_from_minutes_clamps() {
        // Out-of-range offsets clamp instead of panicking.
        let offset = offset_from_minutes(100_000);
        assert_eq!(offset.local_minus_utc(), 18 * 3600);
        let offset = offset_from_minutes(-100_000);
        assert_eq!(offset.local_minus_utc(), -18 * 3600);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(utc(2024, 1, 1, 9, 0));
        assert_eq!(clock.now(), utc(2024, 1, 1, 9, 0));
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), utc(2024, 1, 1, 11, 0));
        clock.set(utc(2024, 6, 1, 0, 0));
        assert_eq!(clock.now(), utc(2024, 6, 1, 0, 0));
    }
}
