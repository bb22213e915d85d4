//! Wall clock with civil-day semantics in a single fixed time zone.
//!
//! Every component that needs "now" or "today" receives a [`Clock`]. Hosts use
//! [`SystemClock`]; tests use [`FixedClock`] and move it by hand.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// Source of the current instant and the civil time zone.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the civil time zone used for day bucketing.
    fn offset(&self) -> FixedOffset {
        Utc.fix()
    }

    /// Civil date of an instant.
    fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    /// Today's civil date.
    fn today(&self) -> NaiveDate {
        self.civil_date(self.now())
    }

    /// First instant of a civil date.
    fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let shift = Duration::seconds(i64::from(self.offset().local_minus_utc()));
        (local_midnight - shift).and_utc()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn offset(&self) -> FixedOffset {
        (**self).offset()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn offset(&self) -> FixedOffset {
        (**self).offset()
    }
}

/// Number of civil days from `from` to `to` (negative when `to` is earlier).
pub fn civil_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Offset from a number of minutes east of UTC, if in range.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Real time in a fixed civil offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// System clock bucketing days in UTC.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// System clock bucketing days in the given offset.
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    /// Clock frozen at `now`, bucketing days in UTC.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
            offset: Utc.fix(),
        }
    }

    /// Use a different civil offset.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Jump to an instant.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Move forward (or backward with a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
