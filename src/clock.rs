//! Civil time in one fixed UTC offset.
//!
//! Everything here is pure: the caller supplies the instant, so evaluation is
//! deterministic and independent of the machine's local timezone.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Offset, TimeZone, Timelike, Utc};

use crate::alarm::TimeOfDay;

/// UTC+08:00, no daylight saving.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CivilFields {
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// true when the hour and minute equal `time`, whatever the second
    #[must_use]
    pub fn is_at(&self, time: TimeOfDay) -> bool {
        self.hour == time.hour() && self.minute == time.minute()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilClock {
    offset: FixedOffset,
}

impl Default for CivilClock {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES)
    }
}

impl CivilClock {
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Offsets outside of ±24h fall back to [`DEFAULT_UTC_OFFSET_MINUTES`].
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .or_else(|| {
                log::warn!("utc offset of {minutes} minutes is out of range, using +08:00");
                FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
            })
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    #[must_use]
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    #[must_use]
    pub fn to_civil(&self, instant: DateTime<Utc>) -> CivilFields {
        let local = self.local(instant);
        CivilFields {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
        }
    }

    #[must_use]
    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// The next instant whose civil hour and minute equal `time`.
    ///
    /// Today's date is tried first. The result rolls one calendar day forward
    /// only when `time` has already passed: an earlier minute, or the same
    /// minute with the current second past zero. At exactly `hh:mm:00` the
    /// occurrence is "now".
    ///
    /// Returns `None` only at the edges of the representable calendar.
    #[must_use]
    pub fn next_occurrence(&self, now: DateTime<Utc>, time: TimeOfDay) -> Option<DateTime<Utc>> {
        let civil = self.to_civil(now);
        let today = civil.date()?;
        let passed = (time.hour(), time.minute()) < (civil.hour, civil.minute)
            || (civil.is_at(time) && civil.second > 0);
        let date = if passed {
            today.checked_add_days(Days::new(1))?
        } else {
            today
        };
        let local = date.and_time(time.as_naive());
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|at| at.with_timezone(&Utc))
    }
}

/// Formats a non-negative millisecond span as `HH:MM:SS`, rounding down.
#[must_use]
pub fn ms_to_clock(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
