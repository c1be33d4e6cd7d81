// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Countdown calculation.
//!
//! Pure functions only: everything here is derived from a `CalendarMoment` and nothing else, so
//! it can be exercised without any clock or network.

use std::fmt;

use countdown_snapshot::{ClockFields, CountdownResult};
use jiff::civil::{Date, DateTime};

/// Month of the target date.
const TARGET_MONTH: i8 = 12;

/// Day of the target date.
const TARGET_DAY: i8 = 25;

const SECONDS_PER_DAY: i64 = 86_400;

/// A local date and time, as read from the time source.
///
/// Validity is checked on construction, there is no way to hold a February 30th.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarMoment(DateTime);

impl CalendarMoment {
    pub fn new(
        year: i16,
        month: i8,
        day: i8,
        hour: i8,
        minute: i8,
        second: i8,
    ) -> anyhow::Result<CalendarMoment> {
        let datetime = DateTime::new(year, month, day, hour, minute, second, 0)?;
        Ok(CalendarMoment(datetime))
    }

    pub fn year(&self) -> i32 {
        self.0.year().into()
    }

    pub fn month(&self) -> u8 {
        self.0.month() as u8
    }

    pub fn day(&self) -> u8 {
        self.0.day() as u8
    }

    pub fn hour(&self) -> u8 {
        self.0.hour() as u8
    }

    pub fn minute(&self) -> u8 {
        self.0.minute() as u8
    }

    pub fn second(&self) -> u8 {
        self.0.second() as u8
    }

    /// The date and time fields published on the status page.
    pub fn clock_fields(&self) -> ClockFields {
        ClockFields {
            year: self.year(),
            month: self.month(),
            day: self.day(),
            hour: self.hour(),
            minute: self.minute(),
            second: self.second(),
        }
    }

    fn is_target_day(&self) -> bool {
        self.0.month() == TARGET_MONTH && self.0.day() == TARGET_DAY
    }
}

impl From<DateTime> for CalendarMoment {
    fn from(datetime: DateTime) -> Self {
        CalendarMoment(datetime)
    }
}

impl fmt::Display for CalendarMoment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}:{:02}:{:02}",
            self.month(),
            self.day(),
            self.year(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

/// Compute the countdown to the next December 25th.
///
/// The target is December 25th of the current year, or of the following year once the 25th has
/// passed. Days are counted between civil dates (today at midnight to the target at midnight),
/// which makes the count independent of the time of day and of any daylight saving shift.
///
/// On the target day itself the result is always 0 days with `is_target_day` set, and on any
/// other day at least 1 day remains. Past the last representable year the target is clamped to
/// the last representable date, so the count only stays meaningful through year 9999.
pub fn countdown(now: &CalendarMoment) -> CountdownResult {
    let mut target_year = now.year();
    if now.month() == TARGET_MONTH as u8 && now.day() > TARGET_DAY as u8 {
        target_year += 1;
    }

    if now.is_target_day() {
        return CountdownResult {
            target_year,
            days_remaining: 0,
            is_target_day: true,
        };
    }

    // Year 9999 is the last one representable, clamp rather than fail.
    let target = i16::try_from(target_year)
        .ok()
        .and_then(|year| Date::new(year, TARGET_MONTH, TARGET_DAY).ok())
        .unwrap_or(Date::MAX);
    let today = now.0.date();

    let seconds = today.duration_until(target).as_secs();
    let days_remaining = seconds.div_euclid(SECONDS_PER_DAY).max(1);

    CountdownResult {
        target_year,
        days_remaining: i32::try_from(days_remaining).unwrap_or(i32::MAX),
        is_target_day: false,
    }
}
