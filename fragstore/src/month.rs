//! Calendar months as fragment group addresses.
//!
//! Each fragment group holds one calendar month of hourly elements. A
//! [`Month`] can only be built from a valid address, so everything
//! downstream (tag, length, file location) is derived from an already
//! validated value.

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Offset, TimeZone, Timelike, Utc};

use crate::error::{MonthError, Result};

/// A calendar month in UTC, used to address one fragment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Creates a month from a year and a month number in `1..=12`.
    ///
    /// # Errors
    ///
    /// Returns [`MonthError::OutOfRange`] if the pair is not a calendar month,
    /// or if the month has no representable end.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let (next_year, next_month) = if month == 12 {
            (year.checked_add(1), 1)
        } else {
            (Some(year), month + 1)
        };
        let bounded = NaiveDate::from_ymd_opt(year, month, 1).is_some()
            && next_year.and_then(|y| NaiveDate::from_ymd_opt(y, next_month, 1)).is_some();
        if !bounded {
            return Err(MonthError::OutOfRange { year, month }.into());
        }
        Ok(Self { year, month })
    }

    /// Validates a timestamp as a month address.
    ///
    /// The timestamp must be in the [`Utc`] time zone, on day 1, with hour,
    /// minute, second and nanosecond all zero. Checks run in that order and
    /// each failure is reported as its own [`MonthError`] variant. A zone with
    /// a zero offset that is not `Utc` itself is still rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MonthError::NonUtc`], [`MonthError::NotFirstOfMonth`] or
    /// [`MonthError::NonZeroSubDay`].
    pub fn from_datetime<Tz: TimeZone + 'static>(dt: &DateTime<Tz>) -> Result<Self> {
        if TypeId::of::<Tz>() != TypeId::of::<Utc>() {
            let offset_seconds = dt.offset().fix().local_minus_utc();
            return Err(MonthError::NonUtc { offset_seconds }.into());
        }

        let naive = dt.naive_utc();
        if naive.day() != 1 {
            return Err(MonthError::NotFirstOfMonth { day: naive.day() }.into());
        }
        if naive.hour() != 0 || naive.minute() != 0 || naive.second() != 0 || naive.nanosecond() != 0
        {
            return Err(MonthError::NonZeroSubDay.into());
        }

        Self::new(naive.year(), naive.month())
    }

    /// Returns the year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Returns the month number (1 = January).
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Returns the first day of this month.
    pub fn first_day(&self) -> NaiveDate {
        // Validated in `new`.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Returns the ISO-8601 date tag of the month's first day, e.g. `2015-01-01`.
    pub fn tag(&self) -> String {
        self.first_day().format("%Y-%m-%d").to_string()
    }

    /// Returns the following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Returns the number of days in this month.
    pub fn days(&self) -> u32 {
        let next = self.next().first_day();
        let days = next.signed_duration_since(self.first_day()).num_days();
        u32::try_from(days).unwrap_or(0)
    }

    /// Returns the number of hourly elements in this month.
    pub fn hours(&self) -> usize {
        self.days() as usize * 24
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = crate::error::FragstoreError;

    /// Parses `YYYY-MM` or `YYYY-MM-01`.
    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || MonthError::Parse {
            input: s.to_string(),
        };

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if date.day() != 1 {
                return Err(MonthError::NotFirstOfMonth { day: date.day() }.into());
            }
            return Self::new(date.year(), date.month());
        }

        let (year, month) = s.split_once('-').ok_or_else(parse_err)?;
        let year: i32 = year.parse().map_err(|_| parse_err())?;
        let month: u32 = month.parse().map_err(|_| parse_err())?;
        Self::new(year, month)
    }
}
