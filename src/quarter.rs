//! Resolution of the reporting period from a calendar date.
//!
//! Reports always cover the most recently completed calendar quarter.  The
//! resolved [`ReportPeriod`] carries everything downstream stages need: the
//! month keys used as pivot columns, the day range used to filter signout
//! dates, and the display tag embedded in titles and file names.

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Number of calendar months in a quarter.
pub const MONTHS_PER_QUARTER: u32 = 3;

/// The quarter a report covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPeriod {
    year: i32,
    quarter: u32,
}

impl ReportPeriod {
    /// Creates a period for `quarter` (1 through 4) of `year`.
    ///
    /// Returns `None` when the quarter number is out of range.
    pub fn new(year: i32, quarter: u32) -> Option<Self> {
        if (1..=4).contains(&quarter) {
            Some(Self { year, quarter })
        } else {
            None
        }
    }

    /// Resolves the most recently completed quarter relative to `today`.
    ///
    /// January through March resolve to Q4 of the previous year; every other
    /// month resolves to the quarter immediately before the current one.
    pub fn previous_quarter(today: NaiveDate) -> Self {
        let month = today.month();
        if month <= MONTHS_PER_QUARTER {
            Self {
                year: today.year() - 1,
                quarter: 4,
            }
        } else {
            Self {
                year: today.year(),
                quarter: (month - 1) / MONTHS_PER_QUARTER,
            }
        }
    }

    /// Resolves the previous quarter from the local system clock.
    pub fn current() -> Self {
        Self::previous_quarter(chrono::Local::now().date_naive())
    }

    /// Returns the calendar year of the period.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Returns the quarter number (1 through 4).
    pub fn quarter(&self) -> u32 {
        self.quarter
    }

    /// Returns the first calendar month (1-based) of the quarter.
    pub fn first_month(&self) -> u32 {
        (self.quarter - 1) * MONTHS_PER_QUARTER + 1
    }

    /// Returns the last calendar month (1-based) of the quarter.
    pub fn last_month(&self) -> u32 {
        self.first_month() + MONTHS_PER_QUARTER - 1
    }

    /// Returns the three months of the quarter as `YYYY-MM` keys.
    pub fn months(&self) -> [String; 3] {
        let first = self.first_month();
        [first, first + 1, first + 2].map(|month| format!("{}-{:02}", self.year, month))
    }

    /// Returns the inclusive signout day range as `YYYY-MM-DD` strings.
    ///
    /// The end bound is always the 31st of the last month, even for 30-day
    /// months.  Signout dates are compared as ISO strings against it, so the
    /// nonexistent trailing days never match anything.
    pub fn day_range(&self) -> (String, String) {
        (
            format!("{}-{:02}-01", self.year, self.first_month()),
            format!("{}-{:02}-31", self.year, self.last_month()),
        )
    }

    /// Returns the display tag, e.g. `Q3_2025`.
    pub fn tag(&self) -> String {
        format!("Q{}_{}", self.quarter, self.year)
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}
