//! Reporting period and CoC operating-year windowing

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive reporting period for an export
///
/// HUD CSV exports are scoped to a reporting period; enrollment and service
/// data are additionally windowed to the CoC operating year (Oct 1–Sep 30),
/// and the intersection of both windows is applied at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl ExportPeriod {
    /// Creates a period from inclusive start/end dates
    ///
    /// # Errors
    ///
    /// Returns an error if `start` is after `end`.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if start > end {
            return Err(format!(
                "Reporting period start {start} is after end {end}"
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether a date falls inside the period (inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// The CoC operating year (Oct 1–Sep 30) containing `date`
    pub fn operating_year_containing(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 10 {
            date.year()
        } else {
            date.year() - 1
        };
        // Oct 1 and Sep 30 always exist
        Self {
            start: NaiveDate::from_ymd_opt(start_year, 10, 1).expect("valid constant date"),
            end: NaiveDate::from_ymd_opt(start_year + 1, 9, 30).expect("valid constant date"),
        }
    }

    /// Intersection of two periods, or `None` when they don't overlap
    pub fn intersect(&self, other: &ExportPeriod) -> Option<ExportPeriod> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(ExportPeriod { start, end })
        } else {
            None
        }
    }

    /// The effective window for enrollment/service data: this period
    /// intersected with the operating year containing the period end.
    pub fn operating_window(&self) -> Option<ExportPeriod> {
        self.intersect(&Self::operating_year_containing(self.end))
    }
}

impl fmt::Display for ExportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_between_rejects_inverted_range() {
        assert!(ExportPeriod::between(d(2024, 6, 1), d(2024, 5, 1)).is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let period = ExportPeriod::between(d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        assert!(period.contains(d(2024, 1, 1)));
        assert!(period.contains(d(2024, 12, 31)));
        assert!(!period.contains(d(2025, 1, 1)));
    }

    #[test]
    fn test_operating_year_october_boundary() {
        let fall = ExportPeriod::operating_year_containing(d(2023, 10, 1));
        assert_eq!(fall.start(), d(2023, 10, 1));
        assert_eq!(fall.end(), d(2024, 9, 30));

        let spring = ExportPeriod::operating_year_containing(d(2024, 9, 30));
        assert_eq!(spring.start(), d(2023, 10, 1));
        assert_eq!(spring.end(), d(2024, 9, 30));
    }

    #[test]
    fn test_intersect_overlapping() {
        let a = ExportPeriod::between(d(2024, 1, 1), d(2024, 6, 30)).unwrap();
        let b = ExportPeriod::between(d(2024, 4, 1), d(2024, 12, 31)).unwrap();
        let overlap = a.intersect(&b).unwrap();
        assert_eq!(overlap.start(), d(2024, 4, 1));
        assert_eq!(overlap.end(), d(2024, 6, 30));
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = ExportPeriod::between(d(2023, 1, 1), d(2023, 6, 30)).unwrap();
        let b = ExportPeriod::between(d(2024, 1, 1), d(2024, 6, 30)).unwrap();
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn test_operating_window_clamps_to_operating_year() {
        // Calendar-year period ending mid-operating-year: the window is
        // clamped to Oct 1 of the operating year containing the period end.
        let period = ExportPeriod::between(d(2023, 1, 1), d(2023, 12, 31)).unwrap();
        let window = period.operating_window().unwrap();
        assert_eq!(window.start(), d(2023, 10, 1));
        assert_eq!(window.end(), d(2023, 12, 31));
    }
}
