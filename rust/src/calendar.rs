//! Working-day calendar arithmetic.
//!
//! Converts counts of ideal working days into calendar end dates, skipping
//! weekends and explicit days off (holidays, vacations).

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

use crate::simulation::SimulationError;

/// Monday-based weekday index of Friday.
const FRIDAY: i64 = 4;

/// Whole working days consumed by a sampled ideal-day count.
///
/// The fractional part is dropped, so 2.7 days occupy two full days. Zero and
/// negative samples consume no working days at all.
pub fn whole_workdays(ideal_days: f64) -> i64 {
    if ideal_days.is_finite() && ideal_days > 0.0 {
        ideal_days.trunc() as i64
    } else {
        0
    }
}

/// Non-working dates beyond ordinary weekends. Immutable for a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calendar {
    days_off: BTreeSet<NaiveDate>,
}

impl Calendar {
    pub fn new(days_off: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            days_off: days_off.into_iter().collect(),
        }
    }

    /// The end date `days` working days after `start`, skipping weekends and days off.
    ///
    /// Extends the projected end by the days off found in each newly covered
    /// window until a pass discovers none. Each window begins the day after the
    /// previous end, so a day off is never counted twice.
    pub fn n_workdays_after(
        &self,
        start: NaiveDate,
        days: i64,
    ) -> Result<NaiveDate, SimulationError> {
        if days <= 0 {
            return Ok(start);
        }

        let mut end = self.n_weekdays_after(start, days)?;
        let mut extra = self.days_off_between(start, end);
        while extra > 0 {
            let window_start = end.succ_opt().ok_or(SimulationError::DateOverflow {
                start: end,
                days: 1,
            })?;
            let next_end = self.n_weekdays_after(end, extra as i64)?;
            extra = self.days_off_between(window_start, next_end);
            end = next_end;
        }
        Ok(end)
    }

    /// The date `days` weekdays after `start` (non-inclusive), ignoring days off.
    ///
    /// A start falling on a weekend behaves as if it were the following Monday
    /// minus one weekday, so Saturday and Sunday plus one weekday are both Tuesday.
    pub fn n_weekdays_after(
        &self,
        start: NaiveDate,
        days: i64,
    ) -> Result<NaiveDate, SimulationError> {
        if days == 0 {
            return Ok(start);
        }

        let whole_weeks = days.div_euclid(5);
        let extra_days = days.rem_euclid(5);
        let weekday = start.weekday().num_days_from_monday() as i64;

        let weekend_days = if weekday + extra_days <= FRIDAY {
            0
        } else if weekday <= FRIDAY {
            2
        } else {
            7 - weekday
        };

        whole_weeks
            .checked_mul(7)
            .and_then(|d| d.checked_add(extra_days + weekend_days))
            .and_then(Duration::try_days)
            .and_then(|offset| start.checked_add_signed(offset))
            .ok_or(SimulationError::DateOverflow { start, days })
    }

    /// Number of days off within `[start, end]`, both ends inclusive.
    pub fn days_off_between(&self, start: NaiveDate, end: NaiveDate) -> usize {
        if start > end {
            return 0;
        }
        self.days_off.range(start..=end).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    // 2020-06-29 is a Monday; 2020-07-03 is the following Friday.
    fn monday() -> NaiveDate {
        make_date(2020, 6, 29)
    }

    #[test]
    fn test_zero_weekdays_is_identity() {
        let cal = Calendar::default();
        for offset in 0..7 {
            let start = monday() + Duration::days(offset);
            assert_eq!(cal.n_weekdays_after(start, 0).unwrap(), start);
            assert_eq!(cal.n_workdays_after(start, 0).unwrap(), start);
        }
    }

    #[test]
    fn test_monday_plus_five_is_next_monday() {
        let cal = Calendar::default();
        assert_eq!(cal.n_weekdays_after(monday(), 5).unwrap(), make_date(2020, 7, 6));
        assert_eq!(cal.n_workdays_after(monday(), 5).unwrap(), make_date(2020, 7, 6));
    }

    #[test]
    fn test_weekdays_within_week() {
        let cal = Calendar::default();
        assert_eq!(cal.n_weekdays_after(monday(), 4).unwrap(), make_date(2020, 7, 3));
        assert_eq!(cal.n_weekdays_after(monday(), 10).unwrap(), make_date(2020, 7, 13));
    }

    #[test]
    fn test_weekdays_crossing_weekend() {
        let cal = Calendar::default();
        // Friday + 1 -> Monday
        assert_eq!(cal.n_weekdays_after(make_date(2020, 7, 3), 1).unwrap(), make_date(2020, 7, 6));
        // Thursday + 3 -> Tuesday
        assert_eq!(cal.n_weekdays_after(make_date(2020, 7, 2), 3).unwrap(), make_date(2020, 7, 7));
    }

    #[test]
    fn test_weekdays_from_weekend_start() {
        let cal = Calendar::default();
        // Saturday + 1 and Sunday + 1 both land on Tuesday
        assert_eq!(cal.n_weekdays_after(make_date(2020, 7, 4), 1).unwrap(), make_date(2020, 7, 7));
        assert_eq!(cal.n_weekdays_after(make_date(2020, 7, 5), 1).unwrap(), make_date(2020, 7, 7));
        // Saturday + 5 -> Monday after next
        assert_eq!(cal.n_weekdays_after(make_date(2020, 7, 4), 5).unwrap(), make_date(2020, 7, 13));
    }

    #[test]
    fn test_days_off_between_is_inclusive() {
        let cal = Calendar::new([make_date(2020, 6, 29), make_date(2020, 7, 3)]);
        assert_eq!(cal.days_off_between(monday(), make_date(2020, 7, 3)), 2);
        assert_eq!(cal.days_off_between(make_date(2020, 6, 30), make_date(2020, 7, 2)), 0);
        assert_eq!(cal.days_off_between(make_date(2020, 7, 3), make_date(2020, 7, 3)), 1);
        // Reversed window is empty rather than a panic
        assert_eq!(cal.days_off_between(make_date(2020, 7, 3), monday()), 0);
    }

    #[test]
    fn test_day_off_pushes_end_one_business_day() {
        let plain = Calendar::default();
        let with_holiday = Calendar::new([make_date(2020, 7, 3)]);

        let baseline = plain.n_workdays_after(monday(), 5).unwrap();
        let shifted = with_holiday.n_workdays_after(monday(), 5).unwrap();

        assert_eq!(baseline, make_date(2020, 7, 6));
        assert_eq!(shifted, make_date(2020, 7, 7));
        assert_eq!(shifted, plain.n_weekdays_after(baseline, 1).unwrap());
    }

    #[test]
    fn test_day_off_found_in_extension_window() {
        // The first pass only sees July 3; extending by one day uncovers July 7.
        let cal = Calendar::new([make_date(2020, 7, 3), make_date(2020, 7, 7)]);
        assert_eq!(cal.n_workdays_after(monday(), 5).unwrap(), make_date(2020, 7, 8));
    }

    #[test]
    fn test_multiple_days_off_in_first_window() {
        let cal = Calendar::new([make_date(2020, 7, 3), make_date(2020, 7, 6)]);
        assert_eq!(cal.n_workdays_after(monday(), 5).unwrap(), make_date(2020, 7, 8));
    }

    #[test]
    fn test_whole_workdays_drops_fraction() {
        assert_eq!(whole_workdays(2.0), 2);
        assert_eq!(whole_workdays(2.1), 2);
        assert_eq!(whole_workdays(2.7), 2);
        assert_eq!(whole_workdays(0.7), 0);
        assert_eq!(whole_workdays(0.0), 0);
        assert_eq!(whole_workdays(-1.5), 0);
        assert_eq!(whole_workdays(f64::NAN), 0);
    }

    #[test]
    fn test_fractional_days_end_on_truncated_workday() {
        let cal = Calendar::default();
        // Monday plus 2.7 ideal days ends on Wednesday
        let end = cal.n_workdays_after(monday(), whole_workdays(2.7)).unwrap();
        assert_eq!(end, make_date(2020, 7, 1));
    }

    #[test]
    fn test_out_of_range_dates_are_errors() {
        let cal = Calendar::new([make_date(2020, 7, 3)]);
        assert!(matches!(
            cal.n_weekdays_after(monday(), 200_000_000),
            Err(SimulationError::DateOverflow { days: 200_000_000, .. })
        ));
        assert!(matches!(
            cal.n_workdays_after(monday(), i64::MAX),
            Err(SimulationError::DateOverflow { .. })
        ));
        assert!(matches!(
            cal.n_weekdays_after(NaiveDate::MAX, 1),
            Err(SimulationError::DateOverflow { .. })
        ));
    }
}
