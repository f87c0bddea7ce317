//! Pure Monday-first week calendar math.
//!
//! All functions are side-effect free and infallible. Dates cross the
//! serialization boundary as ISO `YYYY-MM-DD` strings; inside the crate they
//! are `chrono::NaiveDate`.

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::state::Weekday;

/// Current local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Monday of the ISO week containing `date`.
///
/// Weeks start Monday; a Sunday maps back six days.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let back = i64::from(date.weekday().num_days_from_monday());
    date - Duration::days(back)
}

/// The seven consecutive dates of the week starting at `monday`.
pub fn dates_of_week(monday: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}

/// The named weekday of `date`, consistent with [`monday_of`].
pub fn weekday_of(date: NaiveDate) -> Weekday {
    Weekday::ALL[date.weekday().num_days_from_monday() as usize]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn monday_of_midweek_date() {
        // 2026-08-26 is a Wednesday.
        assert_eq!(monday_of(d("2026-08-26")), d("2026-08-24"));
    }

    #[test]
    fn monday_of_sunday_goes_back_six_days() {
        // 2026-08-30 is a Sunday.
        assert_eq!(monday_of(d("2026-08-30")), d("2026-08-24"));
    }

    #[test]
    fn monday_of_monday_is_identity() {
        assert_eq!(monday_of(d("2026-08-24")), d("2026-08-24"));
    }

    #[test]
    fn dates_of_week_are_consecutive() {
        let dates = dates_of_week(d("2026-08-24"));
        assert_eq!(dates[0], d("2026-08-24"));
        assert_eq!(dates[6], d("2026-08-30"));
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
    }

    #[test]
    fn weekday_of_monday_of_is_always_monday() {
        // Sweep a few months including a year boundary.
        let mut date = d("2025-12-01");
        while date < d("2026-03-01") {
            let monday = monday_of(date);
            assert_eq!(weekday_of(monday), Weekday::Mon);
            assert!(dates_of_week(monday).contains(&date));
            date += Duration::days(1);
        }
    }

    #[test]
    fn weekday_of_maps_each_day() {
        let dates = dates_of_week(d("2026-08-24"));
        let names: Vec<Weekday> = dates.iter().map(|&day| weekday_of(day)).collect();
        assert_eq!(names, Weekday::ALL);
    }
}
