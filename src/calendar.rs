//! Calendar arithmetic for weekly series and holiday features
//!
//! Provides Sunday-aligned week bucketing for resampling, cadence
//! inference over observed date gaps, and a UK public-holiday calendar
//! used by the `holiday_count` feature.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Sampling cadence inferred from consecutive date gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly,
    /// Gap in days for anything that is neither daily nor weekly.
    Other(i64),
}

impl Cadence {
    /// Step in days used to extend an index at this cadence.
    pub fn step_days(&self) -> i64 {
        match self {
            Cadence::Daily => 1,
            Cadence::Weekly => 7,
            Cadence::Other(d) => (*d).max(1),
        }
    }
}

/// The Sunday on or after `date` (the end of its Sunday-terminated week).
pub fn week_ending_sunday(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_sunday() as i64) % 7;
    date + Duration::days(offset)
}

/// Median gap in days between consecutive sorted dates.
///
/// Even-length gap lists average the two middle gaps, so the result may
/// be fractional. Returns `None` for fewer than two dates.
pub fn median_gap_days(dates: &[NaiveDate]) -> Option<f64> {
    if dates.len() < 2 {
        return None;
    }
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect();
    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 1 {
        Some(gaps[mid] as f64)
    } else {
        Some((gaps[mid - 1] + gaps[mid]) as f64 / 2.0)
    }
}

/// Infer the sampling cadence from the median gap of a sorted index.
///
/// Single-row indexes default to weekly, which is the dominant cadence
/// for the datasets this library targets.
pub fn infer_cadence(dates: &[NaiveDate]) -> Cadence {
    match median_gap_days(dates) {
        None => Cadence::Weekly,
        Some(g) if (5.0..=9.0).contains(&g) => Cadence::Weekly,
        Some(g) if g <= 2.0 => Cadence::Daily,
        Some(g) => Cadence::Other(g.round() as i64),
    }
}

/// Extend a date index `horizon` steps past its last date at `cadence`.
///
/// Weekly steps snap to the Sunday ending each week, so a series dated
/// mid-week continues on the canonical weekly anchor.
pub fn future_dates(last: NaiveDate, cadence: Cadence, horizon: usize) -> Vec<NaiveDate> {
    let step = cadence.step_days();
    (1..=horizon as i64)
        .map(|i| {
            let date = last + Duration::days(i * step);
            if cadence == Cadence::Weekly {
                week_ending_sunday(date)
            } else {
                date
            }
        })
        .collect()
}

/// Easter Sunday for the given year (Gregorian computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn first_monday_of(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_monday()) % 7;
    Some(first + Duration::days(offset as i64))
}

/// UK bank holidays for one year.
///
/// Fixed dates are listed on their calendar day; substitute days for
/// weekend-falling holidays are not modelled, which is acceptable for a
/// windowed holiday count.
pub fn uk_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(6);
    if let Some(d) = NaiveDate::from_ymd_opt(year, 1, 1) {
        days.push(d);
    }
    if let Some(easter) = easter_sunday(year) {
        days.push(easter - Duration::days(2)); // Good Friday
        days.push(easter + Duration::days(1)); // Easter Monday
    }
    if let Some(d) = first_monday_of(year, 5) {
        days.push(d); // Early May bank holiday
    }
    if let Some(d) = NaiveDate::from_ymd_opt(year, 12, 25) {
        days.push(d);
    }
    if let Some(d) = NaiveDate::from_ymd_opt(year, 12, 26) {
        days.push(d);
    }
    days
}

/// Count UK holidays within `window_days` of each date (inclusive).
pub fn holiday_counts(dates: &[NaiveDate], window_days: i64) -> Vec<f64> {
    if dates.is_empty() {
        return Vec::new();
    }
    let min_year = dates.iter().map(|d| d.year()).min().unwrap_or(1970) - 1;
    let max_year = dates.iter().map(|d| d.year()).max().unwrap_or(1970) + 1;
    let mut holidays: Vec<NaiveDate> = (min_year..=max_year).flat_map(uk_holidays).collect();
    holidays.sort_unstable();

    dates
        .iter()
        .map(|d| {
            let lo = *d - Duration::days(window_days);
            let hi = *d + Duration::days(window_days);
            holidays.iter().filter(|h| **h >= lo && **h <= hi).count() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sunday_maps_to_itself() {
        assert_eq!(week_ending_sunday(d(2024, 1, 7)), d(2024, 1, 7));
    }

    #[test]
    fn monday_maps_to_following_sunday() {
        assert_eq!(week_ending_sunday(d(2024, 1, 1)), d(2024, 1, 7));
        assert_eq!(week_ending_sunday(d(2024, 1, 6)), d(2024, 1, 7));
    }

    #[test]
    fn easter_known_years() {
        assert_eq!(easter_sunday(2024), Some(d(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(d(2025, 4, 20)));
        assert_eq!(easter_sunday(2000), Some(d(2000, 4, 23)));
    }

    #[test]
    fn cadence_from_weekly_index() {
        let dates = vec![d(2024, 1, 7), d(2024, 1, 14), d(2024, 1, 21)];
        assert_eq!(infer_cadence(&dates), Cadence::Weekly);
        assert_eq!(
            future_dates(d(2024, 1, 21), Cadence::Weekly, 2),
            vec![d(2024, 1, 28), d(2024, 2, 4)]
        );
    }

    #[test]
    fn weekly_future_dates_snap_to_sundays() {
        // Monday-dated weeks continue on the Sunday weekly anchor
        assert_eq!(
            future_dates(d(2024, 1, 1), Cadence::Weekly, 3),
            vec![d(2024, 1, 14), d(2024, 1, 21), d(2024, 1, 28)]
        );
        // daily steps are left untouched
        assert_eq!(
            future_dates(d(2024, 1, 1), Cadence::Daily, 2),
            vec![d(2024, 1, 2), d(2024, 1, 3)]
        );
    }

    #[test]
    fn christmas_window_counts_two_holidays() {
        let counts = holiday_counts(&[d(2024, 12, 24)], 3);
        // Christmas Day and Boxing Day both fall inside the window
        assert_eq!(counts, vec![2.0]);
    }
}
