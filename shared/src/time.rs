use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// All days of the given month in calendar order.
///
/// # Panics
///
/// Panics if `month` is not in `1..=12`.
pub fn month_days(year: i32, month: u32) -> Vec<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| panic!("invalid month {year}-{month}"));

    let mut days = Vec::with_capacity(31);
    let mut current = first;
    while current.month() == month {
        days.push(current);
        match current.checked_add_signed(Duration::days(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// The month split into Monday-started weeks. Partial weeks at the month
/// boundaries are kept as-is, so the first and last entries may hold fewer
/// than seven days.
///
/// # Example
///
/// ```
/// use shared::time::weeks_of;
///
/// // February 2026 starts on a Sunday: a one-day stub week, then
/// // three full weeks, then a six-day week ending Saturday the 28th.
/// let weeks = weeks_of(2026, 2);
/// let lengths: Vec<usize> = weeks.iter().map(Vec::len).collect();
/// assert_eq!(lengths, vec![1, 7, 7, 7, 6]);
/// ```
///
/// # Panics
///
/// Panics if `month` is not in `1..=12`.
pub fn weeks_of(year: i32, month: u32) -> Vec<Vec<NaiveDate>> {
    let mut weeks: Vec<Vec<NaiveDate>> = Vec::with_capacity(6);
    let mut current: Vec<NaiveDate> = Vec::with_capacity(7);

    for day in month_days(year, month) {
        if day.weekday() == Weekday::Mon && !current.is_empty() {
            weeks.push(std::mem::take(&mut current));
        }
        current.push(day);
    }
    if !current.is_empty() {
        weeks.push(current);
    }
    weeks
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_days_covers_whole_month() {
        let days = month_days(2026, 2);
        assert_eq!(days.len(), 28);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(days[27], NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        assert_eq!(month_days(2024, 2).len(), 29);
        assert_eq!(month_days(2026, 7).len(), 31);
    }

    #[test]
    fn weeks_start_on_monday_and_keep_partials() {
        let weeks = weeks_of(2026, 2);
        assert_eq!(weeks.len(), 5);
        // Feb 1st 2026 is a Sunday, alone in its stub week
        assert_eq!(weeks[0].len(), 1);
        assert_eq!(weeks[0][0].weekday(), Weekday::Sun);
        for week in &weeks[1..] {
            assert_eq!(week[0].weekday(), Weekday::Mon);
        }
        assert_eq!(weeks[4].len(), 6);

        // A month that starts on Monday has no leading stub
        let weeks = weeks_of(2026, 6);
        assert_eq!(weeks[0].len(), 7);
        assert_eq!(weeks[0][0], NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
    }

    #[test]
    fn weekend_test() {
        assert!(is_weekend(NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()));
        assert!(is_weekend(NaiveDate::from_ymd_opt(2026, 2, 8).unwrap()));
        assert!(!is_weekend(NaiveDate::from_ymd_opt(2026, 2, 9).unwrap()));
    }
}
