//! Recurring schedule generation.
//!
//! For each requested weekday, the first matching date on or after the start date (the start
//! date itself counts) is followed by `week_count - 1` further dates 7 days apart. All weekdays'
//! occurrences are merged and sorted ascending.

use super::ScheduleError;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::collections::BTreeSet;

/// Parse a weekday name. Accepts full English names and three-letter abbreviations,
/// case-insensitively.
pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        _ => Err(ScheduleError::UnknownWeekday(name.to_string())),
    }
}

/// Parse every name, failing on the first unknown one. Repeated days collapse.
pub fn parse_weekdays<S: AsRef<str>>(names: &[S]) -> Result<Vec<Weekday>, ScheduleError> {
    if names.is_empty() {
        return Err(ScheduleError::EmptyWeekdays);
    }
    let mut days = BTreeSet::new();
    for name in names {
        days.insert(parse_weekday(name.as_ref())?.num_days_from_monday());
    }
    Ok(days.into_iter().filter_map(|d| Weekday::try_from(d as u8).ok()).collect())
}

/// Parse "HH:MM" (or "HH:MM:SS")
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTimeOfDay(value.to_string()))
}

/// Number of occurrences a pattern will produce, for bounding work before generating
pub fn occurrence_count(weekdays: &[Weekday], week_count: i32) -> usize {
    let distinct: BTreeSet<u32> = weekdays.iter().map(|d| d.num_days_from_monday()).collect();
    distinct.len() * week_count.max(0) as usize
}

/// First date on or after `from` that falls on `weekday`
/// `days_from_monday` is 0 for Monday through 6 for Sunday
fn first_on_or_after(from: NaiveDate, days_from_monday: u32) -> NaiveDate {
    let ahead = (7 + days_from_monday - from.weekday().num_days_from_monday()) % 7;
    from + Days::new(u64::from(ahead))
}

/// Expand a weekday pattern into sorted concrete datetimes.
pub fn generate(start_date: NaiveDate, weekdays: &[Weekday], week_count: i32, time_of_day: NaiveTime) -> Result<Vec<NaiveDateTime>, ScheduleError> {
    if weekdays.is_empty() {
        return Err(ScheduleError::EmptyWeekdays);
    }
    if week_count <= 0 {
        return Err(ScheduleError::NonPositiveWeekCount(week_count));
    }

    let distinct: BTreeSet<u32> = weekdays.iter().map(|d| d.num_days_from_monday()).collect();
    let mut occurrences = Vec::with_capacity(distinct.len() * week_count as usize);
    for days_from_monday in distinct {
        let first = first_on_or_after(start_date, days_from_monday);
        for week in 0..week_count as u64 {
            occurrences.push((first + Days::new(week * 7)).and_time(time_of_day));
        }
    }
    occurrences.sort();
    Ok(occurrences)
}
