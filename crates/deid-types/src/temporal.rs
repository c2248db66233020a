//! Date parsing and calendar arithmetic for date-valued semantic types.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Output format for every date an action emits.
pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%Y%m%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a date cell. Date-times are truncated to their calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|datetime| datetime.date_naive())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_OUTPUT_FORMAT).to_string()
}

/// Whole years, months and days between `earlier` and `later`, borrowing
/// the way a calendar does (days from the month before `later`).
///
/// Returns `None` when `earlier` is after `later`.
pub fn calendar_difference(later: NaiveDate, earlier: NaiveDate) -> Option<(i32, u32, u32)> {
    if earlier > later {
        return None;
    }
    let mut years = later.year() - earlier.year();
    let mut months = later.month() as i32 - earlier.month() as i32;
    let mut days = later.day() as i32 - earlier.day() as i32;
    if days < 0 {
        months -= 1;
        days += days_in_previous_month(later)? as i32;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }
    Some((years, months as u32, days as u32))
}

fn days_in_previous_month(date: NaiveDate) -> Option<u32> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
}

/// Pull a date whose implied age exceeds `ceiling` years back under it.
///
/// A date more than `ceiling` years before `today` (or exactly `ceiling`
/// years plus any months or days) becomes January 1 of
/// `today.year - (years - ceiling)`. Other dates are returned unchanged.
pub fn cap_date(date: NaiveDate, today: NaiveDate, ceiling: i32) -> NaiveDate {
    let Some((years, months, days)) = calendar_difference(today, date) else {
        return date;
    };
    let over = years > ceiling || (years == ceiling && (months > 0 || days > 0));
    if !over {
        return date;
    }
    NaiveDate::from_ymd_opt(today.year() - (years - ceiling), 1, 1).unwrap_or(date)
}
