//! Spoken due dates ("March 15th", "next friday", "3/15") to calendar dates.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const FILLER: &[&str] = &["on", "the", "of", "by", "this", "due"];

/// Parse a spoken date relative to `today`.
///
/// A month and day without a year resolve to the current year, even if
/// that date has already passed. Weekday names mean the next such day
/// strictly after today.
pub fn parse_due_date(value: &str, today: NaiveDate) -> Option<NaiveDate> {
    let normalized = value
        .trim()
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .to_lowercase()
        .replace(',', " ");
    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|t| !FILLER.contains(t))
        .collect();

    match tokens.as_slice() {
        [] => None,
        ["today"] => Some(today),
        ["tomorrow"] => today.succ_opt(),
        ["next", "week"] => today.checked_add_signed(Duration::days(7)),
        ["next", day] => weekday(day).map(|wd| next_weekday(today, wd)),
        [single] => weekday(single)
            .map(|wd| next_weekday(today, wd))
            .or_else(|| NaiveDate::parse_from_str(single, "%Y-%m-%d").ok())
            .or_else(|| parse_numeric(single, today)),
        _ => parse_month_day(&tokens, today),
    }
}

fn weekday(token: &str) -> Option<Weekday> {
    let wd = match token {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(wd)
}

fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (7 + target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead)
}

/// `3/15` or `3/15/2026` (month first).
fn parse_numeric(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split('/').collect();
    let (month, day, year) = match parts.as_slice() {
        [m, d] => (m.parse().ok()?, d.parse().ok()?, today.year()),
        [m, d, y] => (m.parse().ok()?, d.parse().ok()?, expand_year(y.parse().ok()?)),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

fn month_number(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|name| name.starts_with(token))
        .map(|idx| idx as u32 + 1)
}

fn day_number(token: &str) -> Option<u32> {
    let digits = token
        .strip_suffix("st")
        .or_else(|| token.strip_suffix("nd"))
        .or_else(|| token.strip_suffix("rd"))
        .or_else(|| token.strip_suffix("th"))
        .unwrap_or(token);
    digits.parse().ok().filter(|d| (1..=31).contains(d))
}

/// "March 15", "15th March", "Mar 15 2026" in any token order.
fn parse_month_day(tokens: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    let mut month = None;
    let mut day = None;
    let mut year = None;

    for token in tokens {
        if month.is_none() {
            if let Some(m) = month_number(token) {
                month = Some(m);
                continue;
            }
        }
        if token.len() == 4 {
            if let Ok(y) = token.parse::<i32>() {
                year = Some(y);
                continue;
            }
        }
        if day.is_none() {
            if let Some(d) = day_number(token) {
                day = Some(d);
                continue;
            }
        }
        return None;
    }

    NaiveDate::from_ymd_opt(year.unwrap_or(today.year()), month?, day?)
}
