//! Rule-based availability parsing.
//!
//! The deterministic fallback behind the LLM extractor. Understands relative
//! windows ("next week", "tomorrow"), weekday mentions, named parts of the
//! day, and numeric hour ranges. Pure: same text and reference time, same
//! availability.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use super::models::{weekday_key, Availability, HourRange};

/// Default search window when the text names no dates
const DEFAULT_WINDOW_DAYS: i64 = 14;

lazy_static! {
    static ref WEEKDAY_RE: Regex =
        Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)\b")
            .expect("weekday regex is valid");
    static ref ISO_DATE_RE: Regex =
        Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("date regex is valid");
    static ref HOUR_RANGE_RE: Regex = Regex::new(
        r"\b(\d{1,2})\s*(am|pm)?\s*(?:-|\u{2013}|\u{2014}|to|until)\s*(\d{1,2})\s*(am|pm)?\b"
    )
    .expect("hour range regex is valid");
    static ref AFTER_RE: Regex =
        Regex::new(r"\bafter\s+(\d{1,2})\s*(am|pm)?\b").expect("after regex is valid");
    static ref BEFORE_RE: Regex =
        Regex::new(r"\bbefore\s+(\d{1,2})\s*(am|pm)?\b").expect("before regex is valid");
}

/// Parse free-text availability relative to `now`.
///
/// Always yields an availability; text with no recognizable constraint maps
/// to the default two-week window with no day or hour preference.
pub fn parse_availability(text: &str, now: DateTime<Utc>) -> Availability {
    let text = text.to_lowercase();
    let today = now.date_naive();

    let (start_date, end_date) = parse_window(&text, now, today);
    let preferred_days = parse_weekdays(&text);
    // Strip explicit dates first so "2026-08-10" cannot read as an hour range
    let text_without_dates = ISO_DATE_RE.replace_all(&text, " ");
    let preferred_hours = parse_hours(&text_without_dates);

    Availability {
        start_date,
        end_date,
        preferred_days,
        preferred_hours,
    }
}

fn parse_window(
    text: &str,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> (DateTime<Utc>, DateTime<Utc>) {
    // Explicit dates beat relative phrases
    let mut dates: Vec<NaiveDate> = ISO_DATE_RE
        .captures_iter(text)
        .filter_map(|c| {
            let year = c[1].parse().ok()?;
            let month = c[2].parse().ok()?;
            let day = c[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
        .collect();
    dates.sort();
    match dates.as_slice() {
        [single] => return (day_start(*single), day_end(*single)),
        [first, .., last] => return (day_start(*first), day_end(*last)),
        _ => {}
    }

    if text.contains("today") {
        return (now, day_end(today));
    }
    if text.contains("tomorrow") {
        let tomorrow = today + Duration::days(1);
        return (day_start(tomorrow), day_end(tomorrow));
    }
    if text.contains("next week") {
        let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let next_monday = this_monday + Duration::days(7);
        return (day_start(next_monday), day_end(next_monday + Duration::days(6)));
    }
    if text.contains("this week") {
        let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        return (now, day_end(this_monday + Duration::days(6)));
    }

    (now, now + Duration::days(DEFAULT_WINDOW_DAYS))
}

fn parse_weekdays(text: &str) -> Option<BTreeSet<String>> {
    let mut days = BTreeSet::new();
    for capture in WEEKDAY_RE.captures_iter(text) {
        let day = match &capture[1] {
            "monday" | "mon" => Weekday::Mon,
            "tuesday" | "tue" | "tues" => Weekday::Tue,
            "wednesday" | "wed" => Weekday::Wed,
            "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
            "friday" | "fri" => Weekday::Fri,
            "saturday" | "sat" => Weekday::Sat,
            "sunday" | "sun" => Weekday::Sun,
            _ => continue,
        };
        days.insert(weekday_key(day).to_string());
    }
    if days.is_empty() {
        None
    } else {
        Some(days)
    }
}

fn parse_hours(text: &str) -> Option<HourRange> {
    if let Some(capture) = HOUR_RANGE_RE.captures(text) {
        let start_raw: u32 = capture[1].parse().ok()?;
        let end_raw: u32 = capture[3].parse().ok()?;
        let start_meridiem = capture.get(2).map(|m| m.as_str());
        let end_meridiem = capture.get(4).map(|m| m.as_str());
        // "2-5pm": the trailing meridiem governs both ends unless the start
        // carries its own
        let start = to_24h(start_raw, start_meridiem.or(end_meridiem))?;
        let end = to_24h(end_raw, end_meridiem.or(start_meridiem))?;
        if start < end {
            return Some(HourRange {
                start_hour: start,
                end_hour: end,
            });
        }
        return None;
    }

    if let Some(capture) = AFTER_RE.captures(text) {
        let hour_raw: u32 = capture[1].parse().ok()?;
        let hour = to_24h(hour_raw, capture.get(2).map(|m| m.as_str()))?;
        if hour < 24 {
            return Some(HourRange {
                start_hour: hour,
                end_hour: 24,
            });
        }
        return None;
    }

    if let Some(capture) = BEFORE_RE.captures(text) {
        let hour_raw: u32 = capture[1].parse().ok()?;
        let hour = to_24h(hour_raw, capture.get(2).map(|m| m.as_str()))?;
        if hour > 0 {
            return Some(HourRange {
                start_hour: 0,
                end_hour: hour,
            });
        }
        return None;
    }

    if text.contains("morning") {
        return Some(HourRange {
            start_hour: 9,
            end_hour: 12,
        });
    }
    if text.contains("afternoon") {
        return Some(HourRange {
            start_hour: 12,
            end_hour: 17,
        });
    }
    if text.contains("evening") {
        return Some(HourRange {
            start_hour: 17,
            end_hour: 20,
        });
    }

    None
}

fn to_24h(hour: u32, meridiem: Option<&str>) -> Option<u32> {
    match meridiem {
        Some("pm") if hour < 12 => Some(hour + 12),
        Some("am") if hour == 12 => Some(0),
        Some(_) | None if hour <= 24 => Some(hour),
        _ => None,
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DateTime<Utc> {
        // A Saturday
        "2026-08-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn plain_text_yields_default_window() {
        let availability = parse_availability("happy to meet any time", reference());
        assert_eq!(availability.start_date, reference());
        assert_eq!(
            availability.end_date,
            reference() + Duration::days(DEFAULT_WINDOW_DAYS)
        );
        assert!(availability.preferred_days.is_none());
        assert!(availability.preferred_hours.is_none());
    }

    #[test]
    fn weekdays_and_pm_range() {
        let availability = parse_availability(
            "I'm available next Monday or Tuesday, 2-5 PM",
            reference(),
        );
        let days = availability.preferred_days.unwrap();
        assert!(days.contains("monday"));
        assert!(days.contains("tuesday"));
        assert_eq!(
            availability.preferred_hours,
            Some(HourRange {
                start_hour: 14,
                end_hour: 17
            })
        );
    }

    #[test]
    fn next_week_window() {
        let availability = parse_availability("sometime next week works", reference());
        // Reference Sat 2026-08-01; next week runs Mon 03 through Sun 09
        assert_eq!(
            availability.start_date,
            "2026-08-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            availability.end_date,
            "2026-08-09T23:59:59Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn tomorrow_window() {
        let availability = parse_availability("tomorrow morning", reference());
        assert_eq!(
            availability.start_date,
            "2026-08-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            availability.preferred_hours,
            Some(HourRange {
                start_hour: 9,
                end_hour: 12
            })
        );
    }

    #[test]
    fn explicit_date_range() {
        let availability =
            parse_availability("anywhere between 2026-08-10 and 2026-08-12", reference());
        assert_eq!(
            availability.start_date,
            "2026-08-10T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            availability.end_date,
            "2026-08-12T23:59:59Z".parse::<DateTime<Utc>>().unwrap()
        );
        // Date digits must not read as an hour range
        assert!(availability.preferred_hours.is_none());
    }

    #[test]
    fn after_hour_constraint() {
        let availability = parse_availability("only after 3pm please", reference());
        assert_eq!(
            availability.preferred_hours,
            Some(HourRange {
                start_hour: 15,
                end_hour: 24
            })
        );
    }

    #[test]
    fn mixed_meridiem_range() {
        let availability = parse_availability("10am to 2pm on friday", reference());
        assert_eq!(
            availability.preferred_hours,
            Some(HourRange {
                start_hour: 10,
                end_hour: 14
            })
        );
        assert!(availability.preferred_days.unwrap().contains("friday"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "next Monday or Tuesday, 2-5 PM";
        let first = parse_availability(text, reference());
        let second = parse_availability(text, reference());
        assert_eq!(first, second);
    }

    #[test]
    fn inverted_hour_range_is_dropped() {
        let availability = parse_availability("5pm to 2pm", reference());
        assert!(availability.preferred_hours.is_none());
    }
}
