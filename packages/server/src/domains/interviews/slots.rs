//! Interview slot types and the recruiter business-hours window.
//!
//! Slots offered to candidates come from the calendar provider's free time,
//! filtered down to weekdays 09:00-18:00. Selection re-validates against the
//! same window so a stale or hand-crafted request cannot land outside it.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const BUSINESS_HOURS_START: u32 = 9;
pub const BUSINESS_HOURS_END: u32 = 18;

/// A half-open time range `[start, end)` offered for an interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether this slot is fully contained in `other`
    pub fn within(&self, other: &Slot) -> bool {
        self.start >= other.start && self.end <= other.end
    }
}

/// Whether a start time falls on a weekday
pub fn is_weekday(at: DateTime<Utc>) -> bool {
    !matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Whether a slot lies inside the advertised business-hours window:
/// weekdays, starting at or after 09:00 and ending by 18:00, with a
/// positive duration.
pub fn within_business_hours(slot: &Slot) -> bool {
    if slot.end <= slot.start {
        return false;
    }
    if !is_weekday(slot.start) {
        return false;
    }
    if slot.start.hour() < BUSINESS_HOURS_START {
        return false;
    }
    // An 18:00 end is allowed; anything past it is not.
    let end_ok = slot.end.hour() < BUSINESS_HOURS_END
        || (slot.end.hour() == BUSINESS_HOURS_END && slot.end.minute() == 0);
    end_ok && slot.start.date_naive() == slot.end.date_naive()
}

/// Filter the calendar provider's free slots down to the business-hours
/// window, preserving order.
pub fn business_hours_only(free: Vec<Slot>) -> Vec<Slot> {
    free.into_iter()
        .filter(|s| within_business_hours(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(y: i32, m: u32, d: u32, h_start: u32, h_end: u32) -> Slot {
        Slot::new(
            Utc.with_ymd_and_hms(y, m, d, h_start, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(y, m, d, h_end, 0, 0).unwrap(),
        )
    }

    #[test]
    fn weekday_slot_in_hours_is_accepted() {
        // 2026-08-03 is a Monday
        assert!(within_business_hours(&slot(2026, 8, 3, 10, 11)));
    }

    #[test]
    fn weekend_slot_is_rejected() {
        // 2026-08-01 is a Saturday
        assert!(!within_business_hours(&slot(2026, 8, 1, 10, 11)));
    }

    #[test]
    fn early_and_late_slots_are_rejected() {
        assert!(!within_business_hours(&slot(2026, 8, 3, 8, 9)));
        assert!(!within_business_hours(&slot(2026, 8, 3, 18, 19)));
    }

    #[test]
    fn slot_ending_exactly_at_close_is_accepted() {
        assert!(within_business_hours(&slot(2026, 8, 3, 17, 18)));
    }

    #[test]
    fn inverted_slot_is_rejected() {
        let s = Slot::new(
            Utc.with_ymd_and_hms(2026, 8, 3, 11, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap(),
        );
        assert!(!within_business_hours(&s));
    }

    #[test]
    fn overlap_detection() {
        let a = slot(2026, 8, 3, 10, 12);
        let b = slot(2026, 8, 3, 11, 13);
        let c = slot(2026, 8, 3, 12, 13);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
