use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_MAX_ROUNDS: i32 = 3;

/// Negotiation session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    Active,
    Resolved,
    Escalated,
}

impl NegotiationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        }
    }
}

impl FromStr for NegotiationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            other => Err(format!("unknown negotiation state: {}", other)),
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryActor {
    Candidate,
    Bot,
}

/// One turn of the negotiation conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub actor: HistoryActor,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A bounded-round slot negotiation attached to one interview.
///
/// `round` starts at 1 and never exceeds `max_rounds`; once a round with no
/// matching slots lands at the bound, the session escalates to the recruiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub round: i32,
    pub max_rounds: i32,
    pub state: NegotiationState,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NegotiationSession {
    pub fn new(interview_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            interview_id,
            round: 1,
            max_rounds: DEFAULT_MAX_ROUNDS,
            state: NegotiationState::Active,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_entry(&mut self, actor: HistoryActor, message: impl Into<String>, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            actor,
            message: message.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// The most recent bot entry, if any
    pub fn last_bot_entry(&self) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .rev()
            .find(|e| e.actor == HistoryActor::Bot)
    }
}

/// Structured candidate availability, either supplied directly or parsed
/// from free text.
///
/// `preferred_days` uses a BTreeSet so iteration order (and therefore
/// matching) is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub preferred_days: Option<BTreeSet<String>>,
    #[serde(default)]
    pub preferred_hours: Option<HourRange>,
}

/// Preferred hour-of-day window `[start_hour, end_hour)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Availability {
    /// Whether `day` is among the preferred weekdays (all days when none given)
    pub fn day_allowed(&self, day: Weekday) -> bool {
        match &self.preferred_days {
            Some(days) => days.contains(weekday_key(day)),
            None => true,
        }
    }

    /// Whether `hour` falls in the preferred window (all hours when none given)
    pub fn hour_allowed(&self, hour: u32) -> bool {
        match self.preferred_hours {
            Some(range) => range.start_hour <= hour && hour < range.end_hour,
            None => true,
        }
    }
}

/// Canonical lowercase key for a weekday, as stored in `preferred_days`
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
