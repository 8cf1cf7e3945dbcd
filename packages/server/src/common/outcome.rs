use serde::Serialize;

/// Reason an automated operation declined to act.
///
/// These are structured outcomes, not errors: the caller proceeded normally
/// and the system chose to do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AutomationDisabled,
    EmptyBuffer,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutomationDisabled => "automation_disabled",
            Self::EmptyBuffer => "empty_buffer",
        }
    }
}

/// Result of an engine operation that may be skipped without failing.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Done(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Done(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }

    /// Unwrap the completed value, panicking on a skip. Test helper.
    pub fn into_done(self) -> T {
        match self {
            Self::Done(value) => value,
            Self::Skipped(reason) => panic!("operation skipped: {}", reason.as_str()),
        }
    }
}
