use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Progress of a task on a single back-end, or of a task as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Error,
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether no further report is expected for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" | "EXECUTING" | "PENDING" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "ERROR" => Ok(Self::Error),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(CoreError::InvalidValue(format!("unknown task status '{other}'"))),
        }
    }
}

/// Derive a single status from a set of per-backend statuses.
///
/// Rules, in order:
/// - no members: `UNKNOWN`
/// - any member `ERROR`: `ERROR`
/// - every member `COMPLETED`: `COMPLETED`
/// - `UNKNOWN` members are ignored from here on; none left gives `UNKNOWN`
/// - every remaining member `NOT_STARTED`: `NOT_STARTED`
/// - otherwise `IN_PROGRESS`
pub fn combine<I>(statuses: I) -> TaskStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut total = 0usize;
    let mut completed = 0usize;
    let mut not_started = 0usize;
    let mut unknown = 0usize;

    for status in statuses {
        total += 1;
        match status {
            TaskStatus::Error => return TaskStatus::Error,
            TaskStatus::Completed => completed += 1,
            TaskStatus::NotStarted => not_started += 1,
            TaskStatus::Unknown => unknown += 1,
            TaskStatus::InProgress => {}
        }
    }

    if total == 0 {
        return TaskStatus::Unknown;
    }
    if completed == total {
        return TaskStatus::Completed;
    }
    let known = total - unknown;
    if known == 0 {
        TaskStatus::Unknown
    } else if not_started == known {
        TaskStatus::NotStarted
    } else {
        TaskStatus::InProgress
    }
}
