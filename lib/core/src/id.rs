//! Strongly-typed identifiers for scheduler entities.
//!
//! Task IDs are plain monotonic integers handed out by the scheduler that
//! owns the task; they display with a `task_` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Unique identifier for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates an ID from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the prefix used for display formatting.
    #[must_use]
    pub const fn prefix() -> &'static str {
        "task"
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", Self::prefix(), self.0)
    }
}

impl FromStr for TaskId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("task_").unwrap_or(s);
        raw.parse::<u64>().map(Self).map_err(|e| ParseIdError {
            id_type: "TaskId",
            reason: e.to_string(),
        })
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_format() {
        assert_eq!(TaskId::new(7).to_string(), "task_7");
    }

    #[test]
    fn parse_with_and_without_prefix() {
        let with: TaskId = "task_42".parse().expect("should parse");
        let without: TaskId = "42".parse().expect("should parse");
        assert_eq!(with, without);
        assert_eq!(with.get(), 42);
    }

    #[test]
    fn parse_invalid_id() {
        let err = "task_abc".parse::<TaskId>().unwrap_err();
        assert_eq!(err.id_type, "TaskId");
    }

    #[test]
    fn id_serializes_as_number() {
        let json = serde_json::to_string(&TaskId::new(3)).expect("serialize");
        assert_eq!(json, "3");
    }
}
