use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ProjectId, TaskId, User, UserId, timestamp};

/// The six lifecycle states a task can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Pending,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl Status {
    /// Every status, in board-column order.
    pub const ALL: [Self; 6] = [
        Self::NotStarted,
        Self::Pending,
        Self::InProgress,
        Self::OnHold,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A task as returned by `GET /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    pub owner: User,
    /// Older payloads name the owner here instead of (or as well as) `owner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub assignments: Vec<User>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub estimated_time: f64,
    #[serde(default)]
    pub actual_time: f64,
    #[serde(default, with = "timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Every identity that denotes this task's owner.
    ///
    /// The nested `owner` is authoritative; a legacy `user_id` that disagrees
    /// with it is still treated as an owner so neither can be reassigned.
    pub fn owner_ids(&self) -> impl Iterator<Item = &UserId> {
        std::iter::once(&self.owner.user_id)
            .chain(self.user_id.iter().filter(|id| **id != self.owner.user_id))
    }

    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.owner_ids().any(|id| id == user)
    }

    /// Whether `user` may edit the task: its owner or one of its assignees.
    #[must_use]
    pub fn can_edit(&self, user: &UserId) -> bool {
        self.is_owner(user) || self.assignments.iter().any(|a| &a.user_id == user)
    }
}

/// Partial body of `PUT /tasks/{id}`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl TaskUpdate {
    #[must_use]
    pub const fn status(status: Status) -> Self {
        Self {
            status: Some(status),
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "not_started" => Ok(Self::NotStarted),
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "on_hold" => Ok(Self::OnHold),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}
