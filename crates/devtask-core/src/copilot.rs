//! Co-pilot project plans.
//!
//! The service that writes the plan is opaque; this module only knows the
//! response shape and how to summarise it for a preview.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::{Priority, timestamp};

/// Longest prompt accepted, in characters.
pub const MAX_PROMPT_CHARS: usize = 2_000;

/// One step of a generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub estimated_time: f64,
    #[serde(default, with = "timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A plan as returned by the co-pilot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<GeneratedTask>,
}

// The generator is free text underneath; a priority it made up reads as medium.
fn lenient_priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|s| Priority::from_str(s).ok())
        .unwrap_or_default())
}

/// Headline numbers for a plan preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanSummary {
    pub task_count: usize,
    pub total_hours: f64,
    pub high_priority: usize,
    pub completed: usize,
}

impl GeneratedProject {
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            task_count: self.tasks.len(),
            total_hours: self.tasks.iter().map(|t| t.estimated_time).sum(),
            high_priority: self
                .tasks
                .iter()
                .filter(|t| t.priority == Priority::High)
                .count(),
            // Freshly generated plans have nothing done yet.
            completed: 0,
        }
    }
}

/// Trim and bound a prompt before it is sent.
///
/// # Errors
///
/// [`ValidationError::EmptyPrompt`] for blank input and
/// [`ValidationError::PromptTooLong`] past [`MAX_PROMPT_CHARS`].
pub fn validate_prompt(prompt: &str) -> Result<String, ValidationError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }
    let got = trimmed.chars().count();
    if got > MAX_PROMPT_CHARS {
        return Err(ValidationError::PromptTooLong {
            max: MAX_PROMPT_CHARS,
            got,
        });
    }
    Ok(trimmed.to_string())
}
