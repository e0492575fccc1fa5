//! Presentation lookups for status, priority, progress and due dates.
//!
//! Every function here is a total lookup. The typed variants match
//! exhaustively; the `_raw` variants take whatever string the backend sent
//! and fall back to an explicit "Unknown" badge instead of failing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::model::{Priority, Status};

/// Visual weight of a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Muted,
    Normal,
    Danger,
    Unknown,
}

/// Accent colour of a badge, independent of any rendering library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accent {
    Gray,
    Purple,
    Blue,
    Orange,
    Green,
    Red,
    Yellow,
    None,
}

/// How to show a status or priority value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub icon: &'static str,
    pub tone: Tone,
    pub accent: Accent,
}

const fn badge(label: &'static str, icon: &'static str, tone: Tone, accent: Accent) -> Badge {
    Badge {
        label,
        icon,
        tone,
        accent,
    }
}

pub const UNKNOWN_STATUS: Badge = badge("Unknown", "❓", Tone::Unknown, Accent::None);
pub const UNKNOWN_PRIORITY: Badge = badge("Unknown", "⚪", Tone::Unknown, Accent::None);

/// Completion percentage implied by a status.
#[must_use]
pub const fn progress_from_status(status: Status) -> u8 {
    match status {
        Status::NotStarted => 0,
        Status::Pending => 10,
        Status::InProgress => 50,
        Status::OnHold => 60,
        Status::Completed | Status::Cancelled => 100,
    }
}

/// Like [`progress_from_status`], reading 0 for unrecognised input.
#[must_use]
pub fn progress_from_status_raw(raw: &str) -> u8 {
    Status::from_str(raw).map_or(0, progress_from_status)
}

#[must_use]
pub const fn status_config(status: Status) -> Badge {
    match status {
        Status::NotStarted => badge("Not Started", "📄", Tone::Muted, Accent::Gray),
        Status::Pending => badge("Pending", "⏳", Tone::Normal, Accent::Purple),
        Status::InProgress => badge("In Progress", "🔄", Tone::Normal, Accent::Blue),
        Status::OnHold => badge("On Hold", "⏸️", Tone::Normal, Accent::Orange),
        Status::Completed => badge("Completed", "✅", Tone::Normal, Accent::Green),
        Status::Cancelled => badge("Cancelled", "🚫", Tone::Danger, Accent::Red),
    }
}

#[must_use]
pub fn status_config_raw(raw: &str) -> Badge {
    Status::from_str(raw).map_or(UNKNOWN_STATUS, status_config)
}

#[must_use]
pub const fn priority_config(priority: Priority) -> Badge {
    match priority {
        Priority::High => badge("High", "🔥", Tone::Danger, Accent::Red),
        Priority::Medium => badge("Medium", "⚡", Tone::Normal, Accent::Yellow),
        Priority::Low => badge("Low", "🎯", Tone::Muted, Accent::Gray),
    }
}

#[must_use]
pub fn priority_config_raw(raw: &str) -> Badge {
    Priority::from_str(raw).map_or(UNKNOWN_PRIORITY, priority_config)
}

/// Whole calendar days from `today` to the due date (negative when overdue).
#[must_use]
pub fn days_until_due(due: DateTime<Utc>, today: NaiveDate) -> i64 {
    (due.date_naive() - today).num_days()
}

/// Days within which a due date counts as close.
pub const DUE_SOON_DAYS: i64 = 3;

/// Due-date urgency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum DueUrgency {
    NoDueDate,
    Overdue(i64),
    DueSoon(i64),
    OnTrack(i64),
}

impl DueUrgency {
    #[must_use]
    pub const fn from_days(days: Option<i64>) -> Self {
        match days {
            None => Self::NoDueDate,
            Some(d) if d < 0 => Self::Overdue(-d),
            Some(d) if d <= DUE_SOON_DAYS => Self::DueSoon(d),
            Some(d) => Self::OnTrack(d),
        }
    }

    #[must_use]
    pub fn of(due: Option<DateTime<Utc>>, today: NaiveDate) -> Self {
        Self::from_days(due.map(|d| days_until_due(d, today)))
    }

    #[must_use]
    pub fn text(self) -> String {
        match self {
            Self::NoDueDate => "No due date".to_string(),
            Self::Overdue(days) => format!("{days} days overdue"),
            Self::DueSoon(0) => "Due today".to_string(),
            Self::DueSoon(days) | Self::OnTrack(days) => format!("{days} days left"),
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Overdue(_) => "🚨",
            Self::DueSoon(_) => "⚠️",
            Self::NoDueDate | Self::OnTrack(_) => "📅",
        }
    }

    #[must_use]
    pub const fn accent(self) -> Accent {
        match self {
            Self::NoDueDate => Accent::None,
            Self::Overdue(_) => Accent::Red,
            Self::DueSoon(_) => Accent::Yellow,
            Self::OnTrack(_) => Accent::Green,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn progress_table() {
        let got: Vec<u8> = Status::ALL.iter().map(|s| progress_from_status(*s)).collect();
        assert_eq!(got, vec![0, 10, 50, 60, 100, 100]);
        assert_eq!(progress_from_status_raw("archived"), 0);
        assert_eq!(progress_from_status_raw("on_hold"), 60);
    }

    #[test]
    fn every_status_has_a_label_and_icon() {
        for status in Status::ALL {
            let b = status_config(status);
            assert!(!b.label.is_empty());
            assert!(!b.icon.is_empty());
            assert_ne!(b.tone, Tone::Unknown);
        }
        assert_eq!(status_config(Status::OnHold).label, "On Hold");
    }

    #[test]
    fn raw_lookups_fall_back_to_unknown() {
        assert_eq!(status_config_raw("archived"), UNKNOWN_STATUS);
        assert_eq!(priority_config_raw(""), UNKNOWN_PRIORITY);
        assert_eq!(priority_config_raw("HIGH").label, "High");
        assert_eq!(priority_config(Priority::High).tone, Tone::Danger);
    }

    #[test]
    fn due_urgency_buckets_and_text() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let at = |d: u32| Utc.with_ymd_and_hms(2024, 5, d, 18, 30, 0).unwrap();

        assert_eq!(DueUrgency::of(None, today).text(), "No due date");
        assert_eq!(DueUrgency::of(Some(at(7)), today).text(), "3 days overdue");
        assert_eq!(DueUrgency::of(Some(at(10)), today).text(), "Due today");
        assert_eq!(DueUrgency::of(Some(at(13)), today), DueUrgency::DueSoon(3));
        assert_eq!(DueUrgency::of(Some(at(15)), today).text(), "5 days left");
        assert_eq!(DueUrgency::of(Some(at(7)), today).icon(), "🚨");
        assert_eq!(DueUrgency::of(Some(at(12)), today).icon(), "⚠️");
        assert_eq!(DueUrgency::of(Some(at(20)), today).icon(), "📅");
    }
}
