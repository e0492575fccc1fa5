use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{NotificationId, ProjectId, TaskId, UserId, timestamp};

/// What triggered a notification.
///
/// Older backends send the upper-case names (`INVITE`, `ASSIGNMENT`, ...);
/// those are accepted as aliases. Anything unrecognised reads as `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[serde(alias = "COMMENT")]
    Comment,
    CommentReply,
    #[serde(alias = "ASSIGNMENT")]
    TaskAssignment,
    #[serde(alias = "INVITE")]
    ProjectInvite,
    // `other` must stay on the last variant.
    #[serde(alias = "GENERAL", other)]
    General,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Comment => "comment",
            Self::CommentReply => "comment_reply",
            Self::TaskAssignment => "task_assignment",
            Self::ProjectInvite => "project_invite",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification addressed to the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_user_id: UserId,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub related_project_id: Option<ProjectId>,
    #[serde(default)]
    pub related_task_id: Option<TaskId>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

const fn default_kind() -> NotificationKind {
    NotificationKind::General
}

impl Notification {
    #[must_use]
    pub fn is_invite(&self) -> bool {
        self.kind == NotificationKind::ProjectInvite
    }
}
