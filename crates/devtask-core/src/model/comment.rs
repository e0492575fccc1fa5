use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommentId, TaskId, User, UserId, timestamp};

/// A comment on a task.
///
/// `replies` is only ever filled in by [`crate::thread::organize_comments`];
/// whatever the backend sends in that field is ignored when threading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    /// Author of the comment.
    pub user_id: UserId,
    pub content: String,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default)]
    pub replies: Vec<Self>,
}

impl Comment {
    /// Author name for display, `Unknown User` when the backend did not
    /// embed the author.
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.user.as_ref().map_or("Unknown User", User::display_name)
    }

    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

// Drop nested replies from a flat work list so a long reply chain cannot
// exhaust the stack in the derived drop glue.
impl Drop for Comment {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut reply) = pending.pop() {
            pending.append(&mut reply.replies);
        }
    }
}

/// Body of `POST /comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub task_id: TaskId,
    pub content: String,
    pub parent_comment_id: Option<CommentId>,
}
