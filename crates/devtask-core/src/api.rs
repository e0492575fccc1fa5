//! The REST operations the client consumes, as a trait.
//!
//! The backend is the source of truth for every entity. Workflows in this
//! crate only ever talk to it through [`Backend`], which keeps them testable
//! against [`crate::memory::InMemoryBackend`] and lets the CLI plug in its
//! HTTP implementation. Calls are blocking; a call returns once the response
//! (or failure) is in.

use crate::copilot::GeneratedProject;
use crate::error::ErrorCode;
use crate::model::{
    Comment, MemberInvite, NewComment, Notification, NotificationId, Project, ProjectId,
    ProjectMember, Role, Task, TaskId, TaskUpdate, User, UserId,
};

/// Network and server failures.
///
/// None of these leave partial local state behind: a failed mutation is
/// simply not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401/403. Callers treat this as "session is over".
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Rejected { .. } => ErrorCode::RequestRejected,
            Self::Transport(_) => ErrorCode::NetworkFailure,
            Self::Decode(_) => ErrorCode::DecodeFailed,
        }
    }

    /// Transport failures and 5xx responses may succeed on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Logical operations of the devtask REST API.
pub trait Backend {
    /// The user the credential belongs to.
    fn current_user(&self) -> ApiResult<User>;

    fn list_my_tasks(&self) -> ApiResult<Vec<Task>>;

    fn get_task(&self, task: &TaskId) -> ApiResult<Task>;

    /// Apply a partial update (currently just the status) to a task.
    fn update_task(&self, task: &TaskId, update: &TaskUpdate) -> ApiResult<Task>;

    /// Replace the full assignee list of a task.
    fn update_task_assignments(&self, task: &TaskId, user_ids: &[UserId]) -> ApiResult<Task>;

    /// All comments of a task, flat, in whatever order the server likes.
    fn list_comments(&self, task: &TaskId) -> ApiResult<Vec<Comment>>;

    fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment>;

    fn list_projects(&self) -> ApiResult<Vec<Project>>;

    fn list_project_members(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>>;

    /// Member roster straight from the server, never from a cache.
    ///
    /// Membership decisions (whether to offer accept/decline) must use this.
    fn project_members_live(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.list_project_members(project)
    }

    /// Invite someone (by user id or email) into a project. The invitee gets a
    /// `project_invite` notification and joins only once they accept.
    fn invite_member(&self, invite: &MemberInvite) -> ApiResult<ProjectMember>;

    fn update_member_role(
        &self,
        project: &ProjectId,
        user: &UserId,
        role: Role,
    ) -> ApiResult<ProjectMember>;

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> ApiResult<()>;

    /// Join a project the user was invited to. Joining twice succeeds.
    fn accept_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()>;

    fn decline_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()>;

    fn list_notifications(&self, unread_only: bool) -> ApiResult<Vec<Notification>>;

    /// Mark one notification read. Marking an already-read one succeeds.
    fn mark_notification_read(&self, notification: &NotificationId) -> ApiResult<Notification>;

    /// Ask the co-pilot service to plan a project from a prompt.
    fn generate_project(&self, prompt: &str) -> ApiResult<GeneratedProject>;
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use crate::error::ErrorCode;

    #[test]
    fn retry_classification() {
        assert!(ApiError::Transport("reset".into()).is_retryable());
        assert!(
            ApiError::Rejected {
                status: 503,
                message: "busy".into()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::Rejected {
                status: 422,
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ApiError::Unauthorized("expired".into()).is_retryable());
    }

    #[test]
    fn codes_map_by_class() {
        assert_eq!(ApiError::NotFound("t1".into()).error_code(), ErrorCode::NotFound);
        assert!(ApiError::Unauthorized(String::new()).is_unauthorized());
    }
}
