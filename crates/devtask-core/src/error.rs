use std::fmt;

use crate::api::ApiError;

/// Machine-readable error codes for scripts and agents driving the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotLoggedIn,
    ConfigParseError,
    SessionCorrupt,
    EmptyComment,
    CommentTooLong,
    InvalidCommentText,
    NoReplyTarget,
    NoProjectForTask,
    NotAnInvite,
    MissingRelatedProject,
    AlreadyMember,
    InviteDeclined,
    RequestInFlight,
    InvalidEnumValue,
    EmptyPrompt,
    PromptTooLong,
    NotProjectOwner,
    EmptyInviteIdentifier,
    CannotChangeOwnerRole,
    CannotRemoveSelf,
    NotAMember,
    NotTaskEditor,
    Unauthorized,
    NotFound,
    RequestRejected,
    NetworkFailure,
    DecodeFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotLoggedIn => "E1001",
            Self::ConfigParseError => "E1002",
            Self::SessionCorrupt => "E1003",
            Self::EmptyComment => "E2001",
            Self::CommentTooLong => "E2002",
            Self::InvalidCommentText => "E2003",
            Self::NoReplyTarget => "E2004",
            Self::NoProjectForTask => "E2005",
            Self::NotAnInvite => "E2006",
            Self::MissingRelatedProject => "E2007",
            Self::AlreadyMember => "E2008",
            Self::InviteDeclined => "E2009",
            Self::RequestInFlight => "E2010",
            Self::InvalidEnumValue => "E2011",
            Self::EmptyPrompt => "E2012",
            Self::PromptTooLong => "E2013",
            Self::NotProjectOwner => "E2014",
            Self::EmptyInviteIdentifier => "E2015",
            Self::CannotChangeOwnerRole => "E2016",
            Self::CannotRemoveSelf => "E2017",
            Self::NotAMember => "E2018",
            Self::NotTaskEditor => "E2019",
            Self::Unauthorized => "E3001",
            Self::NotFound => "E3002",
            Self::RequestRejected => "E3003",
            Self::NetworkFailure => "E5001",
            Self::DecodeFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotLoggedIn => "Not logged in",
            Self::ConfigParseError => "Config file parse error",
            Self::SessionCorrupt => "Stored session is unreadable",
            Self::EmptyComment => "Comment is empty",
            Self::CommentTooLong => "Comment is too long",
            Self::InvalidCommentText => "Comment contains control characters",
            Self::NoReplyTarget => "No comment is being replied to",
            Self::NoProjectForTask => "Task is not linked to a project",
            Self::NotAnInvite => "Notification is not a project invite",
            Self::MissingRelatedProject => "Invite has no related project",
            Self::AlreadyMember => "Already a project member",
            Self::InviteDeclined => "Invite was already declined",
            Self::RequestInFlight => "A request is already in flight",
            Self::InvalidEnumValue => "Invalid status/priority value",
            Self::EmptyPrompt => "Prompt is empty",
            Self::PromptTooLong => "Prompt is too long",
            Self::NotProjectOwner => "Only the project owner can manage members",
            Self::EmptyInviteIdentifier => "Invite needs a user ID or email",
            Self::CannotChangeOwnerRole => "The project owner's role is fixed",
            Self::CannotRemoveSelf => "Owners cannot remove themselves",
            Self::NotAMember => "User is not a project member",
            Self::NotTaskEditor => "Only the owner or an assignee can edit this task",
            Self::Unauthorized => "Session expired or unauthorized",
            Self::NotFound => "Resource not found",
            Self::RequestRejected => "Request rejected by server",
            Self::NetworkFailure => "Network failure",
            Self::DecodeFailed => "Unexpected response from server",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotLoggedIn | Self::Unauthorized => Some("Run `dt login` and retry."),
            Self::ConfigParseError => Some("Fix syntax in ~/.config/devtask/config.toml and retry."),
            Self::SessionCorrupt => Some("Run `dt logout` then `dt login`."),
            Self::EmptyComment => Some("Write some text before submitting."),
            Self::CommentTooLong => Some("Split the comment into several replies."),
            Self::InvalidCommentText => Some("Remove control characters other than newline and tab."),
            Self::NoReplyTarget => Some("Pick a comment to reply to first."),
            Self::NoProjectForTask => {
                Some("Move the task into a project before managing assignees.")
            }
            Self::NotAnInvite => Some("Use `dt notification open` for other notifications."),
            Self::MissingRelatedProject => None,
            Self::AlreadyMember => Some("Nothing to do: the membership already exists."),
            Self::InviteDeclined => None,
            Self::RequestInFlight => Some("Wait for the pending request to finish."),
            Self::InvalidEnumValue => Some("Use one of the documented status/priority values."),
            Self::EmptyPrompt => Some("Describe the project you want planned."),
            Self::PromptTooLong => Some("Shorten the prompt and retry."),
            Self::NotProjectOwner => Some("Ask the project owner to make this change."),
            Self::EmptyInviteIdentifier => Some("Pass the invitee's user ID or email."),
            Self::CannotChangeOwnerRole | Self::CannotRemoveSelf => None,
            Self::NotAMember => Some("Run `dt members list <project>` to see the roster."),
            Self::NotTaskEditor => Some("Ask the task owner to assign you first."),
            Self::NotFound => Some("Check the ID and your access to the resource."),
            Self::RequestRejected => None,
            Self::NetworkFailure => Some("Check the API URL and your connection, then retry."),
            Self::DecodeFailed => Some("Check that the API URL points at a devtask backend."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Problems caught locally before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("comment must not be empty")]
    EmptyComment,
    #[error("comment must be <= {max} characters (got {got})")]
    CommentTooLong { max: usize, got: usize },
    #[error("comment must not contain control characters")]
    ControlCharacters,
    #[error("no comment is being replied to")]
    NoReplyTarget,
    #[error("task '{0}' is not associated with a project")]
    NoProjectForTask(String),
    #[error("notification '{0}' is not a project invite")]
    NotAnInvite(String),
    #[error("invite '{0}' has no related project")]
    MissingRelatedProject(String),
    #[error("already a member of project '{0}'")]
    AlreadyMember(String),
    #[error("invite '{0}' was already declined")]
    InviteAlreadyDeclined(String),
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("prompt must be <= {max} characters (got {got})")]
    PromptTooLong { max: usize, got: usize },
    #[error("only the owner of project '{0}' can manage its members")]
    NotProjectOwner(String),
    #[error("invite needs a user ID or email")]
    EmptyInviteIdentifier,
    #[error("'{0}' owns the project; their role cannot change")]
    CannotChangeOwnerRole(String),
    #[error("project owners cannot remove themselves")]
    CannotRemoveSelf,
    #[error("'{0}' is not a member of this project")]
    NotAMember(String),
    #[error("you cannot edit task '{0}'")]
    NotTaskEditor(String),
}

impl ValidationError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyComment => ErrorCode::EmptyComment,
            Self::CommentTooLong { .. } => ErrorCode::CommentTooLong,
            Self::ControlCharacters => ErrorCode::InvalidCommentText,
            Self::NoReplyTarget => ErrorCode::NoReplyTarget,
            Self::NoProjectForTask(_) => ErrorCode::NoProjectForTask,
            Self::NotAnInvite(_) => ErrorCode::NotAnInvite,
            Self::MissingRelatedProject(_) => ErrorCode::MissingRelatedProject,
            Self::AlreadyMember(_) => ErrorCode::AlreadyMember,
            Self::InviteAlreadyDeclined(_) => ErrorCode::InviteDeclined,
            Self::RequestInFlight => ErrorCode::RequestInFlight,
            Self::EmptyPrompt => ErrorCode::EmptyPrompt,
            Self::PromptTooLong { .. } => ErrorCode::PromptTooLong,
            Self::NotProjectOwner(_) => ErrorCode::NotProjectOwner,
            Self::EmptyInviteIdentifier => ErrorCode::EmptyInviteIdentifier,
            Self::CannotChangeOwnerRole(_) => ErrorCode::CannotChangeOwnerRole,
            Self::CannotRemoveSelf => ErrorCode::CannotRemoveSelf,
            Self::NotAMember(_) => ErrorCode::NotAMember,
            Self::NotTaskEditor(_) => ErrorCode::NotTaskEditor,
        }
    }
}

/// Top-level error for workflows that can fail locally or remotely.
#[derive(Debug, thiserror::Error)]
pub enum DevtaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("config error: {0}")]
    Config(String),
}

impl DevtaskError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Api(e) => e.error_code(),
            Self::NotLoggedIn => ErrorCode::NotLoggedIn,
            Self::Config(_) => ErrorCode::ConfigParseError,
        }
    }

    /// Remediation hint, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or(code.message()).to_string()
    }

    /// Whether retrying the same action could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Validation(ValidationError::RequestInFlight) => true,
            _ => false,
        }
    }
}
