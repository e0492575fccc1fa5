//! Backend-shaped entities.
//!
//! All of these are transient copies of server state; the client never
//! persists them.

pub mod comment;
pub mod ids;
pub mod notification;
pub mod project;
pub mod task;
pub mod timestamp;
pub mod user;

pub use comment::{Comment, NewComment};
pub use ids::{CommentId, NotificationId, ProjectId, TaskId, UserId};
pub use notification::{Notification, NotificationKind};
pub use project::{MemberInvite, Project, ProjectMember, Role, is_member};
pub use task::{ParseEnumError, Priority, Status, Task, TaskUpdate};
pub use user::User;
