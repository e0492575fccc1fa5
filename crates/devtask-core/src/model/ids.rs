//! String identifiers issued by the backend.
//!
//! The backend hands out opaque strings (UUIDs in practice). Each entity gets
//! its own newtype so a `UserId` can never be passed where a `TaskId` is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifies a user account.
    UserId
);
string_id!(
    /// Identifies a task.
    TaskId
);
string_id!(
    /// Identifies a project.
    ProjectId
);
string_id!(
    /// Identifies a comment on a task.
    CommentId
);
string_id!(
    /// Identifies a notification.
    NotificationId
);
