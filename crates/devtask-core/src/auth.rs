//! The signed-in identity, passed explicitly to whatever needs it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{User, UserId};

/// A bearer credential together with the user it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    #[serde(alias = "access_token")]
    pub token: String,
    pub user: User,
}

impl AuthContext {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.user_id
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Keep the token out of logs.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}
