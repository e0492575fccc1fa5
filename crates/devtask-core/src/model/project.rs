use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ProjectId, User, UserId, task::ParseEnumError, timestamp};

/// Role of a member inside a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    #[default]
    Member,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

/// One row of a project's member roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: UserId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl ProjectMember {
    pub fn new(project_id: impl Into<ProjectId>, user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            project_id: project_id.into(),
            role,
            user: None,
        }
    }

    /// Display name from the embedded user, else the raw user id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.user
            .as_ref()
            .map_or(self.user_id.as_str(), User::display_name)
    }
}

/// Body of `POST /project-members/invite`.
///
/// `user_identifier` is a user id or an email address; the server resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInvite {
    pub project_id: ProjectId,
    pub user_identifier: String,
    #[serde(default)]
    pub role: Role,
}

/// Whether `user` appears anywhere in `members`.
#[must_use]
pub fn is_member(members: &[ProjectMember], user: &UserId) -> bool {
    members.iter().any(|m| &m.user_id == user)
}

/// A project as returned by `GET /project/my-projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: UserId,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
}
