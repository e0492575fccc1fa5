use serde::{Deserialize, Serialize};

use super::UserId;

/// A user account as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl User {
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            full_name: None,
        }
    }

    #[must_use]
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    fn trimmed_full_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Full name, else email, else the raw user id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.trimmed_full_name() {
            return name;
        }
        if !self.email.trim().is_empty() {
            return self.email.trim();
        }
        self.user_id.as_str()
    }

    /// Avatar initials: first and last word of the full name, else the first
    /// letter of the email, else `?`.
    #[must_use]
    pub fn initials(&self) -> String {
        if let Some(name) = self.trimmed_full_name() {
            let words: Vec<&str> = name.split_whitespace().collect();
            let first = words.first().and_then(|w| w.chars().next());
            let last = if words.len() > 1 {
                words.last().and_then(|w| w.chars().next())
            } else {
                None
            };
            return first
                .into_iter()
                .chain(last)
                .flat_map(char::to_uppercase)
                .collect();
        }

        self.email
            .trim()
            .chars()
            .next()
            .map_or_else(|| "?".to_string(), |c| c.to_uppercase().collect())
    }

    /// The handle used when quoting this user at the start of a reply: full
    /// name if known, else the local part of the email.
    #[must_use]
    pub fn mention_handle(&self) -> &str {
        if let Some(name) = self.trimmed_full_name() {
            return name;
        }
        let email = self.email.trim();
        email.split('@').next().filter(|s| !s.is_empty()).unwrap_or(email)
    }
}
