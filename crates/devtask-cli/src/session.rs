//! Stored login session (`session.json`).

use anyhow::{Context, Result};
use devtask_core::auth::AuthContext;
use devtask_core::config::session_path;
use devtask_core::error::DevtaskError;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the session lives on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// The default location, honouring `DEVTASK_SESSION`.
    ///
    /// # Errors
    ///
    /// Fails when no data directory can be determined.
    pub fn locate() -> Result<Self> {
        session_path()
            .map(Self::at)
            .context("could not determine a data directory for the session file")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential, if any.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but is unreadable or not valid JSON.
    pub fn load(&self) -> Result<Option<AuthContext>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let auth = serde_json::from_str(&raw)
            .with_context(|| format!("session file {} is corrupt", self.path.display()))?;
        Ok(Some(auth))
    }

    /// Load the stored credential or fail with [`DevtaskError::NotLoggedIn`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn require(&self) -> Result<AuthContext> {
        self.load()?.ok_or_else(|| DevtaskError::NotLoggedIn.into())
    }

    /// # Errors
    ///
    /// Fails when the directory cannot be created or the file written.
    pub fn save(&self, auth: &AuthContext) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(auth)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Remove the stored credential. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "session cleared");
        Ok(true)
    }
}
