//! Connecting a command to a backend.
//!
//! `http(s)://` base URLs talk to the REST service. A `file://<path>` base URL
//! loads a JSON [`Snapshot`] into an [`InMemoryBackend`] and writes it back
//! after the command, which gives an offline mode for demos and tests.

use anyhow::{Context, Result};
use devtask_core::api::{ApiError, ApiResult, Backend};
use devtask_core::auth::AuthContext;
use devtask_core::cache::CachedBackend;
use devtask_core::config::EffectiveConfig;
use devtask_core::copilot::GeneratedProject;
use devtask_core::error::DevtaskError;
use devtask_core::memory::{InMemoryBackend, Snapshot};
use devtask_core::model::{
    Comment, MemberInvite, NewComment, Notification, NotificationId, Project, ProjectId,
    ProjectMember, Role, Task, TaskId, TaskUpdate, User, UserId,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::HttpBackend;
use crate::output::{CliError, OutputMode, render_error};
use crate::session::SessionStore;

const SNAPSHOT_SCHEME: &str = "file://";

/// Token handed out by snapshot logins.
const OFFLINE_TOKEN: &str = "offline";

/// The backend behind a base URL.
#[derive(Debug)]
pub enum Remote {
    Http(HttpBackend),
    Snapshot {
        path: PathBuf,
        backend: InMemoryBackend,
    },
}

impl Remote {
    /// Build the backend for `config.base_url`, authenticated as `auth` when
    /// given.
    ///
    /// # Errors
    ///
    /// Fails when a snapshot file cannot be read or parsed.
    pub fn connect(config: &EffectiveConfig, auth: Option<&AuthContext>) -> Result<Self> {
        if let Some(raw) = config.base_url.strip_prefix(SNAPSHOT_SCHEME) {
            let path = PathBuf::from(raw);
            let backend = InMemoryBackend::from_snapshot(read_snapshot(&path)?);
            tracing::debug!(path = %path.display(), "using snapshot backend");
            return Ok(Self::Snapshot { path, backend });
        }
        let http = HttpBackend::new(&config.base_url, Duration::from_secs(config.timeout_secs));
        tracing::debug!(base_url = http.base_url(), "using http backend");
        Ok(Self::Http(match auth {
            Some(auth) => http.with_auth(auth),
            None => http,
        }))
    }

    /// Exchange credentials for a session.
    ///
    /// A snapshot accepts only its own user, with any password.
    ///
    /// # Errors
    ///
    /// The backend's rejection.
    pub fn login(&self, email: &str, password: &str) -> ApiResult<AuthContext> {
        match self {
            Self::Http(http) => http.login(email, password),
            Self::Snapshot { backend, .. } => {
                let me = backend.me();
                if me.email.eq_ignore_ascii_case(email.trim()) {
                    Ok(AuthContext::new(OFFLINE_TOKEN, me.clone()))
                } else {
                    Err(ApiError::Unauthorized(format!(
                        "no account for '{email}' in this snapshot"
                    )))
                }
            }
        }
    }

    /// Write snapshot state back to disk. No-op for HTTP.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot file cannot be written.
    pub fn persist(&self) -> Result<()> {
        if let Self::Snapshot { path, backend } = self {
            let json = serde_json::to_string_pretty(&backend.snapshot())?;
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(())
    }

    fn backend(&self) -> &dyn Backend {
        match self {
            Self::Http(http) => http,
            Self::Snapshot { backend, .. } => backend,
        }
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("snapshot {} is not valid JSON", path.display()))
}

impl Backend for Remote {
    fn current_user(&self) -> ApiResult<User> {
        self.backend().current_user()
    }

    fn list_my_tasks(&self) -> ApiResult<Vec<Task>> {
        self.backend().list_my_tasks()
    }

    fn get_task(&self, task: &TaskId) -> ApiResult<Task> {
        self.backend().get_task(task)
    }

    fn update_task(&self, task: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
        self.backend().update_task(task, update)
    }

    fn update_task_assignments(&self, task: &TaskId, user_ids: &[UserId]) -> ApiResult<Task> {
        self.backend().update_task_assignments(task, user_ids)
    }

    fn list_comments(&self, task: &TaskId) -> ApiResult<Vec<Comment>> {
        self.backend().list_comments(task)
    }

    fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment> {
        self.backend().create_comment(comment)
    }

    fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.backend().list_projects()
    }

    fn list_project_members(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.backend().list_project_members(project)
    }

    fn project_members_live(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.backend().project_members_live(project)
    }

    fn invite_member(&self, invite: &MemberInvite) -> ApiResult<ProjectMember> {
        self.backend().invite_member(invite)
    }

    fn update_member_role(
        &self,
        project: &ProjectId,
        user: &UserId,
        role: Role,
    ) -> ApiResult<ProjectMember> {
        self.backend().update_member_role(project, user, role)
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.backend().remove_member(project, user)
    }

    fn accept_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.backend().accept_invite(project, user)
    }

    fn decline_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.backend().decline_invite(project, user)
    }

    fn list_notifications(&self, unread_only: bool) -> ApiResult<Vec<Notification>> {
        self.backend().list_notifications(unread_only)
    }

    fn mark_notification_read(&self, notification: &NotificationId) -> ApiResult<Notification> {
        self.backend().mark_notification_read(notification)
    }

    fn generate_project(&self, prompt: &str) -> ApiResult<GeneratedProject> {
        self.backend().generate_project(prompt)
    }
}

/// Everything a logged-in command needs.
#[derive(Debug)]
pub struct Client {
    pub auth: AuthContext,
    pub backend: CachedBackend<Remote>,
    pub config: EffectiveConfig,
    pub output: OutputMode,
    session: SessionStore,
}

impl Client {
    /// Load the session and connect.
    ///
    /// # Errors
    ///
    /// [`DevtaskError::NotLoggedIn`] without a session (rendered before
    /// returning), or connection setup failures.
    pub fn open(config: EffectiveConfig, output: OutputMode) -> Result<Self> {
        let session = SessionStore::locate()?;
        let auth = match session.require() {
            Ok(auth) => auth,
            Err(err) => return Err(report_anyhow(output, err)),
        };
        let remote = Remote::connect(&config, Some(&auth))?;
        Ok(Self {
            auth,
            backend: CachedBackend::new(remote),
            config,
            output,
            session,
        })
    }

    /// Render a workflow failure and turn it into the command's error.
    ///
    /// An authorization failure also drops the stored session, so the next
    /// command asks for a fresh login.
    pub fn fail(&self, err: DevtaskError) -> anyhow::Error {
        if matches!(&err, DevtaskError::Api(api) if api.is_unauthorized()) {
            match self.session.clear() {
                Ok(_) => tracing::info!("session expired, logged out"),
                Err(e) => tracing::warn!("failed to clear session: {e:#}"),
            }
        }
        report(self.output, err)
    }

    /// Save snapshot state, if any, once the command is done.
    ///
    /// # Errors
    ///
    /// See [`Remote::persist`].
    pub fn finish(self) -> Result<()> {
        self.backend.inner().persist()
    }
}

/// Render a typed error and wrap it for `main`.
pub fn report(output: OutputMode, err: DevtaskError) -> anyhow::Error {
    if let Err(render_err) = render_error(output, &CliError::from(&err)) {
        tracing::warn!("failed to render error: {render_err:#}");
    }
    err.into()
}

/// Like [`report`], for errors that may or may not carry a [`DevtaskError`].
pub fn report_anyhow(output: OutputMode, err: anyhow::Error) -> anyhow::Error {
    let cli = err
        .downcast_ref::<DevtaskError>()
        .map_or_else(|| CliError::new(format!("{err:#}")), CliError::from);
    if let Err(render_err) = render_error(output, &cli) {
        tracing::warn!("failed to render error: {render_err:#}");
    }
    err
}
