//! The dialog behind a `project_invite` notification.
//!
//! Opening the dialog marks the notification read (best effort, once per
//! dialog) and, for invites, asks the server whether the recipient already
//! joined. Accept and decline are only offered while the recipient is not a
//! member and the invite has not been declined.
//!
//! ```text
//! Unseen --open--> SeenUndecided --accept--> Accepted
//!                        |
//!                        +------decline--> Declined (terminal)
//! ```

use serde::Serialize;

use crate::api::Backend;
use crate::auth::AuthContext;
use crate::error::{DevtaskError, ValidationError};
use crate::model::{Notification, ProjectId, is_member};

/// Lifecycle of one invite, per recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Unseen,
    SeenUndecided,
    Accepted,
    Declined,
}

/// What the opened dialog should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogView {
    /// Not an invite: message only.
    Info,
    /// Recipient is already on the project; no actions offered.
    AlreadyJoined,
    /// Accept and decline are offered.
    Undecided,
    /// The invite was declined earlier in this dialog.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accept,
    Decline,
}

/// State of one notification's dialog.
#[derive(Debug, Clone)]
pub struct InviteDialog {
    notification: Notification,
    state: InviteState,
    read_attempted: bool,
    is_open: bool,
    in_flight: bool,
    already_member: bool,
}

impl InviteDialog {
    #[must_use]
    pub fn new(notification: Notification) -> Self {
        let state = if notification.is_read {
            InviteState::SeenUndecided
        } else {
            InviteState::Unseen
        };
        Self {
            notification,
            state,
            read_attempted: false,
            is_open: false,
            in_flight: false,
            already_member: false,
        }
    }

    #[must_use]
    pub const fn notification(&self) -> &Notification {
        &self.notification
    }

    #[must_use]
    pub const fn state(&self) -> InviteState {
        self.state
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    #[must_use]
    pub const fn view(&self) -> DialogView {
        if matches!(self.state, InviteState::Declined) {
            DialogView::Declined
        } else if self.already_member || matches!(self.state, InviteState::Accepted) {
            DialogView::AlreadyJoined
        } else {
            DialogView::Undecided
        }
    }

    /// Whether accept/decline should be shown.
    #[must_use]
    pub fn can_decide(&self) -> bool {
        self.notification.is_invite()
            && self.notification.related_project_id.is_some()
            && !self.in_flight
            && self.view() == DialogView::Undecided
    }

    /// Open the dialog.
    ///
    /// Never fails: a failed mark-as-read or membership lookup is logged
    /// and the dialog opens anyway.
    pub fn open<B: Backend + ?Sized>(&mut self, backend: &B, auth: &AuthContext) -> DialogView {
        self.is_open = true;

        if !self.notification.is_read && !self.read_attempted {
            self.read_attempted = true;
            match backend.mark_notification_read(&self.notification.id) {
                Ok(_) => self.notification.is_read = true,
                Err(err) => tracing::warn!(
                    notification = %self.notification.id,
                    error = %err,
                    "failed to mark notification read"
                ),
            }
        }
        if self.state == InviteState::Unseen {
            self.state = InviteState::SeenUndecided;
        }

        if !self.notification.is_invite() {
            return DialogView::Info;
        }

        if let Some(project) = &self.notification.related_project_id {
            match backend.project_members_live(project) {
                Ok(members) => {
                    self.already_member = is_member(&members, auth.user_id());
                    if self.already_member && self.state == InviteState::SeenUndecided {
                        self.state = InviteState::Accepted;
                    }
                }
                Err(err) => tracing::warn!(
                    project = %project,
                    error = %err,
                    "membership check failed; treating invite as undecided"
                ),
            }
        }

        self.view()
    }

    fn begin(&mut self) -> Result<ProjectId, ValidationError> {
        let id = self.notification.id.to_string();
        if !self.notification.is_invite() {
            return Err(ValidationError::NotAnInvite(id));
        }
        let project = self
            .notification
            .related_project_id
            .clone()
            .ok_or(ValidationError::MissingRelatedProject(id))?;
        if self.in_flight {
            return Err(ValidationError::RequestInFlight);
        }
        match self.view() {
            DialogView::Declined => {
                return Err(ValidationError::InviteAlreadyDeclined(
                    self.notification.id.to_string(),
                ));
            }
            DialogView::AlreadyJoined => {
                return Err(ValidationError::AlreadyMember(project.to_string()));
            }
            DialogView::Info | DialogView::Undecided => {}
        }
        self.in_flight = true;
        Ok(project)
    }

    fn decide<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        auth: &AuthContext,
        decision: Decision,
    ) -> Result<InviteState, DevtaskError> {
        let project = self.begin()?;
        let result = match decision {
            Decision::Accept => backend.accept_invite(&project, auth.user_id()),
            Decision::Decline => backend.decline_invite(&project, auth.user_id()),
        };
        self.in_flight = false;

        match result {
            Ok(()) => {
                self.state = match decision {
                    Decision::Accept => {
                        self.already_member = true;
                        InviteState::Accepted
                    }
                    Decision::Decline => InviteState::Declined,
                };
                self.is_open = false;
                tracing::info!(project = %project, state = ?self.state, "invite answered");
                Ok(self.state)
            }
            Err(err) => {
                tracing::warn!(project = %project, error = %err, ?decision, "invite response failed");
                Err(err.into())
            }
        }
    }

    /// Join the project and close the dialog.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] when accepting is not offered, or the backend
    /// error. On error the state is unchanged.
    pub fn accept<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        auth: &AuthContext,
    ) -> Result<InviteState, DevtaskError> {
        self.decide(backend, auth, Decision::Accept)
    }

    /// Decline the invite and close the dialog.
    ///
    /// # Errors
    ///
    /// Same as [`Self::accept`].
    pub fn decline<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        auth: &AuthContext,
    ) -> Result<InviteState, DevtaskError> {
        self.decide(backend, auth, Decision::Decline)
    }
}
