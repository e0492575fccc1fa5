//! Managing who is on a project.
//!
//! Only the project's owner may invite, change roles or remove members. The
//! owner's own role is fixed and the owner cannot remove themselves. Every
//! rule is checked locally before a request goes out; the server stays the
//! final authority.

use crate::api::{ApiError, Backend};
use crate::error::{DevtaskError, ValidationError};
use crate::model::{MemberInvite, Project, ProjectId, ProjectMember, Role, UserId};

/// A project with its live member list, seen by one user.
#[derive(Debug, Clone)]
pub struct Roster {
    project: Project,
    members: Vec<ProjectMember>,
    me: UserId,
}

impl Roster {
    /// Load `project` as `me` sees it.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the project is not one of `me`'s projects,
    /// or the backend's error.
    pub fn load<B: Backend + ?Sized>(
        backend: &B,
        project: &ProjectId,
        me: &UserId,
    ) -> Result<Self, DevtaskError> {
        let project = backend
            .list_projects()?
            .into_iter()
            .find(|p| &p.id == project)
            .ok_or_else(|| ApiError::NotFound(format!("project {project}")))?;
        let members = backend.project_members_live(&project.id)?;
        Ok(Self::new(project, members, me.clone()))
    }

    #[must_use]
    pub const fn new(project: Project, members: Vec<ProjectMember>, me: UserId) -> Self {
        Self {
            project,
            members,
            me,
        }
    }

    #[must_use]
    pub const fn project(&self) -> &Project {
        &self.project
    }

    #[must_use]
    pub fn members(&self) -> &[ProjectMember] {
        &self.members
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.project.owner_id == self.me
    }

    /// The member named by `identifier`: a user id, or an email ignoring case.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&ProjectMember> {
        let identifier = identifier.trim();
        self.members.iter().find(|m| {
            m.user_id.as_str() == identifier
                || m.user
                    .as_ref()
                    .is_some_and(|u| u.email.eq_ignore_ascii_case(identifier))
        })
    }

    fn require_owner(&self) -> Result<(), ValidationError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ValidationError::NotProjectOwner(self.project.id.to_string()))
        }
    }

    fn require_member(&self, identifier: &str) -> Result<UserId, ValidationError> {
        self.find(identifier)
            .map(|m| m.user_id.clone())
            .ok_or_else(|| ValidationError::NotAMember(identifier.trim().to_string()))
    }

    /// Send an invite. The invitee joins once they accept, so the local
    /// roster does not change.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotProjectOwner`],
    /// [`ValidationError::EmptyInviteIdentifier`] or
    /// [`ValidationError::AlreadyMember`] before any request; otherwise the
    /// backend's error.
    pub fn invite<B: Backend + ?Sized>(
        &self,
        backend: &B,
        identifier: &str,
        role: Role,
    ) -> Result<ProjectMember, DevtaskError> {
        self.require_owner()?;
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ValidationError::EmptyInviteIdentifier.into());
        }
        if self.find(identifier).is_some() {
            return Err(ValidationError::AlreadyMember(self.project.title.clone()).into());
        }
        let invite = MemberInvite {
            project_id: self.project.id.clone(),
            user_identifier: identifier.to_string(),
            role,
        };
        let pending = backend.invite_member(&invite).inspect_err(|err| {
            tracing::warn!(project = %self.project.id, error = %err, "invite failed");
        })?;
        tracing::debug!(project = %self.project.id, user = %pending.user_id, %role, "invite sent");
        Ok(pending)
    }

    /// Change a member's role. Returns `false` when the member already has
    /// `role`, in which case nothing is sent.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotProjectOwner`],
    /// [`ValidationError::CannotChangeOwnerRole`] or
    /// [`ValidationError::NotAMember`] before any request; otherwise the
    /// backend's error.
    pub fn change_role<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        identifier: &str,
        role: Role,
    ) -> Result<bool, DevtaskError> {
        self.require_owner()?;
        let user = self.require_member(identifier)?;
        if user == self.project.owner_id {
            return Err(ValidationError::CannotChangeOwnerRole(user.to_string()).into());
        }
        if self.members.iter().any(|m| m.user_id == user && m.role == role) {
            return Ok(false);
        }
        let updated = backend.update_member_role(&self.project.id, &user, role)?;
        if let Some(member) = self.members.iter_mut().find(|m| m.user_id == user) {
            member.role = updated.role;
        }
        Ok(true)
    }

    /// Remove a member and return their id.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotProjectOwner`],
    /// [`ValidationError::CannotRemoveSelf`] or
    /// [`ValidationError::NotAMember`] before any request; otherwise the
    /// backend's error.
    pub fn remove<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        identifier: &str,
    ) -> Result<UserId, DevtaskError> {
        self.require_owner()?;
        let user = self.require_member(identifier)?;
        if user == self.me {
            return Err(ValidationError::CannotRemoveSelf.into());
        }
        backend.remove_member(&self.project.id, &user)?;
        self.members.retain(|m| m.user_id != user);
        Ok(user)
    }
}
