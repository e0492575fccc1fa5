//! Notification list with read-state handling.

use serde::Serialize;

use crate::api::Backend;
use crate::error::DevtaskError;
use crate::model::{Notification, NotificationId, NotificationKind, ProjectId, TaskId};

/// Where opening a notification should lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    Task(TaskId),
    Project(ProjectId),
    None,
}

/// Resolve the entity a notification points at.
#[must_use]
pub fn target(notification: &Notification) -> NotificationTarget {
    let task = || {
        notification
            .related_task_id
            .clone()
            .map_or(NotificationTarget::None, NotificationTarget::Task)
    };
    match notification.kind {
        NotificationKind::TaskAssignment
        | NotificationKind::Comment
        | NotificationKind::CommentReply => task(),
        NotificationKind::ProjectInvite => notification
            .related_project_id
            .clone()
            .map_or(NotificationTarget::None, NotificationTarget::Project),
        NotificationKind::General => NotificationTarget::None,
    }
}

/// The current user's notifications as last fetched.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
}

impl NotificationFeed {
    #[must_use]
    pub const fn new(items: Vec<Notification>) -> Self {
        Self { items }
    }

    /// Fetch the feed, newest first.
    ///
    /// # Errors
    ///
    /// Propagates the backend error.
    pub fn load<B: Backend + ?Sized>(backend: &B, unread_only: bool) -> Result<Self, DevtaskError> {
        let mut items = backend.list_notifications(unread_only)?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self { items })
    }

    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }

    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(|n| !n.is_read)
    }

    /// Mark one notification read.
    ///
    /// Returns `false` without a request when it is already read. Ids not in
    /// the feed are still sent, since the feed may be a filtered view.
    ///
    /// # Errors
    ///
    /// Propagates the backend error; the local flag is left untouched.
    pub fn mark_read<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        id: &NotificationId,
    ) -> Result<bool, DevtaskError> {
        if self.get(id).is_some_and(|n| n.is_read) {
            return Ok(false);
        }
        let updated = backend.mark_notification_read(id)?;
        if let Some(local) = self.items.iter_mut().find(|n| &n.id == id) {
            local.is_read = true;
        } else {
            self.items.push(updated);
        }
        Ok(true)
    }

    /// Mark every unread notification read, returning how many were sent.
    ///
    /// # Errors
    ///
    /// Stops at the first backend failure. Notifications marked before it
    /// stay marked.
    pub fn mark_all_read<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<usize, DevtaskError> {
        let pending: Vec<NotificationId> = self.unread().map(|n| n.id.clone()).collect();
        let mut marked = 0;
        for id in &pending {
            if self.mark_read(backend, id)? {
                marked += 1;
            }
        }
        Ok(marked)
    }
}
