//! Who is assigned to a task, and how a new selection is sent back.
//!
//! The owner of a task is implicitly on it and never appears in the
//! assignee list we submit. [`compute_assignment_update`] is the pure
//! reconciliation; [`AssignmentEditor`] is the stateful selection the CLI
//! drives on top of it.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::api::Backend;
use crate::error::{DevtaskError, ValidationError};
use crate::model::{ProjectMember, Task, UserId};

/// Body of a replace-all assignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentUpdate {
    pub user_ids: Vec<UserId>,
}

/// Reconcile a selection against a task: `selected` minus every owner
/// identity, deduplicated and sorted.
#[must_use]
pub fn compute_assignment_update<'a>(
    task: &Task,
    selected: impl IntoIterator<Item = &'a UserId>,
) -> AssignmentUpdate {
    let user_ids: BTreeSet<&UserId> = selected
        .into_iter()
        .filter(|id| !task.is_owner(id))
        .collect();
    AssignmentUpdate {
        user_ids: user_ids.into_iter().cloned().collect(),
    }
}

/// Project members that can be toggled on a task (everyone but the owner).
#[must_use]
pub fn assignable<'a>(task: &Task, members: &'a [ProjectMember]) -> Vec<&'a ProjectMember> {
    members.iter().filter(|m| !task.is_owner(&m.user_id)).collect()
}

/// Pending assignee selection for one task.
#[derive(Debug, Clone)]
pub struct AssignmentEditor {
    task: Task,
    seed: BTreeSet<UserId>,
    selected: BTreeSet<UserId>,
    saving: bool,
}

impl AssignmentEditor {
    /// Start from the task's current assignees (owner excluded), so a freshly
    /// opened editor is never dirty.
    #[must_use]
    pub fn open(task: Task) -> Self {
        let seed: BTreeSet<UserId> = task
            .assignments
            .iter()
            .map(|u| u.user_id.clone())
            .filter(|id| !task.is_owner(id))
            .collect();
        Self {
            selected: seed.clone(),
            seed,
            task,
            saving: false,
        }
    }

    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    #[must_use]
    pub fn is_selected(&self, user: &UserId) -> bool {
        self.selected.contains(user)
    }

    pub fn selected(&self) -> impl Iterator<Item = &UserId> {
        self.selected.iter()
    }

    #[must_use]
    pub const fn is_saving(&self) -> bool {
        self.saving
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.selected != self.seed
    }

    /// Flip one user. Owners and toggles during a save are ignored.
    pub fn toggle(&mut self, user: &UserId) {
        if self.saving || self.task.is_owner(user) {
            return;
        }
        if !self.selected.remove(user) {
            self.selected.insert(user.clone());
        }
    }

    /// Select `user` (no-op when already selected).
    pub fn add(&mut self, user: &UserId) {
        if !self.is_selected(user) {
            self.toggle(user);
        }
    }

    /// Deselect `user` (no-op when not selected).
    pub fn remove(&mut self, user: &UserId) {
        if self.is_selected(user) {
            self.toggle(user);
        }
    }

    /// Replace the whole selection.
    pub fn set<'a>(&mut self, users: impl IntoIterator<Item = &'a UserId>) {
        if self.saving {
            return;
        }
        self.selected = users
            .into_iter()
            .filter(|id| !self.task.is_owner(id))
            .cloned()
            .collect();
    }

    /// The request the current selection would send.
    #[must_use]
    pub fn pending_update(&self) -> AssignmentUpdate {
        compute_assignment_update(&self.task, &self.selected)
    }

    /// Check that a save may start and mark it in flight.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NoProjectForTask`] when the task has no project,
    /// [`ValidationError::RequestInFlight`] when a save is already pending.
    pub fn begin_submit(&mut self) -> Result<AssignmentUpdate, ValidationError> {
        if self.task.project_id.is_none() {
            return Err(ValidationError::NoProjectForTask(self.task.id.to_string()));
        }
        if self.saving {
            return Err(ValidationError::RequestInFlight);
        }
        self.saving = true;
        Ok(self.pending_update())
    }

    /// Finish the in-flight save. On success the returned task becomes the
    /// new baseline; on failure the selection is kept for a retry.
    pub fn complete_submit(&mut self, saved: Option<Task>) {
        self.saving = false;
        if let Some(task) = saved {
            *self = Self::open(task);
            tracing::debug!(task = %self.task.id, assignees = self.seed.len(), "assignments saved");
        }
    }

    /// Send the selection as a replace-all update.
    ///
    /// # Errors
    ///
    /// Local validation failures from [`Self::begin_submit`], or the
    /// backend's error. Nothing is committed locally on failure.
    pub fn submit<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<&Task, DevtaskError> {
        let update = self.begin_submit()?;
        match backend.update_task_assignments(&self.task.id, &update.user_ids) {
            Ok(task) => {
                self.complete_submit(Some(task));
                Ok(&self.task)
            }
            Err(err) => {
                self.complete_submit(None);
                tracing::warn!(task = %self.task.id, error = %err, "assignment update failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AssignmentEditor, assignable, compute_assignment_update};
    use crate::error::ValidationError;
    use crate::model::{ProjectMember, Role, Status, Task, User, UserId};
    use chrono::Utc;

    fn task(owner: &str, assignees: &[&str]) -> Task {
        Task {
            id: "t1".into(),
            title: "Write docs".into(),
            description: String::new(),
            status: Status::InProgress,
            priority: crate::model::Priority::Medium,
            owner: User::new(owner, format!("{owner}@example.com")),
            user_id: None,
            assignments: assignees
                .iter()
                .map(|a| User::new(*a, format!("{a}@example.com")))
                .collect(),
            project_id: Some("p1".into()),
            estimated_time: 0.0,
            actual_time: 0.0,
            due_date: None,
            is_completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|s| UserId::from(*s)).collect()
    }

    #[test]
    fn owner_is_stripped_and_output_sorted() {
        let t = task("u1", &[]);
        let selected = ids(&["u3", "u1", "u2", "u3"]);
        let update = compute_assignment_update(&t, &selected);
        assert_eq!(update.user_ids, ids(&["u2", "u3"]));
    }

    #[test]
    fn legacy_owner_field_is_stripped_too() {
        let mut t = task("u1", &[]);
        t.user_id = Some("legacy".into());
        let selected = ids(&["legacy", "u2"]);
        assert_eq!(compute_assignment_update(&t, &selected).user_ids, ids(&["u2"]));
    }

    #[test]
    fn fresh_editor_is_clean_and_skips_owner() {
        let editor = AssignmentEditor::open(task("u1", &["u1", "u2"]));
        assert!(!editor.is_dirty());
        assert!(!editor.is_selected(&"u1".into()));
        assert!(editor.is_selected(&"u2".into()));
    }

    #[test]
    fn toggling_owner_is_ignored() {
        let mut editor = AssignmentEditor::open(task("u1", &["u2"]));
        editor.toggle(&"u1".into());
        assert!(!editor.is_dirty());
        editor.toggle(&"u2".into());
        assert!(editor.is_dirty());
        editor.toggle(&"u2".into());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn assignable_excludes_owner() {
        let t = task("u1", &[]);
        let members = vec![
            ProjectMember::new("p1", "u1", Role::Owner),
            ProjectMember::new("p1", "u2", Role::Member),
        ];
        let names: Vec<&str> = assignable(&t, &members)
            .iter()
            .map(|m| m.user_id.as_str())
            .collect();
        assert_eq!(names, vec!["u2"]);
    }

    #[test]
    fn submit_requires_project_and_single_flight() {
        let mut t = task("u1", &[]);
        t.project_id = None;
        let mut editor = AssignmentEditor::open(t);
        assert!(matches!(
            editor.begin_submit(),
            Err(ValidationError::NoProjectForTask(_))
        ));

        let mut editor = AssignmentEditor::open(task("u1", &[]));
        editor.begin_submit().unwrap();
        assert_eq!(editor.begin_submit(), Err(ValidationError::RequestInFlight));
        editor.complete_submit(None);
        assert!(!editor.is_saving());
    }
}
