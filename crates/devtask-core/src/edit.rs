//! Editing a task's own fields.
//!
//! Only the owner or an assignee may edit a task.

use serde::Serialize;

use crate::api::Backend;
use crate::error::{DevtaskError, ValidationError};
use crate::model::{Status, Task, TaskUpdate, UserId};

/// Result of [`change_status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub task: Task,
    pub previous: Status,
    /// `false` when the task already had the requested status and no request
    /// was sent.
    pub changed: bool,
}

/// Move `task` to `status` on behalf of `me`.
///
/// # Errors
///
/// [`ValidationError::NotTaskEditor`] when `me` is neither owner nor
/// assignee, or the backend's error.
pub fn change_status<B: Backend + ?Sized>(
    backend: &B,
    task: Task,
    me: &UserId,
    status: Status,
) -> Result<StatusChange, DevtaskError> {
    if !task.can_edit(me) {
        return Err(ValidationError::NotTaskEditor(task.id.to_string()).into());
    }
    let previous = task.status;
    if previous == status {
        return Ok(StatusChange {
            task,
            previous,
            changed: false,
        });
    }
    let updated = backend
        .update_task(&task.id, &TaskUpdate::status(status))
        .inspect_err(|err| tracing::warn!(task = %task.id, error = %err, "status update failed"))?;
    tracing::debug!(task = %updated.id, from = %previous, to = %updated.status, "status changed");
    Ok(StatusChange {
        task: updated,
        previous,
        changed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::change_status;
    use crate::api::Backend;
    use crate::error::{DevtaskError, ValidationError};
    use crate::memory::InMemoryBackend;
    use crate::model::{Status, Task, User};

    fn setup() -> (InMemoryBackend, Task) {
        let backend = InMemoryBackend::new(User::new("u2", "two@example.com"));
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "title": "Ship",
            "status": "pending",
            "owner": {"user_id": "u1", "email": "one@example.com"},
            "assignments": [{"user_id": "u2", "email": "two@example.com"}],
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        backend.insert_task(task.clone());
        (backend, task)
    }

    #[test]
    fn assignee_moves_the_task() {
        let (b, task) = setup();
        let change = change_status(&b, task, &"u2".into(), Status::Completed).unwrap();
        assert!(change.changed);
        assert_eq!(change.previous, Status::Pending);
        assert_eq!(change.task.status, Status::Completed);
        assert!(b.get_task(&"t1".into()).unwrap().is_completed);
    }

    #[test]
    fn same_status_sends_nothing() {
        let (b, task) = setup();
        let change = change_status(&b, task, &"u1".into(), Status::Pending).unwrap();
        assert!(!change.changed);
        assert_eq!(b.call_count("update_task"), 0);
    }

    #[test]
    fn outsiders_cannot_edit() {
        let (b, task) = setup();
        let err = change_status(&b, task, &"u9".into(), Status::OnHold).unwrap_err();
        assert!(matches!(
            err,
            DevtaskError::Validation(ValidationError::NotTaskEditor(ref id)) if id == "t1"
        ));
        assert_eq!(b.call_count("update_task"), 0);
    }

    #[test]
    fn backend_failure_is_reported() {
        let (b, task) = setup();
        b.fail_next("update_task");
        assert!(change_status(&b, task, &"u2".into(), Status::OnHold).is_err());
        assert_eq!(b.task(&"t1".into()).unwrap().status, Status::Pending);
    }
}
