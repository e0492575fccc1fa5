//! Per-entity read cache in front of a [`Backend`].
//!
//! [`CachedBackend`] answers repeated reads from memory and drops exactly the
//! entries a successful mutation affects:
//!
//! | mutation                         | invalidates                          |
//! |----------------------------------|--------------------------------------|
//! | `create_comment(task)`           | `TaskComments(task)`, `Task(task)`   |
//! | `update_task(task)`              | `Task(task)`, `MyTasks`              |
//! | `update_task_assignments(task)`  | `Task(task)`, `MyTasks`              |
//! | `invite_member(project)`         | `ProjectMembers(project)`            |
//! | `update_member_role(project)`    | `ProjectMembers(project)`            |
//! | `remove_member(project)`         | `ProjectMembers(project)`            |
//! | `accept_invite` / `decline_invite` | `ProjectMembers(project)`, `Notifications` |
//! | `mark_notification_read`         | `Notifications`                      |
//!
//! Failed mutations leave the cache untouched. Membership checks go through
//! [`Backend::project_members_live`], which always reaches the inner backend.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::api::{ApiResult, Backend};
use crate::copilot::GeneratedProject;
use crate::model::{
    Comment, MemberInvite, NewComment, Notification, NotificationId, Project, ProjectId,
    ProjectMember, Role, Task, TaskId, TaskUpdate, User, UserId,
};

// ---------------------------------------------------------------------------
// Keys and entries
// ---------------------------------------------------------------------------

/// Identity of one cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Task(TaskId),
    TaskComments(TaskId),
    ProjectMembers(ProjectId),
    Notifications { unread_only: bool },
    MyTasks,
}

#[derive(Debug, Clone)]
enum Entry {
    Task(Task),
    Tasks(Vec<Task>),
    Comments(Vec<Comment>),
    Members(Vec<ProjectMember>),
    Notifications(Vec<Notification>),
}

/// Hit/miss counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

// ---------------------------------------------------------------------------
// CachedBackend
// ---------------------------------------------------------------------------

/// A [`Backend`] wrapper with a query cache.
#[derive(Debug)]
pub struct CachedBackend<B> {
    inner: B,
    entries: RefCell<HashMap<CacheKey, Entry>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl<B: Backend> CachedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            entries: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub const fn inner(&self) -> &B {
        &self.inner
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Drop one entry. `Notifications` drops both the full and unread views.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.borrow_mut();
        if let CacheKey::Notifications { .. } = key {
            entries.remove(&CacheKey::Notifications { unread_only: false });
            entries.remove(&CacheKey::Notifications { unread_only: true });
        } else {
            entries.remove(key);
        }
        tracing::debug!(?key, "cache invalidated");
    }

    fn read<T>(
        &self,
        key: CacheKey,
        unwrap: fn(&Entry) -> Option<&T>,
        wrap: fn(T) -> Entry,
        fetch: impl FnOnce(&B) -> ApiResult<T>,
    ) -> ApiResult<T>
    where
        T: Clone,
    {
        if let Some(hit) = self.entries.borrow().get(&key).and_then(unwrap) {
            self.hits.set(self.hits.get() + 1);
            tracing::debug!(?key, "cache hit");
            return Ok(hit.clone());
        }
        self.misses.set(self.misses.get() + 1);
        let fresh = fetch(&self.inner)?;
        self.entries.borrow_mut().insert(key, wrap(fresh.clone()));
        Ok(fresh)
    }

    fn invalidate_all(&self, keys: &[CacheKey]) {
        for key in keys {
            self.invalidate(key);
        }
    }
}

impl<B: Backend> Backend for CachedBackend<B> {
    fn current_user(&self) -> ApiResult<User> {
        self.inner.current_user()
    }

    fn list_my_tasks(&self) -> ApiResult<Vec<Task>> {
        self.read(
            CacheKey::MyTasks,
            |e| match e {
                Entry::Tasks(v) => Some(v),
                _ => None,
            },
            Entry::Tasks,
            B::list_my_tasks,
        )
    }

    fn get_task(&self, task: &TaskId) -> ApiResult<Task> {
        self.read(
            CacheKey::Task(task.clone()),
            |e| match e {
                Entry::Task(t) => Some(t),
                _ => None,
            },
            Entry::Task,
            |b| b.get_task(task),
        )
    }

    fn update_task(&self, task: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
        let updated = self.inner.update_task(task, update)?;
        self.invalidate_all(&[CacheKey::Task(task.clone()), CacheKey::MyTasks]);
        Ok(updated)
    }

    fn update_task_assignments(&self, task: &TaskId, user_ids: &[UserId]) -> ApiResult<Task> {
        let updated = self.inner.update_task_assignments(task, user_ids)?;
        self.invalidate_all(&[CacheKey::Task(task.clone()), CacheKey::MyTasks]);
        Ok(updated)
    }

    fn list_comments(&self, task: &TaskId) -> ApiResult<Vec<Comment>> {
        self.read(
            CacheKey::TaskComments(task.clone()),
            |e| match e {
                Entry::Comments(v) => Some(v),
                _ => None,
            },
            Entry::Comments,
            |b| b.list_comments(task),
        )
    }

    fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment> {
        let created = self.inner.create_comment(comment)?;
        self.invalidate_all(&[
            CacheKey::TaskComments(comment.task_id.clone()),
            CacheKey::Task(comment.task_id.clone()),
        ]);
        Ok(created)
    }

    fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.inner.list_projects()
    }

    fn list_project_members(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.read(
            CacheKey::ProjectMembers(project.clone()),
            |e| match e {
                Entry::Members(v) => Some(v),
                _ => None,
            },
            Entry::Members,
            |b| b.list_project_members(project),
        )
    }

    fn project_members_live(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        let fresh = self.inner.project_members_live(project)?;
        self.entries.borrow_mut().insert(
            CacheKey::ProjectMembers(project.clone()),
            Entry::Members(fresh.clone()),
        );
        Ok(fresh)
    }

    fn invite_member(&self, invite: &MemberInvite) -> ApiResult<ProjectMember> {
        let invited = self.inner.invite_member(invite)?;
        self.invalidate(&CacheKey::ProjectMembers(invite.project_id.clone()));
        Ok(invited)
    }

    fn update_member_role(
        &self,
        project: &ProjectId,
        user: &UserId,
        role: Role,
    ) -> ApiResult<ProjectMember> {
        let updated = self.inner.update_member_role(project, user, role)?;
        self.invalidate(&CacheKey::ProjectMembers(project.clone()));
        Ok(updated)
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.inner.remove_member(project, user)?;
        self.invalidate(&CacheKey::ProjectMembers(project.clone()));
        Ok(())
    }

    fn accept_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.inner.accept_invite(project, user)?;
        self.invalidate_all(&[
            CacheKey::ProjectMembers(project.clone()),
            CacheKey::Notifications { unread_only: false },
        ]);
        Ok(())
    }

    fn decline_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.inner.decline_invite(project, user)?;
        self.invalidate_all(&[
            CacheKey::ProjectMembers(project.clone()),
            CacheKey::Notifications { unread_only: false },
        ]);
        Ok(())
    }

    fn list_notifications(&self, unread_only: bool) -> ApiResult<Vec<Notification>> {
        self.read(
            CacheKey::Notifications { unread_only },
            |e| match e {
                Entry::Notifications(v) => Some(v),
                _ => None,
            },
            Entry::Notifications,
            |b| b.list_notifications(unread_only),
        )
    }

    fn mark_notification_read(&self, notification: &NotificationId) -> ApiResult<Notification> {
        let updated = self.inner.mark_notification_read(notification)?;
        self.invalidate(&CacheKey::Notifications { unread_only: false });
        Ok(updated)
    }

    fn generate_project(&self, prompt: &str) -> ApiResult<GeneratedProject> {
        self.inner.generate_project(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheKey, CachedBackend};
    use crate::api::Backend;
    use crate::memory::InMemoryBackend;
    use crate::model::{
        NewComment, ProjectId, ProjectMember, Role, Status, Task, TaskUpdate, User, UserId,
    };

    fn cached() -> CachedBackend<InMemoryBackend> {
        CachedBackend::new(InMemoryBackend::new(User::new("u1", "one@example.com")))
    }

    fn comment_on(task: &str) -> NewComment {
        NewComment {
            task_id: task.into(),
            content: "hi".into(),
            parent_comment_id: None,
        }
    }

    #[test]
    fn repeated_reads_hit_the_cache() {
        let b = cached();
        b.list_comments(&"t1".into()).unwrap();
        b.list_comments(&"t1".into()).unwrap();
        assert_eq!(b.inner().call_count("list_comments"), 1);
        assert_eq!(b.stats().hits, 1);
    }

    #[test]
    fn create_comment_invalidates_only_its_task() {
        let b = cached();
        b.list_comments(&"t1".into()).unwrap();
        b.list_comments(&"t2".into()).unwrap();
        b.list_notifications(false).unwrap();

        b.create_comment(&comment_on("t1")).unwrap();
        assert!(!b.contains(&CacheKey::TaskComments("t1".into())));
        assert!(b.contains(&CacheKey::TaskComments("t2".into())));
        assert!(b.contains(&CacheKey::Notifications { unread_only: false }));
        assert_eq!(b.list_comments(&"t1".into()).unwrap().len(), 1);
    }

    #[test]
    fn failed_mutation_keeps_entries() {
        let b = cached();
        b.list_comments(&"t1".into()).unwrap();
        b.inner().fail_next("create_comment");
        assert!(b.create_comment(&comment_on("t1")).is_err());
        assert!(b.contains(&CacheKey::TaskComments("t1".into())));
    }

    #[test]
    fn accept_invalidates_members_and_both_notification_views() {
        let b = cached();
        let project = ProjectId::from("p1");
        b.list_project_members(&project).unwrap();
        b.list_notifications(false).unwrap();
        b.list_notifications(true).unwrap();
        b.list_comments(&"t1".into()).unwrap();

        b.accept_invite(&project, &UserId::from("u1")).unwrap();
        assert!(!b.contains(&CacheKey::ProjectMembers(project.clone())));
        assert!(!b.contains(&CacheKey::Notifications { unread_only: false }));
        assert!(!b.contains(&CacheKey::Notifications { unread_only: true }));
        assert!(b.contains(&CacheKey::TaskComments("t1".into())));
        assert_eq!(b.list_project_members(&project).unwrap().len(), 1);
    }

    #[test]
    fn live_membership_bypasses_stale_entry() {
        let b = cached();
        let project = ProjectId::from("p1");
        assert!(b.list_project_members(&project).unwrap().is_empty());
        b.inner().accept_invite(&project, &"u1".into()).unwrap();

        assert!(b.list_project_members(&project).unwrap().is_empty());
        assert_eq!(b.project_members_live(&project).unwrap().len(), 1);
        assert_eq!(b.list_project_members(&project).unwrap().len(), 1);
    }

    #[test]
    fn status_update_drops_task_and_my_tasks() {
        let b = cached();
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "title": "Ship",
            "status": "pending",
            "owner": {"user_id": "u1", "email": "one@example.com"},
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        b.inner().insert_task(task);
        b.get_task(&"t1".into()).unwrap();
        b.list_my_tasks().unwrap();
        b.list_comments(&"t1".into()).unwrap();

        b.update_task(&"t1".into(), &TaskUpdate::status(Status::Completed))
            .unwrap();
        assert!(!b.contains(&CacheKey::Task("t1".into())));
        assert!(!b.contains(&CacheKey::MyTasks));
        assert!(b.contains(&CacheKey::TaskComments("t1".into())));
        assert_eq!(b.get_task(&"t1".into()).unwrap().status, Status::Completed);
    }

    #[test]
    fn roster_changes_drop_only_that_roster() {
        let b = cached();
        let p1 = ProjectId::from("p1");
        let p2 = ProjectId::from("p2");
        b.inner().insert_member(ProjectMember::new("p1", "u2", Role::Member));
        b.list_project_members(&p1).unwrap();
        b.list_project_members(&p2).unwrap();

        b.update_member_role(&p1, &"u2".into(), Role::Owner).unwrap();
        assert!(!b.contains(&CacheKey::ProjectMembers(p1.clone())));
        assert!(b.contains(&CacheKey::ProjectMembers(p2.clone())));
        assert_eq!(b.list_project_members(&p1).unwrap()[0].role, Role::Owner);

        b.remove_member(&p1, &"u2".into()).unwrap();
        assert!(b.list_project_members(&p1).unwrap().is_empty());

        b.inner().fail_next("remove_member");
        assert!(b.remove_member(&p1, &"u2".into()).is_err());
        assert!(b.contains(&CacheKey::ProjectMembers(p1)));
    }
}
