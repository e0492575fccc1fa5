//! A [`Backend`] that keeps everything in process memory.
//!
//! Used by tests, and by `dt` when the API URL is a `file://` snapshot so the
//! client can run offline. Every call is counted per operation name, and a
//! failure can be queued for the next call of any operation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::api::{ApiError, ApiResult, Backend};
use crate::copilot::GeneratedProject;
use crate::model::{
    Comment, CommentId, MemberInvite, NewComment, Notification, NotificationId,
    NotificationKind, Project, ProjectId, ProjectMember, Role, Status, Task, TaskId, TaskUpdate,
    User, UserId, is_member,
};

/// Everything an [`InMemoryBackend`] holds, in a JSON-friendly shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub me: User,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub members: Vec<ProjectMember>,
    #[serde(default)]
    pub declined: Vec<(ProjectId, UserId)>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<GeneratedProject>,
}

#[derive(Debug, Default)]
struct Store {
    users: BTreeMap<UserId, User>,
    tasks: BTreeMap<TaskId, Task>,
    comments: Vec<Comment>,
    projects: BTreeMap<ProjectId, Project>,
    members: Vec<ProjectMember>,
    declined: HashSet<(ProjectId, UserId)>,
    notifications: Vec<Notification>,
    plan: Option<GeneratedProject>,
    next_comment: u64,
}

/// In-process backend acting as `me`.
#[derive(Debug)]
pub struct InMemoryBackend {
    me: User,
    store: RefCell<Store>,
    calls: RefCell<HashMap<String, usize>>,
    failures: RefCell<HashMap<String, ApiError>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(me: User) -> Self {
        let mut store = Store::default();
        store.users.insert(me.user_id.clone(), me.clone());
        Self {
            me,
            store: RefCell::new(store),
            calls: RefCell::new(HashMap::new()),
            failures: RefCell::new(HashMap::new()),
        }
    }

    /// Rebuild a backend from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let backend = Self::new(snapshot.me);
        for user in snapshot.users {
            backend.insert_user(user);
        }
        for task in snapshot.tasks {
            backend.insert_task(task);
        }
        for project in snapshot.projects {
            backend.insert_project(project);
        }
        for member in snapshot.members {
            backend.insert_member(member);
        }
        for notification in snapshot.notifications {
            backend.insert_notification(notification);
        }
        {
            let mut store = backend.store.borrow_mut();
            store.next_comment = snapshot.comments.len() as u64;
            store.comments = snapshot.comments;
            store.declined = snapshot.declined.into_iter().collect();
            store.plan = snapshot.plan;
        }
        backend
    }

    /// Current contents, ordered for stable output.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let store = self.store.borrow();
        let mut declined: Vec<(ProjectId, UserId)> = store.declined.iter().cloned().collect();
        declined.sort();
        Snapshot {
            me: self.me.clone(),
            users: store
                .users
                .values()
                .filter(|u| u.user_id != self.me.user_id)
                .cloned()
                .collect(),
            tasks: store.tasks.values().cloned().collect(),
            comments: store.comments.clone(),
            projects: store.projects.values().cloned().collect(),
            members: store.members.clone(),
            declined,
            notifications: store.notifications.clone(),
            plan: store.plan.clone(),
        }
    }

    #[must_use]
    pub const fn me(&self) -> &User {
        &self.me
    }

    pub fn insert_user(&self, user: User) {
        self.store
            .borrow_mut()
            .users
            .insert(user.user_id.clone(), user);
    }

    pub fn insert_task(&self, task: Task) {
        let mut store = self.store.borrow_mut();
        store
            .users
            .entry(task.owner.user_id.clone())
            .or_insert_with(|| task.owner.clone());
        store.tasks.insert(task.id.clone(), task);
    }

    pub fn insert_comment(&self, comment: Comment) {
        self.store.borrow_mut().comments.push(comment);
    }

    pub fn insert_project(&self, project: Project) {
        self.store
            .borrow_mut()
            .projects
            .insert(project.id.clone(), project);
    }

    pub fn insert_member(&self, member: ProjectMember) {
        let mut store = self.store.borrow_mut();
        if let Some(user) = &member.user {
            store
                .users
                .entry(user.user_id.clone())
                .or_insert_with(|| user.clone());
        }
        store.members.push(member);
    }

    pub fn insert_notification(&self, notification: Notification) {
        self.store.borrow_mut().notifications.push(notification);
    }

    /// Response for the next `generate_project` calls.
    pub fn set_plan(&self, plan: GeneratedProject) {
        self.store.borrow_mut().plan = Some(plan);
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.store.borrow().tasks.get(id).cloned()
    }

    #[must_use]
    pub fn notification(&self, id: &NotificationId) -> Option<Notification> {
        self.store
            .borrow()
            .notifications
            .iter()
            .find(|n| &n.id == id)
            .cloned()
    }

    #[must_use]
    pub fn members(&self, project: &ProjectId) -> Vec<ProjectMember> {
        self.store
            .borrow()
            .members
            .iter()
            .filter(|m| &m.project_id == project)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn has_declined(&self, project: &ProjectId, user: &UserId) -> bool {
        self.store
            .borrow()
            .declined
            .contains(&(project.clone(), user.clone()))
    }

    /// Make the next call of `op` fail with a transport error.
    pub fn fail_next(&self, op: &str) {
        self.fail_next_with(op, ApiError::Transport(format!("injected failure in {op}")));
    }

    pub fn fail_next_with(&self, op: &str, err: ApiError) {
        self.failures.borrow_mut().insert(op.to_string(), err);
    }

    /// How many times `op` was called, failed calls included.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.borrow().get(op).copied().unwrap_or(0)
    }

    fn enter(&self, op: &str) -> ApiResult<()> {
        *self.calls.borrow_mut().entry(op.to_string()).or_insert(0) += 1;
        match self.failures.borrow_mut().remove(op) {
            Some(err) => {
                tracing::debug!(op, error = %err, "injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Find a known user by id, or by email ignoring case.
    fn lookup_user(store: &Store, identifier: &str) -> Option<User> {
        let identifier = identifier.trim();
        store
            .users
            .get(&UserId::from(identifier))
            .or_else(|| {
                store
                    .users
                    .values()
                    .find(|u| u.email.eq_ignore_ascii_case(identifier))
            })
            .cloned()
    }

    fn member_mut<'a>(
        store: &'a mut Store,
        project: &ProjectId,
        user: &UserId,
    ) -> ApiResult<&'a mut ProjectMember> {
        store
            .members
            .iter_mut()
            .find(|m| &m.project_id == project && &m.user_id == user)
            .ok_or_else(|| ApiError::NotFound(format!("member {user} of project {project}")))
    }

    fn resolve_user(store: &Store, id: &UserId) -> User {
        store
            .users
            .get(id)
            .cloned()
            .unwrap_or_else(|| User::new(id.clone(), String::new()))
    }
}

impl Backend for InMemoryBackend {
    fn current_user(&self) -> ApiResult<User> {
        self.enter("current_user")?;
        Ok(self.me.clone())
    }

    fn list_my_tasks(&self) -> ApiResult<Vec<Task>> {
        self.enter("list_my_tasks")?;
        let me = &self.me.user_id;
        Ok(self
            .store
            .borrow()
            .tasks
            .values()
            .filter(|t| t.can_edit(me))
            .cloned()
            .collect())
    }

    fn get_task(&self, task: &TaskId) -> ApiResult<Task> {
        self.enter("get_task")?;
        self.task(task)
            .ok_or_else(|| ApiError::NotFound(format!("task {task}")))
    }

    fn update_task(&self, task: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
        self.enter("update_task")?;
        let mut store = self.store.borrow_mut();
        let entry = store
            .tasks
            .get_mut(task)
            .ok_or_else(|| ApiError::NotFound(format!("task {task}")))?;
        if let Some(status) = update.status {
            entry.status = status;
            entry.is_completed = status == Status::Completed;
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    fn update_task_assignments(&self, task: &TaskId, user_ids: &[UserId]) -> ApiResult<Task> {
        self.enter("update_task_assignments")?;
        let mut store = self.store.borrow_mut();
        let assignments: Vec<User> = user_ids
            .iter()
            .map(|id| Self::resolve_user(&store, id))
            .collect();
        let entry = store
            .tasks
            .get_mut(task)
            .ok_or_else(|| ApiError::NotFound(format!("task {task}")))?;
        entry.assignments = assignments;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    fn list_comments(&self, task: &TaskId) -> ApiResult<Vec<Comment>> {
        self.enter("list_comments")?;
        Ok(self
            .store
            .borrow()
            .comments
            .iter()
            .filter(|c| &c.task_id == task)
            .cloned()
            .collect())
    }

    fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment> {
        self.enter("create_comment")?;
        let mut store = self.store.borrow_mut();
        let id = loop {
            store.next_comment += 1;
            let candidate = CommentId::new(format!("c{}", store.next_comment));
            if !store.comments.iter().any(|c| c.id == candidate) {
                break candidate;
            }
        };
        let created = Comment {
            id,
            task_id: comment.task_id.clone(),
            user_id: self.me.user_id.clone(),
            content: comment.content.clone(),
            parent_comment_id: comment.parent_comment_id.clone(),
            created_at: Utc::now(),
            user: Some(self.me.clone()),
            replies: Vec::new(),
        };
        store.comments.push(created.clone());
        Ok(created)
    }

    fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.enter("list_projects")?;
        let store = self.store.borrow();
        let me = &self.me.user_id;
        Ok(store
            .projects
            .values()
            .filter(|p| {
                &p.owner_id == me
                    || store
                        .members
                        .iter()
                        .any(|m| m.project_id == p.id && &m.user_id == me)
            })
            .cloned()
            .collect())
    }

    fn list_project_members(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.enter("list_project_members")?;
        Ok(self.members(project))
    }

    fn invite_member(&self, invite: &MemberInvite) -> ApiResult<ProjectMember> {
        self.enter("invite_member")?;
        let mut store = self.store.borrow_mut();
        let project = invite.project_id.clone();
        let title = store
            .projects
            .get(&project)
            .map(|p| p.title.clone())
            .ok_or_else(|| ApiError::NotFound(format!("project {project}")))?;
        let user = Self::lookup_user(&store, &invite.user_identifier)
            .ok_or_else(|| ApiError::NotFound(format!("user {}", invite.user_identifier)))?;
        if store
            .members
            .iter()
            .any(|m| m.project_id == project && m.user_id == user.user_id)
        {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("{} is already a member of {title}", user.display_name()),
            });
        }
        store.declined.remove(&(project.clone(), user.user_id.clone()));
        let mut next = store.notifications.len();
        let id = loop {
            next += 1;
            let candidate = NotificationId::new(format!("n{next}"));
            if !store.notifications.iter().any(|n| n.id == candidate) {
                break candidate;
            }
        };
        store.notifications.push(Notification {
            id,
            recipient_user_id: user.user_id.clone(),
            message: format!("You were invited to {title}"),
            kind: NotificationKind::ProjectInvite,
            related_project_id: Some(project.clone()),
            related_task_id: None,
            is_read: false,
            created_at: Utc::now(),
        });
        let mut member = ProjectMember::new(project, user.user_id.clone(), invite.role);
        member.user = Some(user);
        Ok(member)
    }

    fn update_member_role(
        &self,
        project: &ProjectId,
        user: &UserId,
        role: Role,
    ) -> ApiResult<ProjectMember> {
        self.enter("update_member_role")?;
        let mut store = self.store.borrow_mut();
        let member = Self::member_mut(&mut store, project, user)?;
        member.role = role;
        Ok(member.clone())
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.enter("remove_member")?;
        let mut store = self.store.borrow_mut();
        Self::member_mut(&mut store, project, user)?;
        store
            .members
            .retain(|m| !(&m.project_id == project && &m.user_id == user));
        Ok(())
    }

    fn accept_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.enter("accept_invite")?;
        let mut store = self.store.borrow_mut();
        let roster: Vec<ProjectMember> = store
            .members
            .iter()
            .filter(|m| &m.project_id == project)
            .cloned()
            .collect();
        if !is_member(&roster, user) {
            let mut member = ProjectMember::new(project.clone(), user.clone(), Role::Member);
            member.user = Some(Self::resolve_user(&store, user));
            store.members.push(member);
        }
        store.declined.remove(&(project.clone(), user.clone()));
        Ok(())
    }

    fn decline_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.enter("decline_invite")?;
        self.store
            .borrow_mut()
            .declined
            .insert((project.clone(), user.clone()));
        Ok(())
    }

    fn list_notifications(&self, unread_only: bool) -> ApiResult<Vec<Notification>> {
        self.enter("list_notifications")?;
        let me = &self.me.user_id;
        Ok(self
            .store
            .borrow()
            .notifications
            .iter()
            .filter(|n| &n.recipient_user_id == me && !(unread_only && n.is_read))
            .cloned()
            .collect())
    }

    fn mark_notification_read(&self, notification: &NotificationId) -> ApiResult<Notification> {
        self.enter("mark_notification_read")?;
        let mut store = self.store.borrow_mut();
        let entry = store
            .notifications
            .iter_mut()
            .find(|n| &n.id == notification)
            .ok_or_else(|| ApiError::NotFound(format!("notification {notification}")))?;
        entry.is_read = true;
        Ok(entry.clone())
    }

    fn generate_project(&self, prompt: &str) -> ApiResult<GeneratedProject> {
        self.enter("generate_project")?;
        self.store.borrow().plan.clone().ok_or_else(|| ApiError::Rejected {
            status: 503,
            message: format!("co-pilot has no plan for '{prompt}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryBackend;
    use crate::api::{ApiError, Backend};
    use crate::model::{
        MemberInvite, NewComment, NotificationKind, Project, ProjectId, ProjectMember, Role,
        Status, Task, TaskUpdate, User, UserId,
    };

    #[test]
    fn injected_failure_hits_once() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        backend.fail_next("current_user");
        assert!(matches!(backend.current_user(), Err(ApiError::Transport(_))));
        assert!(backend.current_user().is_ok());
        assert_eq!(backend.call_count("current_user"), 2);
    }

    #[test]
    fn comments_get_fresh_ids_and_author() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        let new = NewComment {
            task_id: "t1".into(),
            content: "hello".into(),
            parent_comment_id: None,
        };
        let a = backend.create_comment(&new).unwrap();
        let b = backend.create_comment(&new).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.user_id.as_str(), "u1");
        assert_eq!(backend.list_comments(&"t1".into()).unwrap().len(), 2);
    }

    #[test]
    fn accepting_twice_adds_one_member() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        let project = ProjectId::from("p1");
        let me = UserId::from("u1");
        backend.accept_invite(&project, &me).unwrap();
        backend.accept_invite(&project, &me).unwrap();
        assert_eq!(backend.members(&project).len(), 1);
    }

    #[test]
    fn snapshot_roundtrip_keeps_state() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        backend.insert_user(User::new("u2", "two@example.com"));
        backend
            .decline_invite(&"p9".into(), &"u1".into())
            .unwrap();
        let restored = InMemoryBackend::from_snapshot(backend.snapshot());
        assert_eq!(restored.snapshot(), backend.snapshot());
        assert!(restored.has_declined(&"p9".into(), &"u1".into()));
    }

    #[test]
    fn missing_entities_are_not_found() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        assert!(matches!(
            backend.get_task(&"nope".into()),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            backend.mark_notification_read(&"nope".into()),
            Err(ApiError::NotFound(_))
        ));
    }

    fn project_with_member() -> InMemoryBackend {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        backend.insert_user(User::new("u2", "two@example.com"));
        backend.insert_user(User::new("u3", "Three@Example.com"));
        backend.insert_project(Project {
            id: "p1".into(),
            title: "Apollo".into(),
            description: None,
            owner_id: "u1".into(),
            created_at: chrono::Utc::now(),
            members: Vec::new(),
        });
        backend.insert_member(ProjectMember::new("p1", "u2", Role::Member));
        backend
    }

    #[test]
    fn status_update_tracks_completion() {
        let backend = InMemoryBackend::new(User::new("u1", "one@example.com"));
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "title": "Ship",
            "status": "pending",
            "owner": {"user_id": "u1", "email": "one@example.com"},
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        backend.insert_task(task);

        let done = backend
            .update_task(&"t1".into(), &TaskUpdate::status(Status::Completed))
            .unwrap();
        assert!(done.is_completed);
        let reopened = backend
            .update_task(&"t1".into(), &TaskUpdate::status(Status::InProgress))
            .unwrap();
        assert!(!reopened.is_completed);
        assert!(matches!(
            backend.update_task(&"t9".into(), &TaskUpdate::default()),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn invite_by_email_notifies_without_joining() {
        let backend = project_with_member();
        let invite = MemberInvite {
            project_id: "p1".into(),
            user_identifier: " three@example.com ".into(),
            role: Role::Owner,
        };
        let pending = backend.invite_member(&invite).unwrap();
        assert_eq!(pending.user_id.as_str(), "u3");
        assert_eq!(pending.role, Role::Owner);
        assert_eq!(backend.members(&"p1".into()).len(), 1);

        let sent = backend.snapshot().notifications;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_user_id.as_str(), "u3");
        assert_eq!(sent[0].kind, NotificationKind::ProjectInvite);
        assert_eq!(sent[0].related_project_id, Some(ProjectId::from("p1")));
    }

    #[test]
    fn invite_rejects_members_and_strangers() {
        let backend = project_with_member();
        let invite = |who: &str| MemberInvite {
            project_id: "p1".into(),
            user_identifier: who.into(),
            role: Role::Member,
        };
        assert!(matches!(
            backend.invite_member(&invite("u2")),
            Err(ApiError::Rejected { status: 409, .. })
        ));
        assert!(matches!(
            backend.invite_member(&invite("nobody@example.com")),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn role_change_and_removal_need_a_membership() {
        let backend = project_with_member();
        let project = ProjectId::from("p1");
        let updated = backend
            .update_member_role(&project, &"u2".into(), Role::Owner)
            .unwrap();
        assert_eq!(updated.role, Role::Owner);

        backend.remove_member(&project, &"u2".into()).unwrap();
        assert!(backend.members(&project).is_empty());
        assert!(matches!(
            backend.remove_member(&project, &UserId::from("u2")),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            backend.update_member_role(&project, &"u2".into(), Role::Member),
            Err(ApiError::NotFound(_))
        ));
    }
}
