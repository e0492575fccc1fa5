//! Blocking HTTP+JSON implementation of [`Backend`].

use devtask_core::api::{ApiError, ApiResult, Backend};
use devtask_core::auth::AuthContext;
use devtask_core::copilot::GeneratedProject;
use devtask_core::model::{
    Comment, MemberInvite, NewComment, Notification, NotificationId, Project, ProjectId,
    ProjectMember, Role, Task, TaskId, TaskUpdate, User, UserId,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

const USER_AGENT: &str = concat!("devtask-cli/", env!("CARGO_PKG_VERSION"));

/// REST client for the devtask backend.
#[derive(Debug)]
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    bearer: Option<String>,
}

impl HttpBackend {
    /// An unauthenticated client. Only [`Self::login`] works without a token.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: &AuthContext) -> Self {
        self.bearer = Some(auth.bearer());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] for bad credentials, or any transport or
    /// decode failure.
    pub fn login(&self, email: &str, password: &str) -> ApiResult<AuthContext> {
        self.fetch(
            "POST",
            "/auth/login",
            Some(json!({ "email": email, "password": password })),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn execute(&self, method: &str, path: &str, body: Option<Value>) -> ApiResult<ureq::Response> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "request");
        let mut request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        if let Some(bearer) = &self.bearer {
            request = request.set("Authorization", bearer);
        }
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        result.map_err(|err| map_error(path, err))
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        self.execute(method, path, body)?
            .into_json::<T>()
            .map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }

    fn send(&self, method: &str, path: &str, body: Option<Value>) -> ApiResult<()> {
        self.execute(method, path, body).map(drop)
    }
}

/// Turn a ureq failure into the client's error taxonomy.
fn map_error(path: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| format!("{path}: HTTP {status}"));
            match status {
                401 | 403 => ApiError::Unauthorized(message),
                404 => ApiError::NotFound(path.to_string()),
                _ => ApiError::Rejected { status, message },
            }
        }
        ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
    }
}

/// Pull a readable message out of an error body (`detail`, then `message`,
/// then the raw text).
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for key in ["detail", "message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return Some(text.to_string());
            }
        }
    }
    Some(trimmed.to_string())
}

impl Backend for HttpBackend {
    fn current_user(&self) -> ApiResult<User> {
        self.fetch("GET", "/auth/me", None)
    }

    fn list_my_tasks(&self) -> ApiResult<Vec<Task>> {
        self.fetch("GET", "/tasks/my-tasks", None)
    }

    fn get_task(&self, task: &TaskId) -> ApiResult<Task> {
        self.fetch("GET", &format!("/tasks/{task}"), None)
    }

    fn update_task(&self, task: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.fetch("PUT", &format!("/tasks/{task}"), Some(body))
    }

    fn update_task_assignments(&self, task: &TaskId, user_ids: &[UserId]) -> ApiResult<Task> {
        self.fetch(
            "PUT",
            &format!("/tasks/{task}/assignments"),
            Some(json!({ "user_ids": user_ids })),
        )
    }

    fn list_comments(&self, task: &TaskId) -> ApiResult<Vec<Comment>> {
        self.fetch("GET", &format!("/comments/{task}/"), None)
    }

    fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment> {
        let body = serde_json::to_value(comment).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.fetch("POST", "/comments", Some(body))
    }

    fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.fetch("GET", "/project/my-projects", None)
    }

    fn list_project_members(&self, project: &ProjectId) -> ApiResult<Vec<ProjectMember>> {
        self.fetch("GET", &format!("/project-members/{project}/members"), None)
    }

    fn invite_member(&self, invite: &MemberInvite) -> ApiResult<ProjectMember> {
        let body = serde_json::to_value(invite).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.fetch("POST", "/project-members/invite", Some(body))
    }

    fn update_member_role(
        &self,
        project: &ProjectId,
        user: &UserId,
        role: Role,
    ) -> ApiResult<ProjectMember> {
        self.fetch(
            "PATCH",
            "/project-members/role",
            Some(json!({ "project_id": project, "user_id": user, "new_role": role })),
        )
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.send(
            "DELETE",
            "/project-members/remove",
            Some(json!({ "project_id": project, "user_id": user })),
        )
    }

    fn accept_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.send(
            "POST",
            "/project-members/accept",
            Some(json!({ "project_id": project, "user_id": user })),
        )
    }

    fn decline_invite(&self, project: &ProjectId, user: &UserId) -> ApiResult<()> {
        self.send(
            "POST",
            "/project-members/decline",
            Some(json!({ "project_id": project, "user_id": user })),
        )
    }

    fn list_notifications(&self, unread_only: bool) -> ApiResult<Vec<Notification>> {
        let path = if unread_only {
            "/notifications?unread=true"
        } else {
            "/notifications"
        };
        self.fetch("GET", path, None)
    }

    fn mark_notification_read(&self, notification: &NotificationId) -> ApiResult<Notification> {
        self.fetch("PATCH", &format!("/notifications/{notification}/read"), None)
    }

    fn generate_project(&self, prompt: &str) -> ApiResult<GeneratedProject> {
        self.fetch(
            "POST",
            "/copilot/generate",
            Some(json!({ "prompt": prompt })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpBackend, error_message};
    use devtask_core::api::{ApiError, Backend};
    use devtask_core::auth::AuthContext;
    use devtask_core::model::{MemberInvite, Role, Status, TaskId, TaskUpdate, User};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Serve one canned response and hand back the request head and body.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read");
                if line.is_empty() || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            let length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            let mut request_body = vec![0; length];
            reader.read_exact(&mut request_body).expect("body");
            head.push_str("\r\n");
            head.push_str(&String::from_utf8_lossy(&request_body));
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            head
        });
        (format!("http://{addr}"), handle)
    }

    fn client(base: &str) -> HttpBackend {
        let auth = AuthContext::new("tok-123", User::new("u1", "ada@example.com"));
        HttpBackend::new(base, Duration::from_secs(5)).with_auth(&auth)
    }

    #[test]
    fn get_task_sends_bearer_and_decodes() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"id":"t1","title":"Ship","status":"in_progress","priority":"high",
               "owner":{"user_id":"u1","email":"ada@example.com"},
               "created_at":"2024-05-01T10:00:00","updated_at":"2024-05-01T10:00:00"}"#,
        );
        let task = client(&base).get_task(&TaskId::from("t1")).expect("task");
        assert_eq!(task.title, "Ship");

        let head = server.join().expect("server");
        assert!(head.starts_with("GET /tasks/t1 "));
        assert!(head.contains("Bearer tok-123"));
    }

    #[test]
    fn status_update_puts_a_partial_body() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"id":"t1","title":"Ship","status":"completed",
               "owner":{"user_id":"u1","email":"ada@example.com"},
               "created_at":"2024-05-01T10:00:00","updated_at":"2024-05-01T10:00:00"}"#,
        );
        let task = client(&base)
            .update_task(&TaskId::from("t1"), &TaskUpdate::status(Status::Completed))
            .expect("task");
        assert_eq!(task.status, Status::Completed);

        let request = server.join().expect("server");
        assert!(request.starts_with("PUT /tasks/t1 "));
        assert!(request.ends_with(r#"{"status":"completed"}"#));
    }

    #[test]
    fn invite_posts_identifier_and_role() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"user_id":"u3","project_id":"p1","role":"member"}"#,
        );
        let invite = MemberInvite {
            project_id: "p1".into(),
            user_identifier: "cy@example.com".into(),
            role: Role::Member,
        };
        let pending = client(&base).invite_member(&invite).expect("member");
        assert_eq!(pending.user_id.as_str(), "u3");

        let request = server.join().expect("server");
        assert!(request.starts_with("POST /project-members/invite "));
        assert!(request.contains(r#""user_identifier":"cy@example.com""#));
    }

    #[test]
    fn role_change_and_removal_hit_member_endpoints() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"user_id":"u2","project_id":"p1","role":"owner"}"#,
        );
        let updated = client(&base)
            .update_member_role(&"p1".into(), &"u2".into(), Role::Owner)
            .expect("member");
        assert_eq!(updated.role, Role::Owner);
        let request = server.join().expect("server");
        assert!(request.starts_with("PATCH /project-members/role "));
        assert!(request.contains(r#""new_role":"owner""#));

        let (base, server) = serve_once("204 No Content", "");
        client(&base)
            .remove_member(&"p1".into(), &"u2".into())
            .expect("removed");
        let request = server.join().expect("server");
        assert!(request.starts_with("DELETE /project-members/remove "));
        assert!(request.contains(r#""user_id":"u2""#));
    }

    #[test]
    fn unauthorized_maps_to_unauthorized() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"detail":"Token expired"}"#);
        let err = client(&base).current_user().expect_err("401");
        assert_eq!(err, ApiError::Unauthorized("Token expired".into()));
        server.join().expect("server");
    }

    #[test]
    fn not_found_and_server_errors() {
        let (base, server) = serve_once("404 Not Found", "");
        let err = client(&base).get_task(&TaskId::from("zz")).expect_err("404");
        assert!(matches!(err, ApiError::NotFound(_)));
        server.join().expect("server");

        let (base, server) = serve_once("500 Internal Server Error", r#"{"message":"db down"}"#);
        let err = client(&base).list_my_tasks().expect_err("500");
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 500,
                message: "db down".into()
            }
        );
        assert!(err.is_retryable());
        server.join().expect("server");
    }

    #[test]
    fn connection_refused_is_transport() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr")
        };
        let err = client(&format!("http://{addr}"))
            .list_projects()
            .expect_err("closed port");
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message("plain").as_deref(), Some("plain"));
        assert_eq!(error_message("  "), None);
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let backend = HttpBackend::new("http://x/", Duration::from_secs(1));
        assert_eq!(backend.base_url(), "http://x");
    }
}
