//! `dt assign` - show or replace the assignees of a task.

use anyhow::Result;
use clap::Args;
use devtask_core::api::Backend;
use devtask_core::assignment::{AssignmentEditor, AssignmentUpdate, assignable};
use devtask_core::config::EffectiveConfig;
use devtask_core::error::DevtaskError;
use devtask_core::model::{ProjectMember, TaskId, User, UserId};
use serde::Serialize;

use crate::client::Client;
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_section, render, render_error, render_mode,
};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Task ID.
    pub task: String,

    /// Replace the selection with exactly these user IDs.
    pub users: Vec<String>,

    /// Add a user to the selection (repeatable).
    #[arg(long, value_name = "USER")]
    pub add: Vec<String>,

    /// Remove a user from the selection (repeatable).
    #[arg(long, value_name = "USER")]
    pub remove: Vec<String>,

    /// Print the request that would be sent without sending it.
    #[arg(long)]
    pub dry_run: bool,
}

impl AssignArgs {
    fn has_changes(&self) -> bool {
        !self.users.is_empty() || !self.add.is_empty() || !self.remove.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct Candidate {
    user_id: String,
    name: String,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct AssignView {
    task_id: String,
    title: String,
    owner: String,
    assignees: Vec<String>,
    assignable: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
struct AssignOutput {
    ok: bool,
    task_id: String,
    dry_run: bool,
    changed: bool,
    update: AssignmentUpdate,
}

fn candidates(editor: &AssignmentEditor, members: &[ProjectMember]) -> Vec<Candidate> {
    assignable(editor.task(), members)
        .into_iter()
        .map(|m| Candidate {
            user_id: m.user_id.to_string(),
            name: m.display_name().to_string(),
            selected: editor.is_selected(&m.user_id),
        })
        .collect()
}

/// Apply the command-line edits to an editor.
fn apply_edits(editor: &mut AssignmentEditor, args: &AssignArgs) {
    if !args.users.is_empty() {
        let ids: Vec<UserId> = args.users.iter().map(|u| UserId::from(u.as_str())).collect();
        editor.set(&ids);
    }
    for user in &args.add {
        editor.add(&UserId::from(user.as_str()));
    }
    for user in &args.remove {
        editor.remove(&UserId::from(user.as_str()));
    }
}

/// Users named on the command line that are neither the owner nor an
/// assignable member of the project.
fn unknown_users(editor: &AssignmentEditor, members: &[ProjectMember], args: &AssignArgs) -> Vec<String> {
    let task = editor.task();
    let allowed = assignable(task, members);
    args.users
        .iter()
        .chain(&args.add)
        .filter(|raw| {
            let id = UserId::from(raw.as_str());
            !task.is_owner(&id) && !allowed.iter().any(|m| m.user_id == id)
        })
        .cloned()
        .collect()
}

pub fn run_assign(args: &AssignArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let task_id = TaskId::from(args.task.as_str());
    let task = client
        .backend
        .get_task(&task_id)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;
    let members = match &task.project_id {
        Some(project) => client
            .backend
            .list_project_members(project)
            .map_err(|e| client.fail(DevtaskError::from(e)))?,
        None => Vec::new(),
    };
    let mut editor = AssignmentEditor::open(task);

    if !args.has_changes() {
        let task = editor.task();
        let view = AssignView {
            task_id: task.id.to_string(),
            title: task.title.clone(),
            owner: task.owner.display_name().to_string(),
            assignees: task.assignments.iter().map(|u| u.user_id.to_string()).collect(),
            assignable: candidates(&editor, &members),
        };
        render_mode(
            output,
            &view,
            |v, w| {
                for c in &v.assignable {
                    writeln!(w, "{}  {}  {}", if c.selected { "x" } else { "-" }, c.user_id, c.name)?;
                }
                Ok(())
            },
            |v, w| {
                pretty_section(w, &format!("Assignees of {}", v.title))?;
                pretty_kv(w, "Owner", &v.owner)?;
                if v.assignable.is_empty() {
                    writeln!(w, "No assignable members.")?;
                }
                for c in &v.assignable {
                    let mark = if c.selected { "[x]" } else { "[ ]" };
                    writeln!(w, "{mark} {:<24} {}", c.name, c.user_id)?;
                }
                Ok(())
            },
        )?;
        return client.finish();
    }

    apply_edits(&mut editor, args);

    let unknown = unknown_users(&editor, &members, args);
    if !unknown.is_empty() {
        let msg = format!("not assignable on this task: {}", unknown.join(", "));
        render_error(
            output,
            &CliError::with_details(
                &msg,
                format!("Run `dt assign {}` to list project members", args.task),
                "not_assignable",
            ),
        )?;
        anyhow::bail!("{msg}");
    }

    let changed = editor.is_dirty();
    let update = editor.pending_update();
    if args.dry_run || !changed {
        let result = AssignOutput {
            ok: true,
            task_id: args.task.clone(),
            dry_run: args.dry_run,
            changed,
            update,
        };
        render(output, &result, |r, w| {
            let ids: Vec<&str> = r.update.user_ids.iter().map(UserId::as_str).collect();
            if r.changed {
                writeln!(w, "would send user_ids: [{}]", ids.join(", "))
            } else {
                writeln!(w, "assignees unchanged: [{}]", ids.join(", "))
            }
        })?;
        return client.finish();
    }

    let saved = editor
        .submit(&client.backend)
        .map_err(|e| client.fail(e))?
        .clone();

    let result = AssignOutput {
        ok: true,
        task_id: saved.id.to_string(),
        dry_run: false,
        changed: true,
        update,
    };
    render(output, &result, |_, w| {
        let names: Vec<&str> = saved.assignments.iter().map(User::display_name).collect();
        writeln!(
            w,
            "✓ {} assigned to: {}",
            saved.title,
            if names.is_empty() { "nobody".to_string() } else { names.join(", ") }
        )
    })?;
    client.finish()
}

#[cfg(test)]
mod tests {
    use super::{AssignArgs, apply_edits, unknown_users};
    use chrono::Utc;
    use devtask_core::assignment::AssignmentEditor;
    use devtask_core::model::{Priority, ProjectMember, Role, Status, Task, User, UserId};

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Write docs".into(),
            description: String::new(),
            status: Status::Pending,
            priority: Priority::Medium,
            owner: User::new("u1", "owner@example.com"),
            user_id: None,
            assignments: vec![
                User::new("u2", "two@example.com"),
                User::new("u3", "three@example.com"),
            ],
            project_id: Some("p1".into()),
            estimated_time: 0.0,
            actual_time: 0.0,
            due_date: None,
            is_completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn args(users: &[&str], add: &[&str], remove: &[&str]) -> AssignArgs {
        AssignArgs {
            task: "t1".into(),
            users: users.iter().map(ToString::to_string).collect(),
            add: add.iter().map(ToString::to_string).collect(),
            remove: remove.iter().map(ToString::to_string).collect(),
            dry_run: true,
        }
    }

    #[test]
    fn uncheck_and_select_owner_sends_remaining() {
        let mut editor = AssignmentEditor::open(task());
        apply_edits(&mut editor, &args(&[], &["u1"], &["u3"]));
        assert_eq!(editor.pending_update().user_ids, vec![UserId::from("u2")]);
    }

    #[test]
    fn positional_users_replace_selection() {
        let mut editor = AssignmentEditor::open(task());
        apply_edits(&mut editor, &args(&["u4"], &[], &[]));
        assert_eq!(editor.pending_update().user_ids, vec![UserId::from("u4")]);
        assert!(editor.is_dirty());
    }

    #[test]
    fn non_members_are_reported() {
        let members = vec![
            ProjectMember::new("p1", "u1", Role::Owner),
            ProjectMember::new("p1", "u2", Role::Member),
        ];
        let editor = AssignmentEditor::open(task());
        let request = args(&["u1", "u2", "u9"], &["u8"], &["u3"]);
        assert_eq!(
            unknown_users(&editor, &members, &request),
            vec!["u9".to_string(), "u8".to_string()]
        );
    }
}
