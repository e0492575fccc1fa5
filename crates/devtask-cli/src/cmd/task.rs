//! `dt tasks`, `dt task show` and `dt task status`.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::display::{self, Badge, DueUrgency};
use devtask_core::edit::{StatusChange, change_status};
use devtask_core::error::DevtaskError;
use devtask_core::model::{Status, Task, TaskId, User};
use devtask_core::thread::{count_all, organize_comments};
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{
    OutputMode, Renderable, pretty_kv, pretty_rule, pretty_section, render_list, render_mode,
    truncate,
};

#[derive(Args, Debug)]
pub struct TasksArgs {
    /// Only show tasks with this status.
    #[arg(long)]
    pub status: Option<Status>,

    /// Only show tasks in this project.
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(
        about = "Show one task with badges, assignees and comment count",
        after_help = "EXAMPLES:\n    dt task show 3f2a\n    dt task show 3f2a --json"
    )]
    Show(TaskShowArgs),

    #[command(
        about = "Move a task to another status",
        long_about = "Move a task to another status. Only the task's owner or an assignee may do this; setting the current status again sends nothing.",
        after_help = "EXAMPLES:\n    dt task status 3f2a in_progress\n    dt task status 3f2a on-hold\n    dt task status 3f2a completed --json"
    )]
    Status(TaskStatusArgs),
}

#[derive(Args, Debug)]
pub struct TaskShowArgs {
    /// Task ID.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TaskStatusArgs {
    /// Task ID.
    pub id: String,

    /// New status: not_started, pending, in_progress, on_hold, completed or cancelled.
    pub status: Status,
}

/// One row of `dt tasks`.
#[derive(Debug, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub status: Badge,
    pub priority: Badge,
    pub progress: u8,
    pub due: DueUrgency,
    pub due_text: String,
}

impl TaskRow {
    pub fn from_task(task: &Task, today: NaiveDate) -> Self {
        let due = DueUrgency::of(task.due_date, today);
        Self {
            id: task.id.to_string(),
            title: task.title.clone(),
            status: display::status_config(task.status),
            priority: display::priority_config(task.priority),
            progress: display::progress_from_status(task.status),
            due,
            due_text: due.text(),
        }
    }
}

impl Renderable for TaskRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{} {:<40} {} {:<11} {:>3}%  {} {}",
            self.status.icon,
            truncate(&self.title, 40),
            self.priority.icon,
            self.priority.label,
            self.progress,
            self.due.icon(),
            self.due_text
        )?;
        writeln!(w, "   {}", self.id)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {}  {}",
            self.id,
            self.status.label,
            self.priority.label,
            self.progress,
            self.due_text,
            self.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "status", "priority", "progress", "due", "title"]
    }
}

fn filter_tasks<'a>(tasks: &'a [Task], args: &TasksArgs) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| args.status.is_none_or(|s| t.status == s))
        .filter(|t| {
            args.project
                .as_deref()
                .is_none_or(|p| t.project_id.as_ref().is_some_and(|id| id.as_str() == p))
        })
        .collect()
}

pub fn run_tasks(args: &TasksArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let mut tasks = client
        .backend
        .list_my_tasks()
        .map_err(|e| client.fail(DevtaskError::from(e)))?;
    tasks.sort_by(|a, b| {
        a.due_date
            .is_none()
            .cmp(&b.due_date.is_none())
            .then_with(|| a.due_date.cmp(&b.due_date))
            .then_with(|| a.title.cmp(&b.title))
    });

    let today = Utc::now().date_naive();
    let rows: Vec<TaskRow> = filter_tasks(&tasks, args)
        .into_iter()
        .map(|t| TaskRow::from_task(t, today))
        .collect();
    render_list(&rows, output, "No tasks.")?;
    client.finish()
}

#[derive(Debug, Serialize)]
struct TaskDetail<'a> {
    task: &'a Task,
    status: Badge,
    priority: Badge,
    progress: u8,
    due: DueUrgency,
    comment_count: usize,
}

fn user_list(users: &[User]) -> String {
    if users.is_empty() {
        return "-".to_string();
    }
    users
        .iter()
        .map(User::display_name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run_task(args: &TaskArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    match &args.command {
        TaskCommand::Show(show) => run_show(show, config, output),
        TaskCommand::Status(status) => run_status(status, config, output),
    }
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    ok: bool,
    id: String,
    previous: Status,
    status: Status,
    progress: u8,
    changed: bool,
}

impl StatusOutput {
    fn new(change: &StatusChange) -> Self {
        Self {
            ok: true,
            id: change.task.id.to_string(),
            previous: change.previous,
            status: change.task.status,
            progress: display::progress_from_status(change.task.status),
            changed: change.changed,
        }
    }
}

fn status_line(out: &StatusOutput) -> String {
    if out.changed {
        format!(
            "✓ Task {}: {} → {} ({}%)",
            out.id, out.previous, out.status, out.progress
        )
    } else {
        format!("Task {} is already {}", out.id, out.status)
    }
}

fn run_status(args: &TaskStatusArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let task = client
        .backend
        .get_task(&TaskId::from(args.id.as_str()))
        .map_err(|e| client.fail(DevtaskError::from(e)))?;
    let change = change_status(&client.backend, task, client.auth.user_id(), args.status)
        .map_err(|e| client.fail(e))?;

    let result = StatusOutput::new(&change);
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}  {}  {}", r.id, r.status, r.progress),
        |r, w| writeln!(w, "{}", status_line(r)),
    )?;
    client.finish()
}

fn run_show(show: &TaskShowArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let id = TaskId::from(show.id.as_str());
    let task = client
        .backend
        .get_task(&id)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;
    let comments = client
        .backend
        .list_comments(&id)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let detail = TaskDetail {
        task: &task,
        status: display::status_config(task.status),
        priority: display::priority_config(task.priority),
        progress: display::progress_from_status(task.status),
        due: DueUrgency::of(task.due_date, Utc::now().date_naive()),
        comment_count: count_all(&organize_comments(&comments)),
    };

    render_mode(
        output,
        &detail,
        |d, w| {
            writeln!(
                w,
                "{}  {}  {}  {}%  {}  {}",
                d.task.id,
                d.task.status,
                d.task.priority,
                d.progress,
                d.due.text(),
                d.task.title
            )
        },
        |d, w| {
            pretty_section(w, &format!("{} {}", d.status.icon, d.task.title))?;
            pretty_kv(w, "ID", d.task.id.as_str())?;
            pretty_kv(w, "Status", format!("{} ({}%)", d.status.label, d.progress))?;
            pretty_kv(w, "Priority", format!("{} {}", d.priority.icon, d.priority.label))?;
            pretty_kv(w, "Due", format!("{} {}", d.due.icon(), d.due.text()))?;
            pretty_kv(w, "Owner", d.task.owner.display_name())?;
            pretty_kv(w, "Assignees", user_list(&d.task.assignments))?;
            pretty_kv(
                w,
                "Project",
                d.task.project_id.as_ref().map_or("-", |p| p.as_str()),
            )?;
            pretty_kv(
                w,
                "Time",
                format!("{}h of {}h", d.task.actual_time, d.task.estimated_time),
            )?;
            pretty_kv(w, "Comments", d.comment_count.to_string())?;
            if !d.task.description.trim().is_empty() {
                pretty_rule(w)?;
                writeln!(w, "{}", d.task.description.trim())?;
            }
            Ok(())
        },
    )?;
    client.finish()
}
