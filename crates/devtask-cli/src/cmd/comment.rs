//! `dt comments` and `dt comment add` - read and extend a task's thread.

use anyhow::Result;
use clap::{Args, Subcommand};
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::error::DevtaskError;
use devtask_core::model::{Comment, CommentId, TaskId};
use devtask_core::thread::{ThreadRow, ThreadViewState, count_all, find, organize_comments};
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{CliError, OutputMode, pretty_section, render, render_error, render_mode};

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Task ID.
    pub task: String,

    /// Hide the replies under this comment (repeatable).
    #[arg(long, value_name = "COMMENT")]
    pub collapse: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentCommand,
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    #[command(
        about = "Add a comment to a task",
        after_help = "EXAMPLES:\n    # Top-level comment\n    dt comment add 3f2a \"Investigating timeout path\"\n\n    # Reply without the @mention prefix\n    dt comment add 3f2a \"+1\" --reply-to c12 --no-mention"
    )]
    Add(CommentAddArgs),
}

#[derive(Args, Debug)]
pub struct CommentAddArgs {
    /// Task ID.
    pub task: String,

    /// Comment body.
    pub body: String,

    /// Reply to this comment instead of starting a new top-level comment.
    #[arg(long, value_name = "COMMENT")]
    pub reply_to: Option<String>,

    /// Do not start a reply with `@<author>`.
    #[arg(long, requires = "reply_to")]
    pub no_mention: bool,
}

#[derive(Debug, Serialize)]
struct ThreadOutput<'a> {
    task_id: &'a TaskId,
    total: usize,
    comments: &'a [Comment],
}

/// Pretty thread rendering: indentation by depth, `▾`/`▸` on comments with
/// replies.
fn write_thread(w: &mut dyn Write, rows: &[ThreadRow<'_>]) -> io::Result<()> {
    for row in rows {
        let indent = "  ".repeat(row.depth);
        let marker = match (row.reply_count > 0, row.collapsed) {
            (false, _) => "•",
            (true, false) => "▾",
            (true, true) => "▸",
        };
        writeln!(
            w,
            "{indent}{marker} {} · {}  [{}]",
            row.comment.author_name(),
            row.comment.created_at.format("%Y-%m-%d %H:%M"),
            row.comment.id
        )?;
        for line in row.comment.content.lines() {
            writeln!(w, "{indent}  {line}")?;
        }
        if row.collapsed {
            writeln!(w, "{indent}  … {} hidden", replies_label(row.reply_count))?;
        }
    }
    Ok(())
}

fn replies_label(n: usize) -> String {
    if n == 1 {
        "1 reply".to_string()
    } else {
        format!("{n} replies")
    }
}

fn write_thread_text(w: &mut dyn Write, rows: &[ThreadRow<'_>]) -> io::Result<()> {
    writeln!(w, "depth  id  parent  author  created_at  content")?;
    for row in rows {
        let c = row.comment;
        writeln!(
            w,
            "{}  {}  {}  {}  {}  {}",
            row.depth,
            c.id,
            c.parent_comment_id.as_ref().map_or("-", CommentId::as_str),
            c.user_id,
            c.created_at.to_rfc3339(),
            c.content.replace('\n', "\\n")
        )?;
    }
    Ok(())
}

pub fn run_comments(args: &CommentsArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let task_id = TaskId::from(args.task.as_str());
    let flat = client
        .backend
        .list_comments(&task_id)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;
    let roots = organize_comments(&flat);

    let mut state = ThreadViewState::new(task_id.clone());
    for id in &args.collapse {
        state.collapse(&CommentId::from(id.as_str()));
    }
    state.prune(&roots);
    let rows = state.visible_rows(&roots);

    let result = ThreadOutput {
        task_id: &task_id,
        total: count_all(&roots),
        comments: &roots,
    };
    render_mode(
        output,
        &result,
        |_, w| write_thread_text(w, &rows),
        |r, w| {
            pretty_section(w, &format!("Comments on {} ({})", r.task_id, r.total))?;
            if rows.is_empty() {
                writeln!(w, "No comments yet.")?;
            }
            write_thread(w, &rows)
        },
    )?;
    client.finish()
}

#[derive(Debug, Serialize)]
struct CommentAddOutput<'a> {
    ok: bool,
    comment: &'a Comment,
    thread_size: usize,
}

pub fn run_comment(args: &CommentArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    match &args.command {
        CommentCommand::Add(add) => run_comment_add(add, config, output),
    }
}

fn run_comment_add(args: &CommentAddArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let task_id = TaskId::from(args.task.as_str());
    let mut state =
        ThreadViewState::new(task_id.clone()).with_max_chars(client.config.max_comment_chars);

    let draft = match &args.reply_to {
        Some(parent) => {
            let flat = client
                .backend
                .list_comments(&task_id)
                .map_err(|e| client.fail(DevtaskError::from(e)))?;
            let roots = organize_comments(&flat);
            let Some(target) = find(&roots, &CommentId::from(parent.as_str())) else {
                let msg = format!("comment '{parent}' not found on task {task_id}");
                render_error(
                    output,
                    &CliError::with_details(
                        &msg,
                        format!("List comment IDs with `dt comments {task_id}`"),
                        "comment_not_found",
                    ),
                )?;
                anyhow::bail!("{msg}");
            };
            state.initiate_reply(target);
            if args.no_mention {
                state.reply_draft_mut().clear();
            }
            state.reply_draft_mut().push_str(&args.body);
            state.submit_reply()
        }
        None => {
            state.root_draft_mut().push_str(&args.body);
            state.submit_root()
        }
    };
    let new_comment = draft.map_err(|e| client.fail(e.into()))?;

    let created = client.backend.create_comment(&new_comment);
    state.complete_submit(created.is_ok());
    let created = created.map_err(|e| client.fail(DevtaskError::from(e)))?;
    tracing::debug!(comment = %created.id, task = %task_id, "comment created");

    // The cache dropped this task's comments, so this is a fresh read.
    let thread_size = client
        .backend
        .list_comments(&task_id)
        .map(|flat| count_all(&organize_comments(&flat)))
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let result = CommentAddOutput {
        ok: true,
        comment: &created,
        thread_size,
    };
    render(output, &result, |r, w| {
        let kind = if r.comment.is_reply() { "Reply" } else { "Comment" };
        writeln!(
            w,
            "✓ {kind} {} added to {} ({} in thread)",
            r.comment.id, r.comment.task_id, r.thread_size
        )
    })?;
    client.finish()
}
