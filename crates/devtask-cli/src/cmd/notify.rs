//! `dt notifications` and `dt notification open|read-all`.

use anyhow::Result;
use clap::{Args, Subcommand};
use devtask_core::config::EffectiveConfig;
use devtask_core::invite::{DialogView, InviteDialog};
use devtask_core::model::{Notification, NotificationId};
use devtask_core::notify::{NotificationFeed, NotificationTarget, target};
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{
    CliError, OutputMode, Renderable, pretty_kv, pretty_section, render_error, render_list,
    render_mode, render_success, truncate,
};

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    /// Only unread notifications.
    #[arg(long)]
    pub unread: bool,
}

#[derive(Args, Debug)]
pub struct NotificationArgs {
    #[command(subcommand)]
    pub command: NotificationCommand,
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
    #[command(
        about = "Open a notification and mark it read",
        after_help = "EXAMPLES:\n    dt notification open n7"
    )]
    Open(NotificationOpenArgs),

    #[command(
        about = "Mark every unread notification read",
        after_help = "EXAMPLES:\n    dt notification read-all"
    )]
    ReadAll,
}

#[derive(Args, Debug)]
pub struct NotificationOpenArgs {
    /// Notification ID.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct NotificationRow {
    id: String,
    kind: &'static str,
    is_read: bool,
    created_at: String,
    message: String,
    target: NotificationTarget,
}

impl NotificationRow {
    fn new(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind.as_str(),
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
            message: n.message.clone(),
            target: target(n),
        }
    }
}

fn target_label(target: &NotificationTarget) -> String {
    match target {
        NotificationTarget::Task(id) => format!("task {id}"),
        NotificationTarget::Project(id) => format!("project {id}"),
        NotificationTarget::None => "-".to_string(),
    }
}

impl Renderable for NotificationRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let dot = if self.is_read { " " } else { "●" };
        writeln!(w, "{dot} {:<16} {}", self.kind, truncate(&self.message, 56))?;
        writeln!(w, "  {:<16} {}", self.id, target_label(&self.target))
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            self.id,
            self.kind,
            if self.is_read { "read" } else { "unread" },
            self.created_at,
            self.message.replace('\n', " ")
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "type", "state", "created_at", "message"]
    }
}

pub fn run_notifications(
    args: &NotificationsArgs,
    config: EffectiveConfig,
    output: OutputMode,
) -> Result<()> {
    let client = Client::open(config, output)?;
    let feed =
        NotificationFeed::load(&client.backend, args.unread).map_err(|e| client.fail(e))?;
    let rows: Vec<NotificationRow> = feed.items().iter().map(NotificationRow::new).collect();
    if output.is_pretty() && !rows.is_empty() {
        println!("{} unread", feed.unread_count());
    }
    render_list(&rows, output, "No notifications.")?;
    client.finish()
}

/// Fetch one of the user's notifications by id.
pub(crate) fn find_notification(client: &Client, id: &str) -> Result<Notification> {
    let feed = NotificationFeed::load(&client.backend, false).map_err(|e| client.fail(e))?;
    if let Some(found) = feed.get(&NotificationId::from(id)) {
        return Ok(found.clone());
    }
    let msg = format!("notification '{id}' not found");
    render_error(
        client.output,
        &CliError::with_details(
            &msg,
            "List notification IDs with `dt notifications`",
            "notification_not_found",
        ),
    )?;
    anyhow::bail!("{msg}")
}

#[derive(Debug, Serialize)]
struct OpenOutput {
    notification: Notification,
    target: NotificationTarget,
    view: DialogView,
    can_decide: bool,
}

fn view_hint(out: &OpenOutput) -> Option<String> {
    let id = &out.notification.id;
    match out.view {
        DialogView::Undecided if out.can_decide => Some(format!(
            "Run `dt invite accept {id}` or `dt invite decline {id}`."
        )),
        DialogView::AlreadyJoined => Some("You are a member of this project.".to_string()),
        DialogView::Declined => Some("You declined this invite.".to_string()),
        DialogView::Undecided | DialogView::Info => None,
    }
}

fn run_open(args: &NotificationOpenArgs, client: &Client) -> Result<()> {
    let notification = find_notification(client, &args.id)?;
    let mut dialog = InviteDialog::new(notification);
    let view = dialog.open(&client.backend, &client.auth);

    let result = OpenOutput {
        target: target(dialog.notification()),
        notification: dialog.notification().clone(),
        can_decide: dialog.can_decide(),
        view,
    };

    render_mode(
        client.output,
        &result,
        |r, w| {
            writeln!(
                w,
                "{}  {}  {}  {}",
                r.notification.id,
                r.notification.kind,
                target_label(&r.target),
                r.notification.message
            )
        },
        |r, w| {
            pretty_section(w, &r.notification.message)?;
            pretty_kv(w, "Type", r.notification.kind.as_str())?;
            pretty_kv(w, "Received", r.notification.created_at.format("%Y-%m-%d %H:%M").to_string())?;
            pretty_kv(w, "About", target_label(&r.target))?;
            if let Some(hint) = view_hint(r) {
                writeln!(w)?;
                writeln!(w, "{hint}")?;
            }
            Ok(())
        },
    )
}

pub fn run_notification(
    args: &NotificationArgs,
    config: EffectiveConfig,
    output: OutputMode,
) -> Result<()> {
    let client = Client::open(config, output)?;
    match &args.command {
        NotificationCommand::Open(open) => run_open(open, &client)?,
        NotificationCommand::ReadAll => {
            let mut feed =
                NotificationFeed::load(&client.backend, true).map_err(|e| client.fail(e))?;
            let marked = feed
                .mark_all_read(&client.backend)
                .map_err(|e| client.fail(e))?;
            render_success(output, &format!("Marked {marked} notification(s) read"))?;
        }
    }
    client.finish()
}

#[cfg(test)]
mod tests {
    use super::{NotificationRow, OpenOutput, view_hint};
    use chrono::Utc;
    use devtask_core::invite::DialogView;
    use devtask_core::model::{Notification, NotificationKind};
    use devtask_core::notify::NotificationTarget;

    fn invite() -> Notification {
        Notification {
            id: "n1".into(),
            recipient_user_id: "u2".into(),
            message: "Join Apollo".into(),
            kind: NotificationKind::ProjectInvite,
            related_project_id: Some("p1".into()),
            related_task_id: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn row_resolves_invite_target() {
        let row = NotificationRow::new(&invite());
        assert_eq!(row.kind, "project_invite");
        assert_eq!(row.target, NotificationTarget::Project("p1".into()));
    }

    #[test]
    fn undecided_invite_hints_at_commands() {
        let out = OpenOutput {
            notification: invite(),
            target: NotificationTarget::Project("p1".into()),
            view: DialogView::Undecided,
            can_decide: true,
        };
        let hint = view_hint(&out).expect("hint");
        assert!(hint.contains("dt invite accept n1"));

        let joined = OpenOutput {
            view: DialogView::AlreadyJoined,
            can_decide: false,
            ..out
        };
        assert_eq!(
            view_hint(&joined).as_deref(),
            Some("You are a member of this project.")
        );
    }
}
