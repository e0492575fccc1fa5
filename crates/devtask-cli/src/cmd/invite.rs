//! `dt invite send|accept|decline`: invite someone into a project, or answer
//! an invite notification.

use anyhow::Result;
use clap::{Args, Subcommand};
use devtask_core::config::EffectiveConfig;
use devtask_core::invite::{InviteDialog, InviteState};
use devtask_core::members::Roster;
use devtask_core::model::{ProjectId, Role};
use serde::Serialize;

use crate::client::Client;
use crate::cmd::notify::find_notification;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InviteArgs {
    #[command(subcommand)]
    pub command: InviteCommand,
}

#[derive(Subcommand, Debug)]
pub enum InviteCommand {
    #[command(
        about = "Invite a user into a project you own",
        long_about = "Invite a user into a project you own, by user ID or email. They join once they accept the invite notification.",
        after_help = "EXAMPLES:\n    dt invite send p1 grace@example.com\n    dt invite send p1 u7 --role owner"
    )]
    Send(InviteSendArgs),

    #[command(
        about = "Join the project behind an invite",
        after_help = "EXAMPLES:\n    dt invite accept n7"
    )]
    Accept(InviteTarget),

    #[command(
        about = "Decline an invite",
        after_help = "EXAMPLES:\n    dt invite decline n7"
    )]
    Decline(InviteTarget),
}

#[derive(Args, Debug)]
pub struct InviteSendArgs {
    /// Project ID.
    pub project: String,

    /// User ID or email of the invitee.
    pub user: String,

    /// Role the invitee gets on joining.
    #[arg(long, default_value = "member")]
    pub role: Role,
}

#[derive(Args, Debug)]
pub struct InviteTarget {
    /// Notification ID of the invite.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct InviteOutput {
    ok: bool,
    notification_id: String,
    project_id: Option<String>,
    state: InviteState,
}

fn confirmation(out: &InviteOutput) -> String {
    let project = out.project_id.as_deref().unwrap_or("-");
    match out.state {
        InviteState::Accepted => format!("✓ Joined project {project}"),
        InviteState::Declined => format!("✓ Declined invite to project {project}"),
        InviteState::Unseen | InviteState::SeenUndecided => {
            format!("Invite to project {project} is still open")
        }
    }
}

#[derive(Debug, Serialize)]
struct SentOutput {
    ok: bool,
    project_id: String,
    project: String,
    user_id: String,
    invitee: String,
    role: Role,
}

fn run_send(args: &InviteSendArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let roster = Roster::load(
        &client.backend,
        &ProjectId::from(args.project.as_str()),
        client.auth.user_id(),
    )
    .map_err(|e| client.fail(e))?;
    let pending = roster
        .invite(&client.backend, &args.user, args.role)
        .map_err(|e| client.fail(e))?;

    let result = SentOutput {
        ok: true,
        project_id: roster.project().id.to_string(),
        project: roster.project().title.clone(),
        user_id: pending.user_id.to_string(),
        invitee: pending.display_name().to_string(),
        role: pending.role,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Invited {} to {} as {}", r.invitee, r.project, r.role)
    })?;
    client.finish()
}

pub fn run_invite(args: &InviteArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    match &args.command {
        InviteCommand::Send(send) => run_send(send, config, output),
        InviteCommand::Accept(target) => run_answer(target, true, config, output),
        InviteCommand::Decline(target) => run_answer(target, false, config, output),
    }
}

fn run_answer(
    target: &InviteTarget,
    accept: bool,
    config: EffectiveConfig,
    output: OutputMode,
) -> Result<()> {
    let id = target.id.as_str();
    let client = Client::open(config, output)?;
    let notification = find_notification(&client, id)?;
    let mut dialog = InviteDialog::new(notification);
    dialog.open(&client.backend, &client.auth);

    let decided = if accept {
        dialog.accept(&client.backend, &client.auth)
    } else {
        dialog.decline(&client.backend, &client.auth)
    };
    let state = match decided {
        Ok(state) => state,
        Err(err) => {
            // The open above may have marked the notification read.
            let failure = client.fail(err);
            client.finish()?;
            return Err(failure);
        }
    };

    let result = InviteOutput {
        ok: true,
        notification_id: id.to_string(),
        project_id: dialog
            .notification()
            .related_project_id
            .as_ref()
            .map(ToString::to_string),
        state,
    };
    render(output, &result, |r, w| writeln!(w, "{}", confirmation(r)))?;
    client.finish()
}
