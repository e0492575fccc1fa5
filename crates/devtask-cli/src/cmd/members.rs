//! `dt members list|role|remove`.

use anyhow::Result;
use clap::{Args, Subcommand};
use devtask_core::config::EffectiveConfig;
use devtask_core::members::Roster;
use devtask_core::model::{ProjectId, ProjectMember, Role};
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{OutputMode, Renderable, render, render_list};

#[derive(Args, Debug)]
pub struct MembersArgs {
    #[command(subcommand)]
    pub command: MembersCommand,
}

#[derive(Subcommand, Debug)]
pub enum MembersCommand {
    #[command(
        about = "Show a project's members and their roles",
        after_help = "EXAMPLES:\n    dt members list p1\n    dt members list p1 --json"
    )]
    List(MembersListArgs),

    #[command(
        about = "Change a member's role (project owner only)",
        after_help = "EXAMPLES:\n    dt members role p1 u7 owner\n    dt members role p1 grace@example.com member"
    )]
    Role(MembersRoleArgs),

    #[command(
        about = "Remove a member (project owner only)",
        after_help = "EXAMPLES:\n    dt members remove p1 u7"
    )]
    Remove(MembersRemoveArgs),
}

#[derive(Args, Debug)]
pub struct MembersListArgs {
    /// Project ID.
    pub project: String,
}

#[derive(Args, Debug)]
pub struct MembersRoleArgs {
    /// Project ID.
    pub project: String,

    /// Member's user ID or email.
    pub user: String,

    /// New role: owner or member.
    pub role: Role,
}

#[derive(Args, Debug)]
pub struct MembersRemoveArgs {
    /// Project ID.
    pub project: String,

    /// Member's user ID or email.
    pub user: String,
}

#[derive(Debug, Serialize)]
struct MemberRow {
    user_id: String,
    name: String,
    role: Role,
    is_project_owner: bool,
}

impl MemberRow {
    fn new(member: &ProjectMember, roster: &Roster) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            name: member.display_name().to_string(),
            role: member.role,
            is_project_owner: member.user_id == roster.project().owner_id,
        }
    }
}

impl Renderable for MemberRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let marker = if self.is_project_owner { "★" } else { " " };
        writeln!(w, "{marker} {:<8} {:<32} {}", self.role, self.name, self.user_id)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}  {}", self.user_id, self.role, self.name)
    }

    fn table_headers() -> &'static [&'static str] {
        &["user_id", "role", "name"]
    }
}

#[derive(Debug, Serialize)]
struct MemberChange {
    ok: bool,
    project_id: String,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    changed: bool,
}

fn change_line(change: &MemberChange) -> String {
    match (change.role, change.changed) {
        (Some(role), true) => format!("✓ {} is now {role}", change.user_id),
        (Some(role), false) => format!("{} is already {role}", change.user_id),
        (None, _) => format!("✓ Removed {} from {}", change.user_id, change.project_id),
    }
}

fn open_roster(client: &Client, project: &str) -> Result<Roster> {
    Roster::load(
        &client.backend,
        &ProjectId::from(project),
        client.auth.user_id(),
    )
    .map_err(|e| client.fail(e))
}

pub fn run_members(args: &MembersArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    match &args.command {
        MembersCommand::List(list) => {
            let roster = open_roster(&client, &list.project)?;
            let rows: Vec<MemberRow> = roster
                .members()
                .iter()
                .map(|m| MemberRow::new(m, &roster))
                .collect();
            render_list(&rows, output, "No members.")?;
        }
        MembersCommand::Role(role) => {
            let mut roster = open_roster(&client, &role.project)?;
            let changed = roster
                .change_role(&client.backend, &role.user, role.role)
                .map_err(|e| client.fail(e))?;
            let user_id = roster
                .find(&role.user)
                .map_or_else(|| role.user.clone(), |m| m.user_id.to_string());
            let result = MemberChange {
                ok: true,
                project_id: role.project.clone(),
                user_id,
                role: Some(role.role),
                changed,
            };
            render(output, &result, |r, w| writeln!(w, "{}", change_line(r)))?;
        }
        MembersCommand::Remove(remove) => {
            let mut roster = open_roster(&client, &remove.project)?;
            let user = roster
                .remove(&client.backend, &remove.user)
                .map_err(|e| client.fail(e))?;
            let result = MemberChange {
                ok: true,
                project_id: remove.project.clone(),
                user_id: user.to_string(),
                role: None,
                changed: true,
            };
            render(output, &result, |r, w| writeln!(w, "{}", change_line(r)))?;
        }
    }
    client.finish()
}
