//! `dt projects`.

use anyhow::Result;
use clap::Args;
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::error::DevtaskError;
use devtask_core::model::{Project, ProjectMember};
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{OutputMode, Renderable, render_list, truncate};

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    /// Fetch and show each project's member roster.
    #[arg(long)]
    pub members: bool,
}

#[derive(Debug, Serialize)]
struct ProjectRow {
    id: String,
    title: String,
    owner_id: String,
    is_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<Vec<ProjectMember>>,
}

impl ProjectRow {
    fn new(project: &Project, me: &str, members: Option<Vec<ProjectMember>>) -> Self {
        Self {
            id: project.id.to_string(),
            title: project.title.clone(),
            owner_id: project.owner_id.to_string(),
            is_owner: project.owner_id.as_str() == me,
            members,
        }
    }
}

impl Renderable for ProjectRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let marker = if self.is_owner { "★" } else { " " };
        writeln!(w, "{marker} {:<48} {}", truncate(&self.title, 48), self.id)?;
        for member in self.members.iter().flatten() {
            writeln!(w, "    {:<8} {}", member.role, member.display_name())?;
        }
        Ok(())
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let count = self
            .members
            .as_ref()
            .map_or_else(|| "-".to_string(), |m| m.len().to_string());
        writeln!(w, "{}  {}  {}  {}", self.id, self.owner_id, count, self.title)
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "owner", "members", "title"]
    }
}

pub fn run_projects(args: &ProjectsArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let projects = client
        .backend
        .list_projects()
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let me = client.auth.user_id().as_str().to_string();
    let mut rows = Vec::with_capacity(projects.len());
    for project in &projects {
        let members = if args.members {
            Some(
                client
                    .backend
                    .list_project_members(&project.id)
                    .map_err(|e| client.fail(DevtaskError::from(e)))?,
            )
        } else {
            None
        };
        rows.push(ProjectRow::new(project, &me, members));
    }
    render_list(&rows, output, "No projects.")?;
    client.finish()
}
