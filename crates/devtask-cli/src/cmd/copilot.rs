//! `dt copilot` - ask the co-pilot for a project plan and preview it.

use anyhow::Result;
use clap::Args;
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::copilot::{GeneratedProject, GeneratedTask, PlanSummary, validate_prompt};
use devtask_core::display::{self, Badge};
use devtask_core::error::DevtaskError;
use serde::Serialize;
use std::io::{self, Write};

use crate::client::Client;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode, truncate};

#[derive(Args, Debug)]
pub struct CopilotArgs {
    /// What to plan. Several words are joined with spaces.
    #[arg(required = true, value_name = "PROMPT")]
    pub words: Vec<String>,
}

impl CopilotArgs {
    pub fn prompt(&self) -> String {
        self.words.join(" ")
    }
}

#[derive(Debug, Serialize)]
struct PlannedTask<'a> {
    #[serde(flatten)]
    task: &'a GeneratedTask,
    badge: Badge,
}

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    title: &'a str,
    description: &'a str,
    summary: PlanSummary,
    tasks: Vec<PlannedTask<'a>>,
}

impl<'a> PlanOutput<'a> {
    fn new(plan: &'a GeneratedProject) -> Self {
        Self {
            title: &plan.title,
            description: &plan.description,
            summary: plan.summary(),
            tasks: plan
                .tasks
                .iter()
                .map(|task| PlannedTask {
                    task,
                    badge: display::priority_config(task.priority),
                })
                .collect(),
        }
    }
}

fn write_plan(w: &mut dyn Write, plan: &PlanOutput<'_>) -> io::Result<()> {
    pretty_section(w, plan.title)?;
    if !plan.description.trim().is_empty() {
        writeln!(w, "{}", plan.description.trim())?;
        writeln!(w)?;
    }
    let s = plan.summary;
    pretty_kv(w, "Tasks", s.task_count.to_string())?;
    pretty_kv(w, "Estimate", format!("{}h", s.total_hours))?;
    pretty_kv(w, "High priority", s.high_priority.to_string())?;
    pretty_kv(w, "Done", format!("{}/{}", s.completed, s.task_count))?;
    if plan.tasks.is_empty() {
        return Ok(());
    }
    pretty_rule(w)?;
    for (n, planned) in plan.tasks.iter().enumerate() {
        let due = planned
            .task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        writeln!(
            w,
            "{:>2}. {} {:<44} {:>5}h  {due}",
            n + 1,
            planned.badge.icon,
            truncate(&planned.task.title, 44),
            planned.task.estimated_time
        )?;
    }
    Ok(())
}

pub fn run_copilot(args: &CopilotArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let prompt = validate_prompt(&args.prompt()).map_err(|e| client.fail(e.into()))?;
    tracing::debug!(chars = prompt.chars().count(), "asking co-pilot");
    let plan = client
        .backend
        .generate_project(&prompt)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let result = PlanOutput::new(&plan);
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "priority  hours  title")?;
            for planned in &r.tasks {
                writeln!(
                    w,
                    "{}  {}  {}",
                    planned.task.priority, planned.task.estimated_time, planned.task.title
                )?;
            }
            Ok(())
        },
        |r, w| write_plan(w, r),
    )?;
    client.finish()
}

#[cfg(test)]
mod tests {
    use super::{PlanOutput, write_plan};
    use devtask_core::copilot::GeneratedProject;

    fn plan() -> GeneratedProject {
        serde_json::from_value(serde_json::json!({
            "title": "Blog launch",
            "description": "Ship a blog",
            "tasks": [
                {"title": "Pick a theme", "priority": "low", "estimated_time": 2.0},
                {"title": "Write first post", "priority": "high", "estimated_time": 4.5},
                {"title": "Buy domain", "priority": "urgent", "estimated_time": 0.5}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn preview_lists_numbered_tasks_with_badges() {
        let plan = plan();
        let mut buf = Vec::new();
        write_plan(&mut buf, &PlanOutput::new(&plan)).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("Blog launch"));
        assert!(out.contains(" 2. 🔥 Write first post"));
        // Made-up priorities read as medium.
        assert!(out.contains(" 3. ⚡ Buy domain"));
        assert!(out.contains("7h"));
    }

    #[test]
    fn json_flattens_task_fields() {
        let plan = plan();
        let value = serde_json::to_value(PlanOutput::new(&plan)).unwrap();
        assert_eq!(value["summary"]["task_count"], 3);
        assert_eq!(value["summary"]["high_priority"], 1);
        assert_eq!(value["tasks"][1]["title"], "Write first post");
        assert_eq!(value["tasks"][1]["badge"]["label"], "High");
    }
}
