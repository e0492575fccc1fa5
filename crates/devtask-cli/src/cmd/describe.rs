//! `dt describe` - show the badge a value maps to. Works offline.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use devtask_core::display::{self, Badge, DueUrgency};
use serde::Serialize;
use std::io::{self, Write};

use crate::output::{CliError, OutputMode, pretty_kv, render_error, render_mode};

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(subcommand)]
    pub command: DescribeCommand,
}

#[derive(Subcommand, Debug)]
pub enum DescribeCommand {
    /// Badge and progress for a task status.
    Status { value: String },
    /// Badge for a task priority.
    Priority { value: String },
    /// Urgency of a due date (YYYY-MM-DD).
    Due {
        date: String,

        /// Count days from this date instead of today.
        #[arg(long, value_name = "DATE")]
        today: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct BadgeOutput<'a> {
    input: &'a str,
    #[serde(flatten)]
    badge: Badge,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
}

#[derive(Debug, Serialize)]
struct DueOutput {
    date: NaiveDate,
    today: NaiveDate,
    urgency: DueUrgency,
    text: String,
    icon: &'static str,
}

fn write_badge(w: &mut dyn Write, b: &BadgeOutput<'_>) -> io::Result<()> {
    pretty_kv(w, "Label", format!("{} {}", b.badge.icon, b.badge.label))?;
    pretty_kv(w, "Tone", format!("{:?}", b.badge.tone).to_lowercase())?;
    pretty_kv(w, "Accent", format!("{:?}", b.badge.accent).to_lowercase())?;
    if let Some(progress) = b.progress {
        pretty_kv(w, "Progress", format!("{progress}%"))?;
    }
    Ok(())
}

fn parse_date(raw: &str, output: OutputMode) -> Result<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(err) => {
            let msg = format!("invalid date '{raw}': {err}");
            render_error(
                output,
                &CliError::with_details(&msg, "Use YYYY-MM-DD, e.g. 2025-01-31", "invalid_date"),
            )?;
            anyhow::bail!("{msg}")
        }
    }
}

fn due_output(date: NaiveDate, today: NaiveDate) -> DueOutput {
    let urgency = DueUrgency::of(Some(date.and_time(chrono::NaiveTime::MIN).and_utc()), today);
    DueOutput {
        date,
        today,
        urgency,
        text: urgency.text(),
        icon: urgency.icon(),
    }
}

pub fn run_describe(args: &DescribeArgs, output: OutputMode) -> Result<()> {
    match &args.command {
        DescribeCommand::Status { value } => {
            let out = BadgeOutput {
                input: value,
                badge: display::status_config_raw(value),
                progress: Some(display::progress_from_status_raw(value)),
            };
            render_mode(
                output,
                &out,
                |b, w| writeln!(w, "{}  {}  {}%", b.input, b.badge.label, b.progress.unwrap_or(0)),
                |b, w| write_badge(w, b),
            )
        }
        DescribeCommand::Priority { value } => {
            let out = BadgeOutput {
                input: value,
                badge: display::priority_config_raw(value),
                progress: None,
            };
            render_mode(
                output,
                &out,
                |b, w| writeln!(w, "{}  {}", b.input, b.badge.label),
                |b, w| write_badge(w, b),
            )
        }
        DescribeCommand::Due { date, today } => {
            let date = parse_date(date, output)?;
            let today = match today {
                Some(raw) => parse_date(raw, output)?,
                None => Utc::now().date_naive(),
            };
            let out = due_output(date, today);
            render_mode(
                output,
                &out,
                |d, w| writeln!(w, "{}  {}", d.date, d.text),
                |d, w| writeln!(w, "{} {}", d.icon, d.text),
            )
        }
    }
}
