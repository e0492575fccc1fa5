//! How `dt` prints results: pretty for people, text rows for pipes, JSON for
//! scripts.
//!
//! The mode is picked once per invocation, first match wins:
//! 1. `--format <mode>`, or `--json`
//! 2. the `FORMAT` environment variable (`pretty`, `text` or `json`)
//! 3. `output = "..."` in `config.toml`
//! 4. [`OutputMode::Pretty`] on a terminal, [`OutputMode::Text`] otherwise
//!
//! Errors always go to stderr so stdout stays parseable.

use clap::ValueEnum;
use devtask_core::error::DevtaskError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

/// `--quiet`: drop the `✓ ...` confirmation lines outside JSON mode.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

const RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))
}

/// A heading line underlined by [`pretty_rule`].
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// `key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<12} {}", value.as_ref())
}

/// Cut `s` to at most `max` characters, marking the cut with `…`.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Sections, badges and icons for reading in a terminal.
    Pretty,
    /// One tab- or space-separated row per record.
    Text,
    /// Pretty-printed JSON: an object per command, an array for listings.
    Json,
}

impl OutputMode {
    #[must_use]
    pub const fn is_pretty(self) -> bool {
        matches!(self, Self::Pretty)
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

fn pick_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    config_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if json_flag && format_flag.is_none() {
        return OutputMode::Json;
    }
    // Unknown env/config names are ignored, not errors.
    format_flag
        .or_else(|| format_env.and_then(OutputMode::from_name))
        .or_else(|| config_output.and_then(OutputMode::from_name))
        .unwrap_or(if is_tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        })
}

/// Pick the mode for this invocation (see the module docs for precedence).
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    config_output: Option<&str>,
) -> OutputMode {
    let format_env = std::env::var("FORMAT").ok();
    pick_mode(
        format_flag,
        json_flag,
        format_env.as_deref(),
        config_output,
        io::stdout().is_terminal(),
    )
}

/// A record that can be listed by [`render_list`].
pub trait Renderable: Serialize {
    /// The pretty form; may span several lines.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Exactly one line, columns matching [`Renderable::table_headers`].
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Print a listing. Pretty mode prints `empty_note` when there is nothing to
/// show; text mode prints the header row only when there are rows.
pub fn render_list<R: Renderable>(
    items: &[R],
    mode: OutputMode,
    empty_note: &str,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Json => write_json(&mut out, items)?,
        OutputMode::Pretty if items.is_empty() => writeln!(out, "{empty_note}")?,
        OutputMode::Pretty => {
            for item in items {
                item.render_human(&mut out)?;
            }
        }
        OutputMode::Text => {
            let headers = R::table_headers();
            if !items.is_empty() && !headers.is_empty() {
                writeln!(out, "{}", headers.join("  "))?;
            }
            for item in items {
                item.render_table(&mut out)?;
            }
        }
    }
    Ok(())
}

/// Print one value, with separate text and pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Json => write_json(&mut out, value)?,
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Print one value; text and pretty share `human_fn`.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    if mode == OutputMode::Json {
        write_json(&mut out, value)
    } else {
        human_fn(value, &mut out)?;
        Ok(())
    }
}

/// What a failed command tells the user. `error_code` is either a core
/// `E####` code or a CLI-level slug such as `comment_not_found`.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

impl From<&DevtaskError> for CliError {
    fn from(err: &DevtaskError) -> Self {
        Self::with_details(err.to_string(), err.suggestion(), err.error_code().to_string())
    }
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return write_json(out, &serde_json::json!({ "error": error }));
    }
    writeln!(out, "error: {}", error.message)?;
    if let Some(suggestion) = &error.suggestion {
        writeln!(out, "  suggestion: {suggestion}")?;
    }
    Ok(())
}

/// Print `error` to stderr.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    write_error(&mut io::stderr().lock(), mode, error)
}

/// Confirm a mutation: `{"ok": true, "message": ...}` in JSON, `✓ message`
/// otherwise (unless `--quiet`).
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    if mode == OutputMode::Json {
        return write_json(&mut out, &serde_json::json!({ "ok": true, "message": message }));
    }
    if !QUIET.load(Ordering::Relaxed) {
        writeln!(out, "✓ {message}")?;
    }
    Ok(())
}
