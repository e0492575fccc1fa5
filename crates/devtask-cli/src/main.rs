#![forbid(unsafe_code)]

mod client;
mod cmd;
mod http;
mod output;
mod session;
mod tui;

use clap::{CommandFactory, Parser, Subcommand};
use devtask_core::config::resolve_config;
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "dt",
    bin_name = "dt",
    author,
    version,
    about = "dt: terminal client for the devtask tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (defaults to pretty on a TTY, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Backend base URL (`http(s)://...`, or `file://<snapshot.json>` for offline use).
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Output mode from flags and environment, before the config file is read.
    fn early_output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json, None)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Session",
        about = "Log in and store a session",
        long_about = "Exchange email and password for a token and store it in the session file.",
        after_help = "EXAMPLES:\n    # Log in (prompts for the password)\n    dt login --email ada@example.com\n\n    # Non-interactive\n    DEVTASK_PASSWORD=secret dt login --email ada@example.com"
    )]
    Login(cmd::auth::LoginArgs),

    #[command(
        next_help_heading = "Session",
        about = "Forget the stored session",
        after_help = "EXAMPLES:\n    dt logout"
    )]
    Logout,

    #[command(
        next_help_heading = "Session",
        about = "Show the logged-in user",
        after_help = "EXAMPLES:\n    dt whoami\n\n    # Emit machine-readable output\n    dt whoami --json"
    )]
    Whoami,

    #[command(
        next_help_heading = "Read",
        about = "List tasks you own or are assigned to",
        long_about = "List tasks you own or are assigned to, with status, priority, progress and due date.",
        after_help = "EXAMPLES:\n    # All my tasks\n    dt tasks\n\n    # Only tasks in progress\n    dt tasks --status in_progress\n\n    # Emit machine-readable output\n    dt tasks --json"
    )]
    Tasks(cmd::task::TasksArgs),

    #[command(
        next_help_heading = "Read",
        about = "Inspect a task or change its status",
        after_help = "EXAMPLES:\n    dt task show 3f2a\n\n    # Owner or assignee only\n    dt task status 3f2a in_progress"
    )]
    Task(cmd::task::TaskArgs),

    #[command(
        next_help_heading = "Read",
        about = "List projects you own or belong to",
        after_help = "EXAMPLES:\n    dt projects\n\n    # Include member rosters\n    dt projects --members"
    )]
    Projects(cmd::project::ProjectsArgs),

    #[command(
        next_help_heading = "Collaborate",
        about = "Show or change task assignees",
        long_about = "Show or change who is assigned to a task.\n\nWith no users, lists current assignees and assignable project members. Positional users replace the whole selection; --add and --remove adjust it. The owner is never sent as an assignee.",
        after_help = "EXAMPLES:\n    # Show current and assignable users\n    dt assign 3f2a\n\n    # Replace the assignee list\n    dt assign 3f2a u2 u3\n\n    # Adjust and preview without saving\n    dt assign 3f2a --add u4 --remove u3 --dry-run"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Collaborate",
        about = "List a project's members, change roles or remove members",
        long_about = "List a project's members. The project owner can also change member roles and remove members; the owner's own role is fixed.",
        after_help = "EXAMPLES:\n    dt members list p1\n\n    # Promote a member\n    dt members role p1 u7 owner\n\n    # Remove a member\n    dt members remove p1 grace@example.com"
    )]
    Members(cmd::members::MembersArgs),

    #[command(
        next_help_heading = "Collaborate",
        about = "Show a task's comment thread",
        long_about = "Show a task's comments as a thread, oldest first within each level.",
        after_help = "EXAMPLES:\n    # Show the thread\n    dt comments 3f2a\n\n    # Hide the replies under one comment\n    dt comments 3f2a --collapse c12\n\n    # Emit the nested tree as JSON\n    dt comments 3f2a --json"
    )]
    Comments(cmd::comment::CommentsArgs),

    #[command(
        next_help_heading = "Collaborate",
        about = "Add a comment or reply",
        after_help = "EXAMPLES:\n    # Comment on a task\n    dt comment add 3f2a \"Investigating the timeout\"\n\n    # Reply to a comment (the reply starts with @<author>)\n    dt comment add 3f2a \"Fixed in #42\" --reply-to c12"
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Collaborate",
        about = "Browse and reply to a thread interactively",
        long_about = "Open a full-screen view of a task's comment thread with collapse, reply and new-comment actions.",
        after_help = "EXAMPLES:\n    dt thread 3f2a"
    )]
    Thread(cmd::thread::ThreadArgs),

    #[command(
        next_help_heading = "Inbox",
        about = "List notifications",
        after_help = "EXAMPLES:\n    # Everything\n    dt notifications\n\n    # Unread only\n    dt notifications --unread"
    )]
    Notifications(cmd::notify::NotificationsArgs),

    #[command(
        next_help_heading = "Inbox",
        about = "Open or mark notifications",
        after_help = "EXAMPLES:\n    # Open one (marks it read)\n    dt notification open n7\n\n    # Mark everything read\n    dt notification read-all"
    )]
    Notification(cmd::notify::NotificationArgs),

    #[command(
        next_help_heading = "Inbox",
        about = "Invite someone into a project, or answer an invite",
        after_help = "EXAMPLES:\n    # Invite by email (project owner only)\n    dt invite send p1 grace@example.com\n\n    # Answer an invite notification\n    dt invite accept n7\n    dt invite decline n8"
    )]
    Invite(cmd::invite::InviteArgs),

    #[command(
        next_help_heading = "Plan",
        about = "Ask the co-pilot to plan a project",
        long_about = "Send a free-text prompt to the co-pilot and preview the generated project and tasks.",
        after_help = "EXAMPLES:\n    dt copilot \"Launch a personal blog in two weeks\""
    )]
    Copilot(cmd::copilot::CopilotArgs),

    #[command(
        next_help_heading = "Reference",
        about = "Show how a status, priority or due date is displayed",
        after_help = "EXAMPLES:\n    dt describe status on_hold\n    dt describe priority high\n    dt describe due 2025-01-31"
    )]
    Describe(cmd::describe::DescribeArgs),

    #[command(
        next_help_heading = "Reference",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    dt completions bash > ~/.local/share/bash-completion/completions/dt"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Initialize tracing subscriber.
///
/// `DEVTASK_LOG` sets the filter directly. Otherwise `DEBUG` or `--verbose`
/// selects debug output for devtask crates. `DEVTASK_LOG_FORMAT=json` switches
/// to JSON lines. Logs go to stderr.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEVTASK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "dt=debug,devtask_core=debug,info"
        } else {
            "dt=info,devtask_core=info,warn"
        })
    });

    let format = env::var("DEVTASK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    output::set_quiet(cli.quiet);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    // Commands that need neither config nor a backend.
    match &cli.command {
        Commands::Completions(args) => {
            let mut command = Cli::command();
            return cmd::completions::run_completions(args.shell, &mut command);
        }
        Commands::Describe(args) => {
            return cmd::describe::run_describe(args, cli.early_output_mode());
        }
        _ => {}
    }

    let config = resolve_config(cli.api_url.as_deref())
        .map_err(|err| client::report_anyhow(cli.early_output_mode(), err))?;
    let output = output::resolve_output_mode(
        cli.format,
        cli.json,
        config.resolved_output.as_deref(),
    );

    match cli.command {
        Commands::Login(ref args) => cmd::auth::run_login(args, &config, output),
        Commands::Logout => cmd::auth::run_logout(output),
        Commands::Whoami => cmd::auth::run_whoami(config, output),
        Commands::Tasks(ref args) => cmd::task::run_tasks(args, config, output),
        Commands::Task(ref args) => cmd::task::run_task(args, config, output),
        Commands::Projects(ref args) => cmd::project::run_projects(args, config, output),
        Commands::Assign(ref args) => cmd::assign::run_assign(args, config, output),
        Commands::Members(ref args) => cmd::members::run_members(args, config, output),
        Commands::Comments(ref args) => cmd::comment::run_comments(args, config, output),
        Commands::Comment(ref args) => cmd::comment::run_comment(args, config, output),
        Commands::Thread(ref args) => cmd::thread::run_thread(args, config, output),
        Commands::Notifications(ref args) => {
            cmd::notify::run_notifications(args, config, output)
        }
        Commands::Notification(ref args) => cmd::notify::run_notification(args, config, output),
        Commands::Invite(ref args) => cmd::invite::run_invite(args, config, output),
        Commands::Copilot(ref args) => cmd::copilot::run_copilot(args, config, output),
        Commands::Describe(_) | Commands::Completions(_) => Ok(()),
    }
}
