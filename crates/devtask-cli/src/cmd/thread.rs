//! `dt thread` - open the interactive thread view.

use anyhow::Result;
use clap::Args;
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::error::DevtaskError;
use devtask_core::model::TaskId;
use devtask_core::thread::ThreadViewState;
use std::io::IsTerminal;

use crate::client::Client;
use crate::output::{CliError, OutputMode, render_error};
use crate::tui::thread::{ThreadApp, run_thread_tui};

#[derive(Args, Debug)]
pub struct ThreadArgs {
    /// Task ID.
    pub task: String,
}

pub fn run_thread(args: &ThreadArgs, config: EffectiveConfig, output: OutputMode) -> Result<()> {
    if !std::io::stdout().is_terminal() {
        let msg = "dt thread needs an interactive terminal";
        render_error(
            output,
            &CliError::with_details(
                msg,
                format!("Use `dt comments {}` for non-interactive output", args.task),
                "not_a_terminal",
            ),
        )?;
        anyhow::bail!("{msg}");
    }

    let client = Client::open(config, output)?;
    let task_id = TaskId::from(args.task.as_str());
    let task = client
        .backend
        .get_task(&task_id)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let state = ThreadViewState::new(task_id).with_max_chars(client.config.max_comment_chars);
    let mut app = ThreadApp::new(task.title, state);
    app.reload(&client.backend)
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    if let Err(err) = run_thread_tui(&mut app, &client.backend) {
        return Err(match err.downcast::<devtask_core::api::ApiError>() {
            Ok(api) => client.fail(DevtaskError::from(api)),
            Err(other) => other,
        });
    }
    client.finish()
}
