//! `dt login`, `dt logout`, `dt whoami`.

use anyhow::{Context, Result};
use clap::Args;
use devtask_core::api::Backend;
use devtask_core::config::EffectiveConfig;
use devtask_core::error::DevtaskError;
use devtask_core::model::User;
use serde::Serialize;
use std::io::{self, BufRead, Write};

use crate::client::{Client, Remote, report};
use crate::output::{OutputMode, pretty_kv, pretty_section, render, render_mode, render_success};
use crate::session::SessionStore;

/// Env var consulted when `--password` is not given.
const ENV_PASSWORD: &str = "DEVTASK_PASSWORD";

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email.
    #[arg(long)]
    pub email: String,

    /// Account password. Falls back to `DEVTASK_PASSWORD`, then a prompt.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginOutput<'a> {
    ok: bool,
    user: &'a User,
    session: String,
}

fn read_password(args: &LoginArgs) -> Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }
    eprint!("password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn run_login(args: &LoginArgs, config: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let password = read_password(args)?;
    let remote = Remote::connect(config, None)?;
    let auth = remote
        .login(&args.email, &password)
        .map_err(|e| report(output, e.into()))?;

    let store = SessionStore::locate()?;
    store.save(&auth)?;
    tracing::info!(user = %auth.user_id(), "logged in");

    let result = LoginOutput {
        ok: true,
        user: &auth.user,
        session: store.path().display().to_string(),
    };
    render(output, &result, |r, w| {
        writeln!(
            w,
            "✓ Logged in as {} <{}>",
            r.user.display_name(),
            r.user.email
        )
    })
}

pub fn run_logout(output: OutputMode) -> Result<()> {
    let store = SessionStore::locate()?;
    if store.clear()? {
        render_success(output, "Logged out")
    } else {
        render_success(output, "Not logged in")
    }
}

#[derive(Debug, Serialize)]
struct WhoamiOutput {
    user_id: String,
    email: String,
    full_name: Option<String>,
    initials: String,
    api_url: String,
}

pub fn run_whoami(config: EffectiveConfig, output: OutputMode) -> Result<()> {
    let client = Client::open(config, output)?;
    let user = client
        .backend
        .current_user()
        .map_err(|e| client.fail(DevtaskError::from(e)))?;

    let result = WhoamiOutput {
        user_id: user.user_id.to_string(),
        initials: user.initials(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        api_url: client.config.base_url.clone(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}  {}  {}", r.user_id, r.email, r.full_name.as_deref().unwrap_or("-")),
        |r, w| {
            pretty_section(w, &format!("[{}] {}", r.initials, user.display_name()))?;
            pretty_kv(w, "User", &r.user_id)?;
            pretty_kv(w, "Email", &r.email)?;
            pretty_kv(w, "API", &r.api_url)
        },
    )?;
    client.finish()
}
