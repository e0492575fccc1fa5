use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::DevtaskError;
use crate::thread::MAX_COMMENT_CHARS;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Env var overriding the API base URL.
pub const ENV_API_URL: &str = "DEVTASK_API_URL";
/// Env var pointing at an alternative config file.
pub const ENV_CONFIG: &str = "DEVTASK_CONFIG";
/// Env var pointing at an alternative session file.
pub const ENV_SESSION: &str = "DEVTASK_SESSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub thread: ThreadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadConfig {
    #[serde(default = "default_max_comment_chars")]
    pub max_comment_chars: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_comment_chars: default_max_comment_chars(),
        }
    }
}

/// Settings after flags, environment and config file are combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub user: UserConfig,
    pub base_url: String,
    pub resolved_output: Option<String>,
    pub timeout_secs: u64,
    pub max_comment_chars: usize,
    pub config_path: Option<PathBuf>,
}

/// `$DEVTASK_CONFIG`, else `<config_dir>/devtask/config.toml`.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("devtask/config.toml"))
}

/// `$DEVTASK_SESSION`, else `<data_dir>/devtask/session.json`.
#[must_use]
pub fn session_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(ENV_SESSION) {
        return Some(PathBuf::from(path));
    }
    dirs::data_dir().map(|dir| dir.join("devtask/session.json"))
}

/// Load the user config, using defaults when there is no file.
///
/// # Errors
///
/// Fails when the file exists but cannot be read, or does not parse. Parse
/// failures carry a [`DevtaskError::Config`].
pub fn load_user_config() -> Result<UserConfig> {
    match user_config_path() {
        Some(path) => load_user_config_from(&path),
        None => Ok(UserConfig::default()),
    }
}

/// Load the user config from an explicit path.
///
/// # Errors
///
/// Same as [`load_user_config`].
pub fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .map_err(|e| DevtaskError::Config(format!("{}: {e}", path.display())).into())
}

/// Pick the base URL: flag, then env, then config file, then the default.
/// Trailing slashes are dropped.
#[must_use]
pub fn resolve_base_url(
    cli_api_url: Option<&str>,
    env_api_url: Option<&str>,
    user: &UserConfig,
) -> String {
    let chosen = [cli_api_url, env_api_url, user.api.base_url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(DEFAULT_BASE_URL);
    chosen.trim_end_matches('/').to_string()
}

/// Canonical output mode name from a config or env value.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

/// Combine the config file with command-line and environment overrides.
///
/// # Errors
///
/// Propagates config loading failures.
pub fn resolve_config(cli_api_url: Option<&str>) -> Result<EffectiveConfig> {
    let config_path = user_config_path();
    let user = match &config_path {
        Some(path) => load_user_config_from(path)?,
        None => UserConfig::default(),
    };
    let env_api_url = env::var(ENV_API_URL).ok();
    let base_url = resolve_base_url(cli_api_url, env_api_url.as_deref(), &user);
    let resolved_output = user
        .output
        .as_deref()
        .and_then(normalize_output_mode)
        .map(str::to_string);

    Ok(EffectiveConfig {
        base_url,
        resolved_output,
        timeout_secs: user.api.timeout_secs,
        max_comment_chars: user.thread.max_comment_chars,
        config_path,
        user,
    })
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_comment_chars() -> usize {
    MAX_COMMENT_CHARS
}
