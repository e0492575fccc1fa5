//! devtask-core library.
//!
//! Client-side logic for the devtask task tracker: comment threading,
//! assignment reconciliation, the invite workflow, member management, status
//! changes, and the lookup tables used to display tasks. All server access
//! goes through [`api::Backend`].
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::DevtaskError`] for workflow results,
//!   `anyhow::Result` for configuration plumbing.
//! - **Logging**: `tracing` macros (`debug!` for cache and request detail,
//!   `warn!` for best-effort failures).

pub mod api;
pub mod assignment;
pub mod auth;
pub mod cache;
pub mod config;
pub mod copilot;
pub mod display;
pub mod edit;
pub mod error;
pub mod invite;
pub mod members;
pub mod memory;
pub mod model;
pub mod notify;
pub mod thread;

pub use api::{ApiError, ApiResult, Backend};
pub use auth::AuthContext;
pub use error::{DevtaskError, ErrorCode, ValidationError};
