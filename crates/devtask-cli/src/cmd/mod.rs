pub mod assign;
pub mod auth;
pub mod comment;
pub mod completions;
pub mod copilot;
pub mod describe;
pub mod invite;
pub mod members;
pub mod notify;
pub mod project;
pub mod task;
pub mod thread;
