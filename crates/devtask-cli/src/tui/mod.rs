//! Full-screen terminal views.
//!
//! - [`thread::run_thread_tui`]: browse a task's comment thread, collapse
//!   branches, reply and post new comments.

pub mod thread;
