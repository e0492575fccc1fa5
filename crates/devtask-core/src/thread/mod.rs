//! Threaded comments: tree reconstruction and per-view collapse/reply state.

pub mod tree;
pub mod view;

pub use tree::{count_all, find, max_depth, organize_comments, walk};
pub use view::{
    Composer, MAX_COMMENT_CHARS, ThreadRow, ThreadViewState, validate_comment_body,
};
