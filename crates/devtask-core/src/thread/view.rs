//! Collapse and reply state for a rendered comment thread.
//!
//! This state belongs to whatever view is showing a task's comments and is
//! thrown away when that view goes away. It is keyed by comment id only, so
//! it survives the tree being rebuilt after a refetch.
//!
//! - Each comment is expanded unless its id is in the collapsed set.
//!   Toggling one comment never cascades to its descendants.
//! - At most one reply composer is open: `replying_to` names its target.
//!   Opening a reply forces the target expanded.
//! - Drafts (the reply draft and the root composer draft) are independent of
//!   collapse state.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::model::{Comment, CommentId, NewComment, TaskId};

use super::tree::walk;

/// Default upper bound on comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 8_192;

/// Check a comment body before it is sent.
///
/// Returns the trimmed body.
///
/// # Errors
///
/// Returns a [`ValidationError`] for empty, over-long, or control-character
/// content (newline and tab are allowed).
pub fn validate_comment_body(body: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyComment);
    }

    let got = trimmed.chars().count();
    if got > max_chars {
        return Err(ValidationError::CommentTooLong {
            max: max_chars,
            got,
        });
    }

    if trimmed
        .chars()
        .any(|ch| ch.is_control() && ch != '\n' && ch != '\t')
    {
        return Err(ValidationError::ControlCharacters);
    }

    Ok(trimmed.to_string())
}

/// Where a pending submission came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composer {
    Root,
    Reply(CommentId),
}

/// One row of the flattened, collapse-aware thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow<'a> {
    pub comment: &'a Comment,
    pub depth: usize,
    pub reply_count: usize,
    pub collapsed: bool,
    pub is_reply_target: bool,
}

impl ThreadRow<'_> {
    #[must_use]
    pub fn has_replies(&self) -> bool {
        self.reply_count > 0
    }
}

/// View state for one task's comment thread.
#[derive(Debug, Clone)]
pub struct ThreadViewState {
    task_id: TaskId,
    collapsed: HashSet<CommentId>,
    replying_to: Option<CommentId>,
    reply_draft: String,
    root_draft: String,
    submitting: Option<Composer>,
    max_chars: usize,
}

impl ThreadViewState {
    #[must_use]
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            collapsed: HashSet::new(),
            replying_to: None,
            reply_draft: String::new(),
            root_draft: String::new(),
            submitting: None,
            max_chars: MAX_COMMENT_CHARS,
        }
    }

    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    #[must_use]
    pub fn is_collapsed(&self, id: &CommentId) -> bool {
        self.collapsed.contains(id)
    }

    /// Flip one comment between expanded and collapsed.
    pub fn toggle_collapse(&mut self, id: &CommentId) {
        if !self.collapsed.remove(id) {
            self.collapsed.insert(id.clone());
        }
    }

    pub fn collapse(&mut self, id: &CommentId) {
        self.collapsed.insert(id.clone());
    }

    pub fn expand(&mut self, id: &CommentId) {
        self.collapsed.remove(id);
    }

    #[must_use]
    pub const fn replying_to(&self) -> Option<&CommentId> {
        self.replying_to.as_ref()
    }

    #[must_use]
    pub fn reply_draft(&self) -> &str {
        &self.reply_draft
    }

    pub fn reply_draft_mut(&mut self) -> &mut String {
        &mut self.reply_draft
    }

    #[must_use]
    pub fn root_draft(&self) -> &str {
        &self.root_draft
    }

    pub fn root_draft_mut(&mut self) -> &mut String {
        &mut self.root_draft
    }

    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    /// Open the reply composer under `target`.
    ///
    /// Any other open reply composer is replaced. The target is expanded and
    /// the draft is seeded with `@<handle> ` unless this composer was already
    /// open on the same comment.
    pub fn initiate_reply(&mut self, target: &Comment) {
        self.expand(&target.id);
        if self.replying_to.as_ref() == Some(&target.id) {
            return;
        }
        self.replying_to = Some(target.id.clone());
        self.reply_draft = target
            .user
            .as_ref()
            .map(|u| format!("@{} ", u.mention_handle()))
            .unwrap_or_default();
    }

    /// Close the reply composer and drop its draft.
    pub fn cancel_reply(&mut self) {
        if matches!(self.submitting, Some(Composer::Reply(_))) {
            return;
        }
        self.replying_to = None;
        self.reply_draft.clear();
    }

    /// Validate the reply draft and mark it as being submitted.
    ///
    /// # Errors
    ///
    /// Fails when no reply composer is open, a submission is already in
    /// flight, or the draft does not pass [`validate_comment_body`].
    pub fn submit_reply(&mut self) -> Result<NewComment, ValidationError> {
        if self.submitting.is_some() {
            return Err(ValidationError::RequestInFlight);
        }
        let parent = self
            .replying_to
            .clone()
            .ok_or(ValidationError::NoReplyTarget)?;
        let content = validate_comment_body(&self.reply_draft, self.max_chars)?;
        self.submitting = Some(Composer::Reply(parent.clone()));
        Ok(NewComment {
            task_id: self.task_id.clone(),
            content,
            parent_comment_id: Some(parent),
        })
    }

    /// Validate the root composer draft and mark it as being submitted.
    ///
    /// # Errors
    ///
    /// Fails when a submission is already in flight or the draft is invalid.
    pub fn submit_root(&mut self) -> Result<NewComment, ValidationError> {
        if self.submitting.is_some() {
            return Err(ValidationError::RequestInFlight);
        }
        let content = validate_comment_body(&self.root_draft, self.max_chars)?;
        self.submitting = Some(Composer::Root);
        Ok(NewComment {
            task_id: self.task_id.clone(),
            content,
            parent_comment_id: None,
        })
    }

    /// Record the outcome of the in-flight submission.
    ///
    /// On success the composer that submitted is cleared (and the reply
    /// target closed). On failure drafts and target are kept so the user can
    /// retry.
    pub fn complete_submit(&mut self, succeeded: bool) {
        let Some(composer) = self.submitting.take() else {
            return;
        };
        if !succeeded {
            return;
        }
        match composer {
            Composer::Root => self.root_draft.clear(),
            Composer::Reply(parent) => {
                if self.replying_to.as_ref() == Some(&parent) {
                    self.replying_to = None;
                    self.reply_draft.clear();
                }
            }
        }
    }

    /// Forget state for comments that are no longer in the tree.
    pub fn prune(&mut self, roots: &[Comment]) {
        let mut present = HashSet::new();
        walk(roots, |_| true, |c, _| {
            present.insert(c.id.clone());
        });
        self.collapsed.retain(|id| present.contains(id));
        if let Some(target) = &self.replying_to {
            if !present.contains(target) && self.submitting.is_none() {
                self.replying_to = None;
                self.reply_draft.clear();
            }
        }
    }

    /// Rows to render: every comment whose ancestors are all expanded.
    #[must_use]
    pub fn visible_rows<'a>(&self, roots: &'a [Comment]) -> Vec<ThreadRow<'a>> {
        let mut rows = Vec::new();
        walk(
            roots,
            |c| !self.collapsed.contains(&c.id),
            |c, depth| {
                rows.push(ThreadRow {
                    comment: c,
                    depth,
                    reply_count: c.replies.len(),
                    collapsed: self.collapsed.contains(&c.id),
                    is_reply_target: self.replying_to.as_ref() == Some(&c.id),
                });
            },
        );
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_COMMENT_CHARS, ThreadViewState, validate_comment_body};
    use crate::error::ValidationError;
    use crate::model::{Comment, CommentId, TaskId, User};
    use crate::thread::organize_comments;
    use chrono::{TimeZone, Utc};

    fn comment(id: &str, parent: Option<&str>, t: i64) -> Comment {
        Comment {
            id: id.into(),
            task_id: "t1".into(),
            user_id: "u1".into(),
            content: format!("comment {id}"),
            parent_comment_id: parent.map(CommentId::from),
            created_at: Utc.timestamp_opt(t, 0).unwrap(),
            user: Some(User::new("u1", "ada@example.com")),
            replies: Vec::new(),
        }
    }

    fn tree() -> Vec<Comment> {
        organize_comments(&[
            comment("1", None, 10),
            comment("2", Some("1"), 20),
            comment("3", Some("2"), 30),
            comment("4", None, 40),
        ])
    }

    fn visible_ids(state: &ThreadViewState, roots: &[Comment]) -> Vec<String> {
        state
            .visible_rows(roots)
            .iter()
            .map(|r| r.comment.id.to_string())
            .collect()
    }

    #[test]
    fn everything_starts_expanded() {
        let roots = tree();
        let state = ThreadViewState::new(TaskId::from("t1"));
        assert_eq!(visible_ids(&state, &roots), ["1", "2", "3", "4"]);
        let depths: Vec<usize> = state.visible_rows(&roots).iter().map(|r| r.depth).collect();
        assert_eq!(depths, [0, 1, 2, 0]);
    }

    #[test]
    fn collapse_hides_descendants_without_cascading_state() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.toggle_collapse(&CommentId::from("1"));
        assert_eq!(visible_ids(&state, &roots), ["1", "4"]);
        assert!(!state.is_collapsed(&CommentId::from("2")));

        state.toggle_collapse(&CommentId::from("1"));
        assert_eq!(visible_ids(&state, &roots), ["1", "2", "3", "4"]);
    }

    #[test]
    fn only_one_reply_target_at_a_time() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[0]);
        state.initiate_reply(&roots[1]);
        assert_eq!(state.replying_to(), Some(&CommentId::from("4")));
        let targets = state
            .visible_rows(&roots)
            .iter()
            .filter(|r| r.is_reply_target)
            .count();
        assert_eq!(targets, 1);
    }

    #[test]
    fn initiating_reply_expands_target_and_seeds_mention() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.collapse(&CommentId::from("1"));
        state.initiate_reply(&roots[0]);
        assert!(!state.is_collapsed(&CommentId::from("1")));
        assert_eq!(state.reply_draft(), "@ada ");
    }

    #[test]
    fn reinitiating_same_reply_expands_and_keeps_draft() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[0]);
        state.reply_draft_mut().push_str("draft");
        state.toggle_collapse(&CommentId::from("1"));
        assert!(state.is_collapsed(&CommentId::from("1")));

        state.initiate_reply(&roots[0]);
        assert!(!state.is_collapsed(&CommentId::from("1")));
        assert_eq!(state.reply_draft(), "@ada draft");
        assert_eq!(state.replying_to(), Some(&CommentId::from("1")));
    }

    #[test]
    fn collapsing_elsewhere_keeps_reply_draft() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[1]);
        state.reply_draft_mut().push_str("half written");
        state.toggle_collapse(&CommentId::from("1"));
        assert_eq!(state.reply_draft(), "@ada half written");
        assert_eq!(state.replying_to(), Some(&CommentId::from("4")));
    }

    #[test]
    fn successful_reply_clears_target() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[0]);
        state.reply_draft_mut().push_str("agreed");
        let new = state.submit_reply().unwrap();
        assert_eq!(new.content, "@ada agreed");
        assert_eq!(new.parent_comment_id, Some(CommentId::from("1")));
        assert!(state.is_submitting());

        state.complete_submit(true);
        assert!(state.replying_to().is_none());
        assert!(state.reply_draft().is_empty());
    }

    #[test]
    fn failed_reply_is_retryable() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[0]);
        state.reply_draft_mut().push_str("agreed");
        state.submit_reply().unwrap();
        assert_eq!(state.submit_reply(), Err(ValidationError::RequestInFlight));

        state.complete_submit(false);
        assert_eq!(state.replying_to(), Some(&CommentId::from("1")));
        assert!(state.submit_reply().is_ok());
    }

    #[test]
    fn cancel_reply_clears_target() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.initiate_reply(&roots[0]);
        state.cancel_reply();
        assert!(state.replying_to().is_none());
        assert_eq!(state.submit_reply(), Err(ValidationError::NoReplyTarget));
    }

    #[test]
    fn root_composer_rejects_blank_text() {
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.root_draft_mut().push_str("   \n ");
        assert_eq!(state.submit_root(), Err(ValidationError::EmptyComment));
        assert!(!state.is_submitting());
    }

    #[test]
    fn prune_forgets_vanished_comments() {
        let roots = tree();
        let mut state = ThreadViewState::new(TaskId::from("t1"));
        state.collapse(&CommentId::from("gone"));
        state.collapse(&CommentId::from("2"));
        state.prune(&roots);
        assert!(!state.is_collapsed(&CommentId::from("gone")));
        assert!(state.is_collapsed(&CommentId::from("2")));
    }

    #[test]
    fn body_validation_rules() {
        assert_eq!(validate_comment_body("  hi  ", MAX_COMMENT_CHARS).unwrap(), "hi");
        assert!(validate_comment_body("line\nnext\tcol", MAX_COMMENT_CHARS).is_ok());
        assert_eq!(
            validate_comment_body("bell\u{7}", MAX_COMMENT_CHARS),
            Err(ValidationError::ControlCharacters)
        );
        assert_eq!(
            validate_comment_body("abcdef", 3),
            Err(ValidationError::CommentTooLong { max: 3, got: 6 })
        );
    }
}
