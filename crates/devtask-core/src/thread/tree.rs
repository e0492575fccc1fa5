//! Flat comment list to reply tree.
//!
//! The backend returns a task's comments as a flat list where replies point
//! at their parent through `parent_comment_id`. [`organize_comments`] turns
//! that list into root comments with nested `replies`.
//!
//! # Construction
//!
//! The builder works on an arena of input positions plus a parent index, in a
//! fixed number of linear passes:
//!
//! 1. Index comments by id. When an id repeats, the first occurrence is the
//!    one replies attach to; every occurrence still appears in the output.
//! 2. Resolve each `parent_comment_id`. A parent missing from the fetched set
//!    makes the comment a root (an *orphaned reply*).
//! 3. Break parent cycles. A comment whose parent chain never reaches a root
//!    belongs to (or hangs off) a cycle; the member of each cycle that came
//!    first in the input is promoted to a root.
//! 4. Order every sibling list and the root list by `created_at`, ties kept
//!    in input order.
//! 5. Assemble nodes bottom-up from a pre-order of the arena.
//!
//! No step recurses, so neither deep reply chains nor cyclic input can
//! overflow the stack, and every input comment appears exactly once.

use std::collections::HashMap;

use crate::model::{Comment, CommentId};

/// Rebuild the reply tree from a flat comment list.
///
/// Returns the root comments, each with `replies` populated. Whatever the
/// input carried in `replies` is discarded. Total over any input.
#[must_use]
pub fn organize_comments(flat: &[Comment]) -> Vec<Comment> {
    if flat.is_empty() {
        return Vec::new();
    }

    let mut index: HashMap<&CommentId, usize> = HashMap::with_capacity(flat.len());
    for (pos, comment) in flat.iter().enumerate() {
        index.entry(&comment.id).or_insert(pos);
    }

    let mut parent: Vec<Option<usize>> = flat
        .iter()
        .map(|c| {
            c.parent_comment_id
                .as_ref()
                .and_then(|p| index.get(p).copied())
        })
        .collect();

    let promoted = break_cycles(&mut parent);
    if promoted > 0 {
        tracing::debug!(promoted, "comment parent cycle(s) broken");
    }

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    for (pos, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(pos),
            None => roots.push(pos),
        }
    }

    // Positions were pushed in input order, so a stable sort on the
    // timestamp leaves ties in input order.
    roots.sort_by_key(|&pos| flat[pos].created_at);
    for siblings in &mut children {
        siblings.sort_by_key(|&pos| flat[pos].created_at);
    }

    let mut preorder = Vec::with_capacity(flat.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(pos) = stack.pop() {
        preorder.push(pos);
        stack.extend(children[pos].iter().rev());
    }

    let mut built: Vec<Option<Comment>> = vec![None; flat.len()];
    for &pos in preorder.iter().rev() {
        let replies = children[pos]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[pos] = Some(detached(&flat[pos], replies));
    }

    roots
        .iter()
        .filter_map(|&pos| built[pos].take())
        .collect()
}

/// Copy a comment without its (backend-supplied) replies.
fn detached(comment: &Comment, replies: Vec<Comment>) -> Comment {
    Comment {
        id: comment.id.clone(),
        task_id: comment.task_id.clone(),
        user_id: comment.user_id.clone(),
        content: comment.content.clone(),
        parent_comment_id: comment.parent_comment_id.clone(),
        created_at: comment.created_at,
        user: comment.user.clone(),
        replies,
    }
}

/// Detach one member of every parent cycle so all chains end at a root.
///
/// Returns the number of comments promoted to roots.
fn break_cycles(parent: &mut [Option<usize>]) -> usize {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const RESOLVED: u8 = 2;

    let mut state = vec![UNSEEN; parent.len()];
    let mut path_pos = vec![usize::MAX; parent.len()];
    let mut path = Vec::new();
    let mut promoted = 0;

    for start in 0..parent.len() {
        if state[start] == RESOLVED {
            continue;
        }

        path.clear();
        let mut cursor = Some(start);
        while let Some(pos) = cursor {
            match state[pos] {
                RESOLVED => break,
                ON_PATH => {
                    let cycle = &path[path_pos[pos]..];
                    if let Some(&earliest) = cycle.iter().min() {
                        parent[earliest] = None;
                        promoted += 1;
                    }
                    break;
                }
                _ => {
                    state[pos] = ON_PATH;
                    path_pos[pos] = path.len();
                    path.push(pos);
                    cursor = parent[pos];
                }
            }
        }

        for &pos in &path {
            state[pos] = RESOLVED;
        }
    }

    promoted
}

/// Visit every comment in display order (pre-order) with its depth.
///
/// `descend` decides whether the replies of a comment are visited.
pub fn walk<'a>(
    roots: &'a [Comment],
    mut descend: impl FnMut(&'a Comment) -> bool,
    mut visit: impl FnMut(&'a Comment, usize),
) {
    let mut stack: Vec<(&Comment, usize)> = roots.iter().rev().map(|c| (c, 0)).collect();
    while let Some((comment, depth)) = stack.pop() {
        visit(comment, depth);
        if descend(comment) {
            stack.extend(comment.replies.iter().rev().map(|r| (r, depth + 1)));
        }
    }
}

/// Count roots plus every nested reply.
#[must_use]
pub fn count_all(roots: &[Comment]) -> usize {
    let mut count = 0;
    walk(roots, |_| true, |_, _| count += 1);
    count
}

/// Number of levels in the tree (0 for an empty tree, 1 for roots only).
#[must_use]
pub fn max_depth(roots: &[Comment]) -> usize {
    let mut deepest = 0;
    walk(roots, |_| true, |_, depth| deepest = deepest.max(depth + 1));
    deepest
}

/// Find a comment anywhere in the tree.
#[must_use]
pub fn find<'a>(roots: &'a [Comment], id: &CommentId) -> Option<&'a Comment> {
    let mut stack: Vec<&Comment> = roots.iter().rev().collect();
    while let Some(comment) = stack.pop() {
        if &comment.id == id {
            return Some(comment);
        }
        stack.extend(comment.replies.iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{count_all, find, max_depth, organize_comments};
    use crate::model::{Comment, CommentId};
    use chrono::{TimeZone, Utc};

    fn comment(id: &str, parent: Option<&str>, t: i64) -> Comment {
        Comment {
            id: id.into(),
            task_id: "t1".into(),
            user_id: "u1".into(),
            content: format!("comment {id}"),
            parent_comment_id: parent.map(CommentId::from),
            created_at: Utc.timestamp_opt(t, 0).unwrap(),
            user: None,
            replies: Vec::new(),
        }
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(organize_comments(&[]).is_empty());
    }

    #[test]
    fn orphan_reply_becomes_root_and_roots_sort_by_time() {
        let flat = vec![
            comment("1", None, 10),
            comment("2", Some("1"), 20),
            comment("3", Some("99"), 5),
        ];
        let roots = organize_comments(&flat);
        assert_eq!(ids(&roots), vec!["3", "1"]);
        assert_eq!(ids(&roots[1].replies), vec!["2"]);
        assert!(roots[0].replies.is_empty());
    }

    #[test]
    fn input_order_does_not_matter_for_attachment() {
        let flat = vec![
            comment("3", Some("2"), 30),
            comment("2", Some("1"), 20),
            comment("1", None, 10),
        ];
        let roots = organize_comments(&flat);
        assert_eq!(ids(&roots), vec!["1"]);
        assert_eq!(max_depth(&roots), 3);
        assert_eq!(roots[0].replies[0].replies[0].id.as_str(), "3");
    }

    #[test]
    fn ties_keep_input_order() {
        let flat = vec![
            comment("a", None, 10),
            comment("b", None, 10),
            comment("r2", Some("a"), 50),
            comment("r1", Some("a"), 50),
        ];
        let roots = organize_comments(&flat);
        assert_eq!(ids(&roots), vec!["a", "b"]);
        assert_eq!(ids(&roots[0].replies), vec!["r2", "r1"]);
    }

    #[test]
    fn backend_supplied_replies_are_discarded() {
        let mut parent = comment("1", None, 10);
        parent.replies.push(comment("ghost", Some("1"), 11));
        let roots = organize_comments(&[parent, comment("2", Some("1"), 12)]);
        assert_eq!(count_all(&roots), 2);
        assert_eq!(ids(&roots[0].replies), vec!["2"]);
    }

    #[test]
    fn self_parent_is_promoted_to_root() {
        let roots = organize_comments(&[comment("1", Some("1"), 10)]);
        assert_eq!(ids(&roots), vec!["1"]);
    }

    #[test]
    fn cycle_is_broken_at_earliest_input_member() {
        let flat = vec![
            comment("x", None, 1),
            comment("a", Some("c"), 10),
            comment("b", Some("a"), 20),
            comment("c", Some("b"), 30),
            comment("d", Some("c"), 40),
        ];
        let roots = organize_comments(&flat);
        assert_eq!(count_all(&roots), 5);
        assert_eq!(ids(&roots), vec!["x", "a"]);
        let c = find(&roots, &CommentId::from("c")).unwrap();
        assert_eq!(ids(&c.replies), vec!["d"]);
    }

    #[test]
    fn duplicate_ids_all_survive() {
        let flat = vec![
            comment("1", None, 10),
            comment("1", None, 15),
            comment("2", Some("1"), 20),
        ];
        let roots = organize_comments(&flat);
        assert_eq!(count_all(&roots), 3);
        assert_eq!(ids(&roots[0].replies), vec!["2"]);
        assert!(roots[1].replies.is_empty());
    }

    #[test]
    fn deep_chain_builds_and_drops_on_a_small_stack() {
        let mut flat = vec![comment("0", None, 0)];
        for i in 1..50_000 {
            let parent = (i - 1).to_string();
            flat.push(comment(&i.to_string(), Some(&parent), i));
        }
        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || {
                let roots = organize_comments(&flat);
                let counts = (count_all(&roots), max_depth(&roots));
                drop(roots);
                counts
            })
            .unwrap();
        assert_eq!(worker.join().unwrap(), (50_000, 50_000));
    }
}
