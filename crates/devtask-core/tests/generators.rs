#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use devtask_core::model::{Comment, CommentId, Priority, Status, Task, User, UserId};
use proptest::prelude::*;

/// Comment whose content records its input position, so duplicates of an id
/// can still be told apart.
pub fn comment(pos: usize, id: &str, parent: Option<&str>, t: i64) -> Comment {
    Comment {
        id: id.into(),
        task_id: "t1".into(),
        user_id: "u1".into(),
        content: format!("#{pos}"),
        parent_comment_id: parent.map(CommentId::from),
        created_at: Utc.timestamp_opt(t, 0).unwrap(),
        user: None,
        replies: Vec::new(),
    }
}

/// Flat comment lists with orphans, duplicate ids, self-parents and cycles.
///
/// Ids are drawn from a pool smaller than the list so duplicates occur;
/// parents point into a slightly larger pool so some never resolve.
/// Timestamps come from a narrow range to force ties.
pub fn arb_flat_comments() -> impl Strategy<Value = Vec<Comment>> {
    prop::collection::vec(
        (0usize..30, prop::option::weighted(0.7, 0usize..36), 0i64..12),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(pos, (id, parent, t))| {
                let parent = parent.map(|p| format!("c{p}"));
                comment(pos, &format!("c{id}"), parent.as_deref(), t)
            })
            .collect()
    })
}

pub fn arb_user_id() -> impl Strategy<Value = UserId> {
    (0u8..8).prop_map(|n| UserId::new(format!("u{n}")))
}

pub fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_user_id(),
        prop::option::of(arb_user_id()),
        prop::collection::vec(arb_user_id(), 0..6),
        prop::sample::select(Status::ALL.to_vec()),
    )
        .prop_map(|(owner, legacy, assignees, status)| Task {
            id: "t1".into(),
            title: "generated".into(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            owner: User::new(owner, "owner@example.com"),
            user_id: legacy,
            assignments: assignees
                .into_iter()
                .map(|id| User::new(id, "someone@example.com"))
                .collect(),
            project_id: Some("p1".into()),
            estimated_time: 0.0,
            actual_time: 0.0,
            due_date: None,
            is_completed: false,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        })
}
