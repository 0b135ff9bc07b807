//! Integration tests for deleting entities and their children.

use unitflow_core::{CoreError, Entity, EntityId, NodeStatus, Related, Task, TaskStatus};
use unitflow_storage::{StatementKind, Value};
use unitflow_testkit::prelude::*;

/// A stored user with two stored posts.
fn seeded(policy: ChildPolicy) -> (Harness, EntityId, Vec<EntityId>) {
    let mut h = Harness::new(blog_with(policy));
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let posts: Vec<_> = ["hello", "again"]
        .into_iter()
        .map(|title| h.insert(Entity::new("post").with("title", title).with_one("author", Some(user))))
        .collect();
    h.entity_mut(user).set_relation("posts", Related::Many(posts.clone()));

    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());
    h.clear_statements();
    (h, user, posts)
}

#[test]
fn cascade_deletes_children_before_parent() {
    let (mut h, user, posts) = seeded(ChildPolicy::Cascade);

    let result = h.delete(&[user], true);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(
        h.trace(),
        vec![
            (StatementKind::Delete, "posts".to_string()),
            (StatementKind::Delete, "posts".to_string()),
            (StatementKind::Delete, "users".to_string()),
        ]
    );
    let db = h.schema.database();
    assert_eq!(db.count("users"), 0);
    assert_eq!(db.count("posts"), 0);
    for id in posts.into_iter().chain([user]) {
        assert_eq!(h.heap.node(id).unwrap().status(), NodeStatus::Deleted);
    }
}

#[test]
fn nullable_children_lose_their_parent() {
    let (mut h, user, posts) = seeded(ChildPolicy::Nullify);

    let result = h.delete(&[user], true);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(
        h.trace(),
        vec![
            (StatementKind::Update, "posts".to_string()),
            (StatementKind::Update, "posts".to_string()),
            (StatementKind::Delete, "users".to_string()),
        ]
    );
    let db = h.schema.database();
    assert_eq!(db.count("posts"), 2);
    for post in posts {
        let row = db.row("posts", &h.field(post, "id")).unwrap();
        assert_eq!(row.get("user_id"), Some(&Value::Null));
    }
}

#[test]
fn nullified_child_can_be_stored_again() {
    let (mut h, user, posts) = seeded(ChildPolicy::Nullify);

    let result = h.delete(&[user], false);
    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(h.heap.node(user).unwrap().status(), NodeStatus::Deleted);
    for post in &posts {
        assert_eq!(h.entity(*post).relation("author"), Some(&Related::One(None)));
        assert_eq!(
            h.heap.node(*post).unwrap().relations().get("author"),
            Some(&Related::One(None))
        );
    }
    h.clear_statements();

    h.entity_mut(posts[0]).set("title", "edited");
    let result = h.persist(&[posts[0]]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.trace(), vec![(StatementKind::Update, "posts".to_string())]);
    let row = h.schema.database().row("posts", &h.field(posts[0], "id")).unwrap();
    assert_eq!(row.get("title"), Some(&Value::from("edited")));
    assert_eq!(row.get("user_id"), Some(&Value::Null));
}

#[test]
fn reference_to_deleted_parent_is_dropped_or_rejected() {
    let (mut h, user, posts) = seeded(ChildPolicy::Nullify);
    assert!(h.delete(&[user], false).is_success());
    h.clear_statements();

    // Nullable: pointing back at the deleted user clears the reference.
    h.entity_mut(posts[0]).set_relation("author", Related::One(Some(user)));
    let result = h.persist(&[posts[0]]);
    assert!(result.is_success(), "{:?}", result.error());
    assert!(h.data_statements().is_empty());
    assert_eq!(h.entity(posts[0]).relation("author"), Some(&Related::One(None)));

    // Required: a new post can't reference a deleted user.
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    assert!(h.persist(&[user]).is_success());
    assert!(h.delete(&[user], false).is_success());
    h.clear_statements();

    let post = h.insert(Entity::new("post").with("title", "late").with_one("author", Some(user)));
    let result = h.persist(&[post]);
    assert!(matches!(result.error(), Some(CoreError::InvalidRelation { .. })));
    assert!(h.data_statements().is_empty());
    assert_eq!(h.schema.database().count("posts"), 0);
}

#[test]
fn blocked_delete_reports_the_parent() {
    let (mut h, user, _) = seeded(ChildPolicy::Block);

    let result = h.delete(&[user], false);

    let Some(CoreError::UnresolvedRelations { entries }) = result.error() else {
        panic!("expected a scheduling failure, got {:?}", result.error());
    };
    assert!(result.error().unwrap().is_scheduling_failure());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entity, user);
    assert_eq!(entries[0].role, "user");
    assert_eq!(entries[0].task, Task::ForceDelete);
    assert_eq!(entries[0].status, TaskStatus::Unprocessed);
    assert_eq!(entries[0].relations, vec!["posts".to_string()]);

    assert!(h.data_statements().is_empty());
    assert_eq!(h.schema.database().count("users"), 1);
    assert_eq!(h.heap.node(user).unwrap().status(), NodeStatus::Managed);
}

#[test]
fn removed_child_is_deleted_as_orphan() {
    let (mut h, user, posts) = seeded(ChildPolicy::Cascade);

    h.entity_mut(user)
        .set_relation("posts", Related::Many(vec![posts[0]]));
    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.trace(), vec![(StatementKind::Delete, "posts".to_string())]);
    let db = h.schema.database();
    assert_eq!(db.count("posts"), 1);
    assert!(db.row("posts", &h.field(posts[0], "id")).is_some());
}

#[test]
fn removed_nullable_child_is_detached() {
    let (mut h, user, posts) = seeded(ChildPolicy::Nullify);

    h.entity_mut(posts[1]).set_relation("author", Related::One(None));
    h.entity_mut(user)
        .set_relation("posts", Related::Many(vec![posts[0]]));
    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.trace(), vec![(StatementKind::Update, "posts".to_string())]);
    let row = h.schema.database().row("posts", &h.field(posts[1], "id")).unwrap();
    assert_eq!(row.get("user_id"), Some(&Value::Null));
}

#[test]
fn deleting_a_new_entity_issues_nothing() {
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));

    let result = h.delete(&[user], false);
    assert!(result.is_success(), "{:?}", result.error());
    assert!(h.statements().is_empty());
}
