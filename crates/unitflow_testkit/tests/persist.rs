//! Integration tests for storing entity graphs.

use unitflow_core::{CoreError, Entity, NodeStatus, Related, Task, TaskStatus};
use unitflow_storage::{StatementKind, Value};
use unitflow_testkit::prelude::*;

#[test]
fn master_is_inserted_before_dependent() {
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));

    let result = h.persist(&[post]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(
        h.trace(),
        vec![
            (StatementKind::Insert, "users".to_string()),
            (StatementKind::Insert, "posts".to_string()),
        ]
    );
    let user_key = h.field(user, "id");
    assert_eq!(user_key, Value::Int(1));
    assert_eq!(h.field(post, "user_id"), user_key);

    let row = h.schema.database().row("posts", &h.field(post, "id")).unwrap();
    assert_eq!(row.get("user_id"), Some(&user_key));
}

#[test]
fn persisting_the_parent_stores_its_collection() {
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let posts: Vec<_> = (0..3)
        .map(|i| h.insert(Entity::new("post").with("title", format!("post {i}"))))
        .collect();
    h.entity_mut(user).set_relation("posts", Related::Many(posts.clone()));

    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.count(StatementKind::Insert, "users"), 1);
    assert_eq!(h.count(StatementKind::Insert, "posts"), 3);
    assert_eq!(h.trace()[0], (StatementKind::Insert, "users".to_string()));
    for post in posts {
        assert_eq!(h.field(post, "user_id"), h.field(user, "id"));
    }
}

#[test]
fn joined_table_hierarchy_shares_one_key() {
    let mut h = Harness::new(hierarchy());
    let manager = h.insert(
        Entity::new("manager")
            .with("name", "grace")
            .with("salary", 100)
            .with("level", 3),
    );

    let result = h.persist(&[manager]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(
        h.trace(),
        vec![
            (StatementKind::Insert, "persons".to_string()),
            (StatementKind::Insert, "employees".to_string()),
            (StatementKind::Insert, "managers".to_string()),
        ]
    );
    let key = h.field(manager, "id");
    assert!(!key.is_null());

    let db = h.schema.database();
    assert_eq!(db.row("persons", &key).unwrap().get("name"), Some(&Value::from("grace")));
    assert_eq!(db.row("employees", &key).unwrap().get("salary"), Some(&Value::Int(100)));
    assert_eq!(db.row("managers", &key).unwrap().get("level"), Some(&Value::Int(3)));
}

#[test]
fn hierarchy_update_touches_only_changed_levels() {
    let mut h = Harness::new(hierarchy());
    let manager = h.insert(
        Entity::new("manager")
            .with("name", "grace")
            .with("salary", 100)
            .with("level", 3),
    );
    assert!(h.persist(&[manager]).is_success());
    h.clear_statements();

    h.entity_mut(manager).set("level", 4);
    let result = h.persist(&[manager]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.trace(), vec![(StatementKind::Update, "managers".to_string())]);
    let key = h.field(manager, "id");
    assert_eq!(
        h.schema.database().row("managers", &key).unwrap().get("level"),
        Some(&Value::Int(4))
    );
}

#[test]
fn rerun_without_changes_issues_no_statements() {
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    assert!(h.persist(&[post]).is_success());
    h.clear_statements();

    let result = h.persist(&[post, user]);
    assert!(result.is_success(), "{:?}", result.error());
    assert_eq!(result.report().commands, 0);
    assert!(h.statements().is_empty());
}

#[test]
fn changed_field_produces_one_update() {
    let mut h = Harness::new(blog());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    assert!(h.persist(&[user]).is_success());
    h.clear_statements();

    h.entity_mut(user).set("name", "ada lovelace");
    assert!(h.persist(&[user]).is_success());

    let statements = h.data_statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].kind, StatementKind::Update);
    assert_eq!(statements[0].values.get("name"), Some(&Value::from("ada lovelace")));
    assert_eq!(statements[0].scope.get("id"), Some(&Value::Int(1)));
}

#[test]
fn mutual_references_are_written_insert_insert_update() {
    let mut h = Harness::new(cyclic());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    h.entity_mut(user).set_relation("favorite", Related::One(Some(post)));

    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(
        h.trace(),
        vec![
            (StatementKind::Insert, "users".to_string()),
            (StatementKind::Insert, "posts".to_string()),
            (StatementKind::Update, "users".to_string()),
        ]
    );
    let inserted = &h.data_statements()[0];
    assert_eq!(inserted.values.get("favorite_id"), Some(&Value::Null));

    let row = h.schema.database().row("users", &h.field(user, "id")).unwrap();
    assert_eq!(row.get("favorite_id"), Some(&h.field(post, "id")));
    assert_eq!(h.heap.node(user).unwrap().status(), NodeStatus::Managed);
}

#[test]
fn required_mutual_references_are_left_unresolved() {
    let mut h = Harness::new(cyclic_with(false));
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let post = h.insert(Entity::new("post").with("title", "hello").with_one("author", Some(user)));
    h.entity_mut(user).set_relation("favorite", Related::One(Some(post)));

    let result = h.persist(&[user]);

    let Some(CoreError::UnresolvedRelations { entries }) = result.error() else {
        panic!("expected a scheduling failure, got {:?}", result.error());
    };
    assert!(result.error().unwrap().is_scheduling_failure());
    assert_eq!(entries.len(), 2);
    for (entity, relation) in [(user, "favorite"), (post, "author")] {
        let entry = entries.iter().find(|e| e.entity == entity).unwrap();
        assert_eq!(entry.task, Task::Store);
        assert_eq!(entry.status, TaskStatus::Unprocessed);
        assert_eq!(entry.relations, vec![relation.to_string()]);
    }

    assert!(h.data_statements().is_empty());
    let db = h.schema.database();
    assert_eq!(db.count("users"), 0);
    assert_eq!(db.count("posts"), 0);
    for id in [user, post] {
        assert_eq!(h.heap.node(id).unwrap().status(), NodeStatus::New);
    }
}

#[test]
fn embedded_values_land_in_the_owner_row() {
    let mut h = Harness::new(blog());
    let address = h.insert(
        Entity::new("address")
            .with("city", "Arusha")
            .with("street", "Sokoine"),
    );
    let user = h.insert(Entity::new("user").with("name", "ada").with_one("address", Some(address)));

    let result = h.persist(&[user]);
    assert!(result.is_success(), "{:?}", result.error());

    assert_eq!(h.trace(), vec![(StatementKind::Insert, "users".to_string())]);
    let row = h.schema.database().row("users", &h.field(user, "id")).unwrap();
    assert_eq!(row.get("address_city"), Some(&Value::from("Arusha")));
    assert_eq!(row.get("address_street"), Some(&Value::from("Sokoine")));
}

#[test]
fn records_in_two_databases_commit_together() {
    let mut h = Harness::new(split());
    let user = h.insert(Entity::new("user").with("name", "ada"));
    let entry = h.insert(
        Entity::new("entry")
            .with("message", "created")
            .with_one("user", Some(user)),
    );

    let result = h.persist(&[entry]);
    assert!(result.is_success(), "{:?}", result.error());

    let primary = h.schema.named("primary");
    let audit = h.schema.named("audit");
    assert_eq!(primary.count("users"), 1);
    assert_eq!(audit.count("entries"), 1);
    for db in [primary, audit] {
        let kinds: Vec<_> = db.statements().iter().map(|s| s.kind).collect();
        assert_eq!(kinds.first(), Some(&StatementKind::Begin));
        assert_eq!(kinds.last(), Some(&StatementKind::Commit));
    }
    assert_eq!(h.field(entry, "user_id"), h.field(user, "id"));
}
