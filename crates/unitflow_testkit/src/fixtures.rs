//! Test schemas.
//!
//! Each fixture creates in-memory databases with their tables and a registry
//! describing the roles stored in them.

use std::sync::Arc;
use unitflow_core::{BelongsTo, Embedded, HasMany, Registry, TableMapper};
use unitflow_storage::{Database, ForeignKey, InMemoryDatabase, TableSchema};

/// Databases plus the registry mapping roles onto them.
#[derive(Debug)]
pub struct Schema {
    /// Databases, in creation order.
    pub databases: Vec<Arc<InMemoryDatabase>>,
    /// Role metadata.
    pub registry: Registry,
}

impl Schema {
    /// Returns the first database.
    pub fn database(&self) -> &Arc<InMemoryDatabase> {
        &self.databases[0]
    }

    /// Returns a database by name.
    pub fn named(&self, name: &str) -> &Arc<InMemoryDatabase> {
        self.databases
            .iter()
            .find(|db| db.name() == name)
            .unwrap_or_else(|| panic!("no database named `{name}`"))
    }
}

/// What deleting a user does to its posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildPolicy {
    /// Posts are deleted first.
    #[default]
    Cascade,
    /// Posts lose their author; `post.author` becomes optional.
    Nullify,
    /// Posts keep the user from being deleted.
    Block,
}

/// Users and posts.
///
/// - `user` (table `users`): `name`, embedded `address` as `address_*`
/// - `post` (table `posts`): `title`, `user_id` referencing `users.id`
/// - `post.author` belongs to `user`
/// - `user.posts` has many `post`
pub fn blog() -> Schema {
    blog_with(ChildPolicy::Cascade)
}

/// [`blog`] with a chosen policy for `user.posts`.
pub fn blog_with(policy: ChildPolicy) -> Schema {
    let db = InMemoryDatabase::new("default");
    db.create_table(TableSchema::new("users", "id").generated());
    db.create_table(
        TableSchema::new("posts", "id")
            .generated()
            .foreign_key(ForeignKey::new("user_id", "users", "id")),
    );
    let db = Arc::new(db);

    let posts = HasMany::new("posts", "post", "id", "user_id")
        .cascade(policy == ChildPolicy::Cascade)
        .nullable(policy == ChildPolicy::Nullify);

    let mut registry = Registry::new();
    registry
        .register(
            TableMapper::new("user", "users", "id", db.clone())
                .columns(["name", "address_city", "address_street"]),
        )
        .register(TableMapper::new("post", "posts", "id", db.clone()).columns(["title", "user_id"]))
        .belongs_to(
            "post",
            BelongsTo::new("author", "user", "user_id", "id").nullable(policy == ChildPolicy::Nullify),
        )
        .has_many("user", posts)
        .embed("user", Embedded::new("address", "address", "address_"));

    Schema {
        databases: vec![db],
        registry,
    }
}

/// Three-level joined-table hierarchy: `person` <- `employee` <- `manager`.
///
/// Child tables share the root's key: `employees.id` references
/// `persons.id`, `managers.id` references `employees.id`.
pub fn hierarchy() -> Schema {
    let db = InMemoryDatabase::new("default");
    db.create_table(TableSchema::new("persons", "id").generated());
    db.create_table(
        TableSchema::new("employees", "id").foreign_key(ForeignKey::new("id", "persons", "id")),
    );
    db.create_table(
        TableSchema::new("managers", "id").foreign_key(ForeignKey::new("id", "employees", "id")),
    );
    let db = Arc::new(db);

    let mut registry = Registry::new();
    registry
        .register(TableMapper::new("person", "persons", "id", db.clone()).columns(["name"]))
        .register(
            TableMapper::new("employee", "employees", "id", db.clone())
                .columns(["salary"])
                .generated(false),
        )
        .register(
            TableMapper::new("manager", "managers", "id", db.clone())
                .columns(["level"])
                .generated(false),
        )
        .extend("employee", "person", "id", "id")
        .extend("manager", "employee", "id", "id");

    Schema {
        databases: vec![db],
        registry,
    }
}

/// Users and posts referencing each other.
///
/// `post.author` is required; `user.favorite` is nullable, so a new user and
/// a new post pointing at each other can be written as insert, insert,
/// update.
pub fn cyclic() -> Schema {
    cyclic_with(true)
}

/// Like [`cyclic`], with `favorite` required when `nullable` is false. The
/// two references then form a cycle no insert order can satisfy.
pub fn cyclic_with(nullable: bool) -> Schema {
    let db = InMemoryDatabase::new("default");
    db.create_table(
        TableSchema::new("users", "id")
            .generated()
            .foreign_key(ForeignKey::new("favorite_id", "posts", "id")),
    );
    db.create_table(
        TableSchema::new("posts", "id")
            .generated()
            .foreign_key(ForeignKey::new("user_id", "users", "id")),
    );
    let db = Arc::new(db);

    let mut registry = Registry::new();
    registry
        .register(TableMapper::new("user", "users", "id", db.clone()).columns(["name", "favorite_id"]))
        .register(TableMapper::new("post", "posts", "id", db.clone()).columns(["title", "user_id"]))
        .belongs_to(
            "user",
            BelongsTo::new("favorite", "post", "favorite_id", "id").nullable(nullable),
        )
        .belongs_to("post", BelongsTo::new("author", "user", "user_id", "id"));

    Schema {
        databases: vec![db],
        registry,
    }
}

/// Users in database `primary`, audit entries in database `audit`.
pub fn split() -> Schema {
    let primary = InMemoryDatabase::new("primary");
    primary.create_table(TableSchema::new("users", "id").generated());
    let audit = InMemoryDatabase::new("audit");
    audit.create_table(TableSchema::new("entries", "id").generated());
    let (primary, audit) = (Arc::new(primary), Arc::new(audit));

    let mut registry = Registry::new();
    registry
        .register(TableMapper::new("user", "users", "id", primary.clone()).columns(["name"]))
        .register(TableMapper::new("entry", "entries", "id", audit.clone()).columns(["message", "user_id"]))
        .belongs_to("entry", BelongsTo::new("user", "user", "user_id", "id"));

    Schema {
        databases: vec![primary, audit],
        registry,
    }
}
