//! The unit of work: resolve, order and execute every requested change.

use super::generator::CommandGenerator;
use super::pool::Pool;
use super::result::{RunReport, RunResult};
use super::runner::Runner;
use super::tuple::{Task, TaskStatus, Tuple};
use crate::config::Config;
use crate::error::{CoreError, CoreResult, Unresolved};
use crate::heap::{EntityId, Heap, NodeStatus, Related, State};
use crate::registry::{RelationMap, Registry};
use crate::relation::{Relation, RelationStatus, Scope};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy)]
struct Request {
    entity: EntityId,
    task: Task,
    cascade: bool,
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    resolved: bool,
    deferred: bool,
}

/// Collects store and delete requests and writes them in one go.
///
/// A run schedules every request in a fresh [`Pool`], resolves relations
/// record by record, executes the generated commands through a [`Runner`]
/// and then either commits everything or rolls everything back:
///
/// - on success every touched entity's state becomes its persisted snapshot
///   and the requests are cleared;
/// - on failure every database is rolled back, every state is restored to
///   what it was when the run started, and the requests are kept so the run
///   can be retried.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use unitflow_core::{Entity, Heap, Registry, TableMapper, UnitOfWork};
/// use unitflow_storage::{InMemoryDatabase, TableSchema};
///
/// let db = InMemoryDatabase::new("default");
/// db.create_table(TableSchema::new("users", "id").generated());
/// let db = Arc::new(db);
///
/// let mut registry = Registry::new();
/// registry.register(TableMapper::new("user", "users", "id", db.clone()));
///
/// let mut heap = Heap::new();
/// let user = heap.insert(Entity::new("user").with("name", "ada"));
///
/// let mut uow = UnitOfWork::new(&mut heap, &registry);
/// uow.persist(user, true).unwrap();
/// assert!(uow.run().is_success());
/// assert_eq!(db.count("users"), 1);
/// ```
pub struct UnitOfWork<'a> {
    heap: &'a mut Heap,
    registry: &'a Registry,
    config: Config,
    generator: CommandGenerator,
    requests: Vec<Request>,
}

impl<'a> UnitOfWork<'a> {
    /// Creates a unit of work with the default configuration.
    pub fn new(heap: &'a mut Heap, registry: &'a Registry) -> Self {
        Self::with_config(heap, registry, Config::default())
    }

    /// Creates a unit of work.
    pub fn with_config(heap: &'a mut Heap, registry: &'a Registry, config: Config) -> Self {
        Self {
            heap,
            registry,
            config,
            generator: CommandGenerator::new(),
            requests: Vec::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    /// Returns the heap mutably, e.g. to modify entities before a retry.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    /// Number of pending requests.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Requests the entity to be stored. Its fields are read when the run
    /// starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn persist(&mut self, entity: EntityId, cascade: bool) -> CoreResult<&mut Self> {
        self.request(entity, Task::Store, cascade)
    }

    /// Requests the entity to be stored with its fields as they are now.
    /// Later changes to the entity are not written by this unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity or its role.
    pub fn persist_state(&mut self, entity: EntityId, cascade: bool) -> CoreResult<&mut Self> {
        let extracted = {
            let data = self
                .heap
                .entity(entity)
                .ok_or_else(|| CoreError::entity_not_found(entity))?;
            self.registry.extract(data)?
        };
        if let Some(node) = self.heap.node_mut(entity) {
            node.get_or_init_state().overlay(extracted);
        }
        self.request(entity, Task::Store, cascade)
    }

    /// Requests the entity to be deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn delete(&mut self, entity: EntityId, cascade: bool) -> CoreResult<&mut Self> {
        self.request(entity, Task::Delete, cascade)
    }

    /// Drops every pending request.
    pub fn clean(&mut self) {
        self.requests.clear();
    }

    fn request(&mut self, entity: EntityId, task: Task, cascade: bool) -> CoreResult<&mut Self> {
        if !self.heap.contains(entity) {
            return Err(CoreError::entity_not_found(entity));
        }
        self.requests.push(Request {
            entity,
            task,
            cascade,
        });
        Ok(self)
    }

    /// Resolves and executes every pending request.
    pub fn run(&mut self) -> RunResult {
        let captured: Vec<(EntityId, State)> = self
            .heap
            .states()
            .map(|(id, state)| (id, state.clone()))
            .collect();
        let mut pool = Pool::new();
        let mut runner = Runner::from_config(&self.config);
        let mut report = RunReport::default();

        debug!(requests = self.requests.len(), "unit of work started");
        if let Err(error) = self.walk(&mut pool, &mut runner, &mut report) {
            return self.abort(&mut runner, captured, report, error);
        }

        report.commands = runner.count();
        if let Err(error) = runner.complete() {
            return self.abort(&mut runner, captured, report, error);
        }

        self.commit_states(&pool);
        self.requests.clear();
        debug!(
            visited = report.visited,
            processed = report.processed,
            commands = report.commands,
            "unit of work committed"
        );
        RunResult::success(report)
    }

    fn abort(
        &mut self,
        runner: &mut Runner,
        captured: Vec<(EntityId, State)>,
        report: RunReport,
        error: CoreError,
    ) -> RunResult {
        warn!(%error, "unit of work failed, rolling back");
        runner.rollback();

        let touched: Vec<EntityId> = self.heap.states().map(|(id, _)| id).collect();
        for id in touched {
            self.heap.reset_state(id);
        }
        for (id, state) in captured {
            self.heap.restore_state(id, Some(state));
        }
        RunResult::failure(report, error)
    }

    fn commit_states(&mut self, pool: &Pool) {
        for tuple in pool.tuples() {
            let id = tuple.entity();
            let Some(data) = self.heap.sync_state(id) else {
                continue;
            };
            if let Some(entity) = self.heap.entity_mut(id) {
                if let Err(error) = self.registry.hydrate(entity, &data) {
                    warn!(%id, %error, "stored values not written back");
                }
            }
        }

        let leftover: Vec<EntityId> = self.heap.states().map(|(id, _)| id).collect();
        for id in leftover {
            self.heap.reset_state(id);
        }
    }

    fn walk(&mut self, pool: &mut Pool, runner: &mut Runner, report: &mut RunReport) -> CoreResult<()> {
        for request in self.requests.clone() {
            let mut scope = Scope::new(pool, &mut *self.heap, self.registry);
            scope.attach(request.entity, request.task, request.cascade)?;
        }

        pool.open()?;
        let drained = self.drain(pool, runner, report);
        pool.close();
        drained?;

        let mut unresolved: Vec<Unresolved> = pool.unresolved().map(|t| self.describe(t)).collect();
        if !unresolved.is_empty() {
            unresolved.sort_by(|a, b| a.role.cmp(&b.role).then(a.entity.cmp(&b.entity)));
            return Err(CoreError::unresolved_relations(unresolved));
        }
        report.processed = pool.tuples().count();
        Ok(())
    }

    fn drain(&mut self, pool: &mut Pool, runner: &mut Runner, report: &mut RunReport) -> CoreResult<()> {
        while let Some(entity) = pool.next_task() {
            report.visited += 1;
            if report.visited > self.config.iteration_limit {
                return Err(CoreError::IterationLimit {
                    limit: self.config.iteration_limit,
                });
            }
            self.resolve(pool, runner, entity)?;
        }
        Ok(())
    }

    /// One visit of one record.
    fn resolve(&mut self, pool: &mut Pool, runner: &mut Runner, entity: EntityId) -> CoreResult<()> {
        let registry = self.registry;
        let generator = self.generator;
        let (task, cascade, role) = {
            let tuple = pool
                .get(entity)
                .ok_or_else(|| CoreError::entity_not_found(entity))?;
            (tuple.task(), tuple.cascade(), tuple.role().to_string())
        };
        let relations = registry.relation_map(&role);
        let related = {
            let data = self
                .heap
                .entity(entity)
                .ok_or_else(|| CoreError::entity_not_found(entity))?;
            registry.mapper(&role)?.fetch_relations(data)
        };

        let mut scope = Scope::new(pool, &mut *self.heap, registry);
        scope.state_mut(entity)?;
        debug!(%entity, role = %role, ?task, status = ?status_of(&scope, entity), "visiting");

        let (own, opposite) = if task.is_delete() {
            (relations.slaves(), relations.masters())
        } else {
            (relations.masters(), relations.slaves())
        };

        let outcome = resolve_set(&mut scope, entity, own, &related)?;
        if outcome.deferred && status_of(&scope, entity) < TaskStatus::Proposed {
            set_status(&mut scope, entity, TaskStatus::Deferred);
        }

        if outcome.resolved {
            if task == Task::Store {
                store(&mut scope, runner, generator, entity, relations, outcome.deferred)?;
            } else if status_of(&scope, entity) == TaskStatus::Preparing {
                set_status(&mut scope, entity, TaskStatus::Waiting);
            } else {
                delete(&mut scope, runner, generator, entity)?;
            }
        }

        if cascade {
            resolve_set(&mut scope, entity, opposite, &related)?;
        }

        if !outcome.resolved && status_of(&scope, entity) == TaskStatus::Preprocessed {
            set_status(&mut scope, entity, TaskStatus::Unprocessed);
        }
        Ok(())
    }

    fn describe(&self, tuple: &Tuple) -> Unresolved {
        let relations = self.registry.relation_map(tuple.role());
        let gating = if tuple.task().is_delete() {
            relations.slaves()
        } else {
            relations.masters()
        };
        let state = self.heap.state(tuple.entity());
        Unresolved {
            entity: tuple.entity(),
            role: tuple.role().to_string(),
            task: tuple.task(),
            status: tuple.status(),
            relations: gating
                .iter()
                .map(|r| r.name())
                .filter(|name| {
                    state.map_or(true, |s| s.relation_status(name) != RelationStatus::Resolved)
                })
                .map(String::from)
                .collect(),
        }
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("config", &self.config)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

fn status_of(scope: &Scope<'_>, entity: EntityId) -> TaskStatus {
    scope.status(entity).unwrap_or(TaskStatus::Processed)
}

fn set_status(scope: &mut Scope<'_>, entity: EntityId, status: TaskStatus) {
    if let Some(tuple) = scope.pool_mut().get_mut(entity) {
        trace!(%entity, from = ?tuple.status(), to = ?status, "status");
        tuple.set_status(status);
    }
}

fn resolve_set(
    scope: &mut Scope<'_>,
    entity: EntityId,
    relations: &[Arc<dyn Relation>],
    related: &BTreeMap<String, Related>,
) -> CoreResult<Outcome> {
    let mut outcome = Outcome {
        resolved: true,
        deferred: false,
    };
    for relation in relations {
        let name = relation.name();
        match scope.relation_status(entity, name) {
            RelationStatus::Resolved => {}
            RelationStatus::Prepare => {
                let value = related.get(name);
                let changed = scope.relation_changed(entity, name, value);
                relation.prepare(scope, entity, value, changed)?;
            }
            RelationStatus::Process | RelationStatus::Deferred => relation.queue(scope, entity)?,
        }
        let status = scope.relation_status(entity, name);
        outcome.resolved &= status.allows_write();
        outcome.deferred |= status == RelationStatus::Deferred;
    }
    Ok(outcome)
}

fn store(
    scope: &mut Scope<'_>,
    runner: &mut Runner,
    generator: CommandGenerator,
    entity: EntityId,
    relations: &RelationMap,
    deferred: bool,
) -> CoreResult<()> {
    for embedded in relations.embedded() {
        embedded.merge(scope, entity)?;
    }

    if let Some(command) = generator.generate_store_command(scope.registry(), scope.heap(), entity)? {
        let output = runner.run(command)?;
        let state = scope.state_mut(entity)?;
        state.register_all(output);
        if state.status() == NodeStatus::New {
            state.set_status(NodeStatus::Managed);
        }
        state.mark_stored();
    }

    let status = status_of(scope, entity);
    let next = if !deferred {
        TaskStatus::Processed
    } else if status >= TaskStatus::Preprocessed {
        TaskStatus::Unprocessed
    } else {
        status.max(TaskStatus::Deferred)
    };
    set_status(scope, entity, next);
    Ok(())
}

fn delete(
    scope: &mut Scope<'_>,
    runner: &mut Runner,
    generator: CommandGenerator,
    entity: EntityId,
) -> CoreResult<()> {
    let stored = scope
        .state(entity)
        .is_some_and(|s| s.status() != NodeStatus::New);
    if stored {
        let command = generator.generate_delete_command(scope.registry(), scope.heap(), entity)?;
        runner.run(command)?;
    }
    scope.state_mut(entity)?.set_status(NodeStatus::ScheduledDelete);
    set_status(scope, entity, TaskStatus::Processed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Entity;
    use crate::mapper::TableMapper;
    use crate::relation::{BelongsTo, HasMany};
    use unitflow_storage::{
        Database, ForeignKey, InMemoryDatabase, OnDelete, StatementKind, TableSchema, Value,
    };

    fn blog() -> (Arc<InMemoryDatabase>, Registry) {
        let db = InMemoryDatabase::new("default");
        db.create_table(TableSchema::new("users", "id").generated());
        db.create_table(
            TableSchema::new("posts", "id")
                .generated()
                .foreign_key(ForeignKey::new("user_id", "users", "id").on_delete(OnDelete::Restrict)),
        );
        let db = Arc::new(db);

        let mut registry = Registry::new();
        registry
            .register(TableMapper::new("user", "users", "id", db.clone()).columns(["name"]))
            .register(TableMapper::new("post", "posts", "id", db.clone()).columns(["title", "user_id"]))
            .belongs_to("post", BelongsTo::new("author", "user", "user_id", "id"));
        (db, registry)
    }

    fn data_kinds(db: &InMemoryDatabase) -> Vec<(StatementKind, String)> {
        db.data_statements()
            .into_iter()
            .map(|s| (s.kind, s.table.unwrap_or_default()))
            .collect()
    }

    #[test]
    fn master_is_inserted_before_dependent() {
        let (db, registry) = blog();
        let mut heap = Heap::new();
        let user = heap.insert(Entity::new("user").with("name", "ada"));
        let post = heap.insert(Entity::new("post").with("title", "hi").with_one("author", Some(user)));

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.persist(post, true).unwrap();
        let result = uow.run();
        assert!(result.is_success(), "{:?}", result.error());
        assert_eq!(result.report().commands, 2);

        assert_eq!(
            data_kinds(&db),
            vec![
                (StatementKind::Insert, "users".to_string()),
                (StatementKind::Insert, "posts".to_string())
            ]
        );
        let user_id = heap.entity(user).unwrap().get("id").cloned().unwrap();
        assert_eq!(heap.entity(post).unwrap().get("user_id"), Some(&user_id));
        assert_eq!(heap.node(post).unwrap().status(), NodeStatus::Managed);
        assert!(heap.node(post).unwrap().state().is_none());
    }

    #[test]
    fn rerun_without_changes_writes_nothing() {
        let (db, registry) = blog();
        let mut heap = Heap::new();
        let user = heap.insert(Entity::new("user").with("name", "ada"));
        let post = heap.insert(Entity::new("post").with("title", "hi").with_one("author", Some(user)));

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.persist(post, true).unwrap();
        assert!(uow.run().is_success());
        db.clear_statements();

        uow.persist(post, true).unwrap();
        let result = uow.run();
        assert!(result.is_success());
        assert_eq!(result.report().commands, 0);
        assert!(db.data_statements().is_empty());
    }

    #[test]
    fn failed_run_restores_state_and_can_be_retried() {
        let (db, registry) = blog();
        let mut heap = Heap::new();
        let user = heap.insert(Entity::new("user").with("name", "ada"));
        let post = heap.insert(Entity::new("post").with("title", "hi").with_one("author", Some(user)));
        db.fail_next(StatementKind::Insert, "posts");

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.persist(post, true).unwrap();
        let result = uow.run();
        assert!(!result.is_success());
        assert!(matches!(result.error(), Some(CoreError::Storage(_))));
        assert_eq!(db.count("users"), 0);
        assert!(uow.heap().node(user).unwrap().state().is_none());
        assert_eq!(uow.heap().node(user).unwrap().status(), NodeStatus::New);
        assert_eq!(uow.pending(), 1);

        let retried = result.retry(&mut uow).unwrap();
        assert!(retried.is_success());
        assert_eq!(db.count("users"), 1);
        assert_eq!(db.count("posts"), 1);
        assert!(retried.retry(&mut uow).is_err());
    }

    #[test]
    fn required_relation_cleared_fails() {
        let (_, registry) = blog();
        let mut heap = Heap::new();
        let post = heap.insert(Entity::new("post").with("title", "hi").with_one("author", None));

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.persist(post, true).unwrap();
        let result = uow.run();
        assert!(matches!(result.error(), Some(CoreError::NullRelation { .. })));
    }

    #[test]
    fn blocked_delete_is_a_scheduling_failure() {
        let (db, mut registry) = blog();
        registry.has_many(
            "user",
            HasMany::new("posts", "post", "id", "user_id").cascade(false),
        );
        db.insert("users", &[("id".to_string(), Value::Int(1))].into_iter().collect()).unwrap();
        db.insert(
            "posts",
            &[("id".to_string(), Value::Int(1)), ("user_id".to_string(), Value::Int(1))]
                .into_iter()
                .collect(),
        )
        .unwrap();
        db.clear_statements();

        let mut heap = Heap::new();
        let post = heap.attach_managed(Entity::new("post").with("id", 1).with("user_id", 1));
        let user = heap.attach_managed(Entity::new("user").with("id", 1).with_many("posts", vec![post]));

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.delete(user, false).unwrap();
        let result = uow.run();

        let Some(CoreError::UnresolvedRelations { entries }) = result.error() else {
            panic!("expected a scheduling failure, got {:?}", result.error());
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[0].relations, vec!["posts".to_string()]);
        assert!(db.data_statements().is_empty());
    }

    #[test]
    fn iteration_limit_stops_the_run() {
        let (_, registry) = blog();
        let mut heap = Heap::new();
        let user = heap.insert(Entity::new("user").with("name", "ada"));
        let post = heap.insert(Entity::new("post").with("title", "hi").with_one("author", Some(user)));

        let mut uow = UnitOfWork::with_config(&mut heap, &registry, Config::new().iteration_limit(1));
        uow.persist(post, true).unwrap();
        let result = uow.run();
        assert!(matches!(result.error(), Some(CoreError::IterationLimit { limit: 1 })));
    }

    #[test]
    fn persist_state_ignores_later_changes() {
        let (db, registry) = blog();
        let mut heap = Heap::new();
        let user = heap.insert(Entity::new("user").with("name", "ada"));

        let mut uow = UnitOfWork::new(&mut heap, &registry);
        uow.persist_state(user, false).unwrap();
        uow.heap_mut().entity_mut(user).unwrap().set("name", "bob");
        assert!(uow.run().is_success());

        assert_eq!(
            db.row("users", &Value::Int(1)).unwrap().get("name"),
            Some(&Value::from("ada"))
        );
    }

    #[test]
    fn unknown_entity_is_rejected() {
        let (_, registry) = blog();
        let mut heap = Heap::new();
        let mut uow = UnitOfWork::new(&mut heap, &registry);
        assert!(uow.persist(EntityId::new(), false).is_err());
        uow.clean();
        assert_eq!(uow.pending(), 0);
    }
}
