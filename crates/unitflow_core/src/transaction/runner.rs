//! Command execution with per-database transactions.

use crate::command::Command;
use crate::config::{Config, TransactionMode};
use crate::error::{CoreError, CoreResult};
use std::sync::Arc;
use tracing::{debug, warn};
use unitflow_storage::{Database, Row};

/// Executes commands for one unit of work and finishes the transactions it
/// opened.
///
/// Composite commands are flattened; every leaf that ran is kept so its
/// completion or rollback hook can be called once the databases are done.
pub struct Runner {
    mode: TransactionMode,
    strict: bool,
    databases: Vec<Arc<dyn Database>>,
    executed: Vec<Box<dyn Command>>,
    count: usize,
}

impl Runner {
    /// Creates a runner.
    #[must_use]
    pub fn new(mode: TransactionMode, strict: bool) -> Self {
        Self {
            mode,
            strict,
            databases: Vec::new(),
            executed: Vec::new(),
            count: 0,
        }
    }

    /// Creates a runner following a unit of work configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.transaction_mode, config.strict_readiness)
    }

    /// Number of leaves executed (or found already executed) since the last
    /// `complete` or `rollback`.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Names of the databases with a transaction opened by this runner, in
    /// first-use order.
    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.iter().map(|db| db.name())
    }

    /// Executes every leaf of `command` and returns their merged output.
    ///
    /// Each leaf's pre-execution hook sees the leaf executed just before it
    /// within this command.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Leaves executed before it stay recorded for
    /// rollback.
    pub fn run(&mut self, command: Box<dyn Command>) -> CoreResult<Row> {
        let mut output = Row::new();
        let mut chained = false;

        for mut leaf in command.into_leaves() {
            if !leaf.is_executed() {
                let previous = if chained {
                    self.executed.last().map(|c| c.as_ref())
                } else {
                    None
                };
                leaf.before_execute(previous)?;

                if !leaf.is_ready() {
                    if self.strict {
                        return Err(CoreError::command_not_ready(format!("{leaf:?}")));
                    }
                    warn!(command = ?leaf, "skipping command that is not ready");
                    continue;
                }

                if let Some(database) = leaf.database() {
                    self.open(database)?;
                }
                leaf.execute()?;
            }

            output.extend(leaf.output());
            self.count += 1;
            self.executed.push(leaf);
            chained = true;
        }
        Ok(output)
    }

    fn open(&mut self, database: Arc<dyn Database>) -> CoreResult<()> {
        match self.mode {
            TransactionMode::Ignore => Ok(()),
            TransactionMode::Continue => {
                if database.in_transaction() {
                    Ok(())
                } else {
                    Err(CoreError::invalid_operation(format!(
                        "database `{}` has no open transaction to continue",
                        database.name()
                    )))
                }
            }
            TransactionMode::Open => {
                // Identity, not name: two resources may share a name.
                if self.databases.iter().any(|db| Arc::ptr_eq(db, &database)) {
                    return Ok(());
                }
                database.begin()?;
                debug!(database = %database.name(), "transaction opened");
                self.databases.push(database);
                Ok(())
            }
        }
    }

    /// Commits every opened transaction, last opened first, then calls the
    /// completion hooks.
    ///
    /// # Errors
    ///
    /// Returns the first commit failure. Databases not committed yet stay
    /// open so a following [`rollback`](Self::rollback) reaches them.
    pub fn complete(&mut self) -> CoreResult<()> {
        while let Some(database) = self.databases.last() {
            database.commit()?;
            debug!(database = %database.name(), "transaction committed");
            self.databases.pop();
        }
        for command in &mut self.executed {
            command.complete();
        }
        self.executed.clear();
        self.count = 0;
        Ok(())
    }

    /// Rolls back every opened transaction, last opened first, then calls
    /// the rollback hooks in reverse execution order. Rollback failures are
    /// logged and skipped.
    pub fn rollback(&mut self) {
        while let Some(database) = self.databases.pop() {
            match database.rollback() {
                Ok(()) => debug!(database = %database.name(), "transaction rolled back"),
                Err(error) => warn!(database = %database.name(), %error, "rollback failed"),
            }
        }
        for command in self.executed.iter_mut().rev() {
            command.rollback();
        }
        self.executed.clear();
        self.count = 0;
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("mode", &self.mode)
            .field("databases", &self.databases().collect::<Vec<_>>())
            .field("executed", &self.executed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Insert, Linked, Sequence};
    use unitflow_storage::{
        ForeignKey, InMemoryDatabase, StatementKind, TableSchema, Value,
    };

    fn database(name: &str) -> Arc<InMemoryDatabase> {
        let db = InMemoryDatabase::new(name);
        db.create_table(TableSchema::new("users", "id").generated());
        db.create_table(
            TableSchema::new("admins", "id").foreign_key(ForeignKey::new("id", "users", "id")),
        );
        Arc::new(db)
    }

    fn insert(db: &Arc<InMemoryDatabase>, table: &str) -> Box<dyn Command> {
        Box::new(Insert::new(db.clone(), table, "id", Row::new()))
    }

    fn kinds(db: &InMemoryDatabase) -> Vec<StatementKind> {
        db.statements().into_iter().map(|s| s.kind).collect()
    }

    #[test]
    fn opens_one_transaction_per_database() {
        let (a, b) = (database("a"), database("b"));
        let mut runner = Runner::new(TransactionMode::Open, true);
        runner.run(insert(&a, "users")).unwrap();
        runner.run(insert(&b, "users")).unwrap();
        runner.run(insert(&a, "users")).unwrap();

        assert_eq!(runner.count(), 3);
        assert_eq!(runner.databases().collect::<Vec<_>>(), vec!["a", "b"]);
        runner.complete().unwrap();

        assert_eq!(
            kinds(&a),
            vec![StatementKind::Begin, StatementKind::Insert, StatementKind::Insert, StatementKind::Commit]
        );
        assert_eq!(kinds(&b).last(), Some(&StatementKind::Commit));
        assert_eq!(runner.count(), 0);
    }

    #[test]
    fn same_name_databases_get_their_own_transaction() {
        let (a, b) = (database("shared"), database("shared"));
        let mut runner = Runner::new(TransactionMode::Open, true);
        runner.run(insert(&a, "users")).unwrap();
        runner.run(insert(&b, "users")).unwrap();

        assert_eq!(runner.databases().count(), 2);
        runner.complete().unwrap();
        for db in [&a, &b] {
            assert_eq!(
                kinds(db),
                vec![StatementKind::Begin, StatementKind::Insert, StatementKind::Commit]
            );
        }
    }

    #[test]
    fn rollback_discards_every_database() {
        let (a, b) = (database("a"), database("b"));
        let mut runner = Runner::new(TransactionMode::Open, true);
        runner.run(insert(&a, "users")).unwrap();
        runner.run(insert(&b, "users")).unwrap();
        runner.rollback();

        assert_eq!(a.count("users"), 0);
        assert_eq!(b.count("users"), 0);
        assert!(!a.in_transaction());
    }

    #[test]
    fn failed_leaf_keeps_earlier_leaves_for_rollback() {
        let a = database("a");
        a.fail_next(StatementKind::Insert, "admins");
        let mut runner = Runner::new(TransactionMode::Open, true);
        let sequence = Sequence::from(vec![
            insert(&a, "users"),
            Box::new(Linked::new(insert(&a, "admins")).link("id", "id")) as Box<dyn Command>,
        ]);

        assert!(runner.run(Box::new(sequence)).is_err());
        assert_eq!(runner.count(), 1);
        runner.rollback();
        assert_eq!(a.count("users"), 0);
    }

    #[test]
    fn linked_leaf_takes_previous_key() {
        let a = database("a");
        let mut runner = Runner::new(TransactionMode::Open, true);
        let admin = Insert::new(a.clone(), "admins", "id", Row::new()).require("id");
        let sequence = Sequence::from(vec![
            insert(&a, "users"),
            Box::new(Linked::new(Box::new(admin)).link("id", "id")) as Box<dyn Command>,
        ]);

        let output = runner.run(Box::new(sequence)).unwrap();
        runner.complete().unwrap();
        assert_eq!(output.get("id"), Some(&Value::Int(1)));
        assert_eq!(a.count("admins"), 1);
    }

    #[test]
    fn not_ready_command_fails_or_is_skipped() {
        let a = database("a");
        let command = || Box::new(Insert::new(a.clone(), "admins", "id", Row::new()).require("id"));

        let mut strict = Runner::new(TransactionMode::Open, true);
        assert!(matches!(
            strict.run(command()),
            Err(CoreError::CommandNotReady { .. })
        ));

        let mut lenient = Runner::new(TransactionMode::Open, false);
        lenient.run(command()).unwrap();
        assert_eq!(lenient.count(), 0);
    }

    #[test]
    fn continue_mode_requires_open_transaction() {
        let a = database("a");
        let mut runner = Runner::new(TransactionMode::Continue, true);
        assert!(runner.run(insert(&a, "users")).is_err());

        a.begin().unwrap();
        runner.run(insert(&a, "users")).unwrap();
        runner.complete().unwrap();
        assert!(a.in_transaction());
    }

    #[test]
    fn ignore_mode_touches_no_transaction() {
        let a = database("a");
        let mut runner = Runner::new(TransactionMode::Ignore, true);
        runner.run(insert(&a, "users")).unwrap();
        runner.complete().unwrap();
        assert_eq!(kinds(&a), vec![StatementKind::Insert]);
    }

    #[test]
    fn executed_leaves_are_counted_not_rerun() {
        let a = database("a");
        let mut leaf = Insert::new(a.clone(), "users", "id", Row::new());
        leaf.execute().unwrap();

        let mut runner = Runner::new(TransactionMode::Open, true);
        runner.run(Box::new(leaf)).unwrap();
        assert_eq!(runner.count(), 1);
        assert_eq!(a.count("users"), 1);
        assert_eq!(runner.databases().count(), 0);
    }
}
