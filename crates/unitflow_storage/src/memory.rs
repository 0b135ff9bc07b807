//! In-memory relational store.

use crate::database::Database;
use crate::error::{StorageError, StorageResult};
use crate::schema::{OnDelete, TableSchema};
use crate::statement::{Statement, StatementKind};
use crate::value::{Row, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct Table {
    schema: TableSchema,
    rows: BTreeMap<Value, Row>,
    last_key: i64,
}

type Tables = BTreeMap<String, Table>;

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    /// Tables as they were at `begin`, present while a transaction is open.
    snapshot: Option<Tables>,
    journal: Vec<Statement>,
    failures: Vec<(StatementKind, String)>,
}

/// An in-memory relational database.
///
/// This database keeps all tables in memory and is suitable for:
/// - Unit and integration tests
/// - Scenario runs of the command-line tool
/// - Ephemeral data that doesn't need persistence
///
/// Foreign keys are enforced on every statement and referential actions are
/// applied on delete. Every accepted statement is journaled so tests can
/// assert the exact write sequence.
///
/// # Thread Safety
///
/// This database is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use unitflow_storage::{Database, InMemoryDatabase, Row, TableSchema};
///
/// let db = InMemoryDatabase::new("default");
/// db.create_table(TableSchema::new("tags", "id").generated());
/// db.begin().unwrap();
/// db.insert("tags", &Row::new()).unwrap();
/// db.rollback().unwrap();
/// assert_eq!(db.count("tags"), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryDatabase {
    name: String,
    inner: RwLock<Inner>,
}

impl InMemoryDatabase {
    /// Creates a new empty database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Creates a table, replacing any table of the same name.
    pub fn create_table(&self, schema: TableSchema) {
        let name = schema.name.clone();
        self.inner.write().tables.insert(
            name,
            Table {
                schema,
                rows: BTreeMap::new(),
                last_key: 0,
            },
        );
    }

    /// Returns every journaled statement in acceptance order.
    #[must_use]
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.read().journal.clone()
    }

    /// Returns the journaled insert, update and delete statements.
    #[must_use]
    pub fn data_statements(&self) -> Vec<Statement> {
        self.inner
            .read()
            .journal
            .iter()
            .filter(|s| s.kind.is_data())
            .cloned()
            .collect()
    }

    /// Clears the statement journal.
    pub fn clear_statements(&self) {
        self.inner.write().journal.clear();
    }

    /// Returns all rows of a table ordered by key.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the row stored under `key`.
    #[must_use]
    pub fn row(&self, table: &str, key: &Value) -> Option<Row> {
        self.inner
            .read()
            .tables
            .get(table)
            .and_then(|t| t.rows.get(key).cloned())
    }

    /// Returns the number of rows in a table.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.inner
            .read()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Makes the next `kind` statement against `table` fail.
    ///
    /// Useful for exercising rollback paths.
    pub fn fail_next(&self, kind: StatementKind, table: impl Into<String>) {
        self.inner.write().failures.push((kind, table.into()));
    }

    fn take_failure(inner: &mut Inner, kind: StatementKind, table: &str) -> StorageResult<()> {
        if let Some(pos) = inner
            .failures
            .iter()
            .position(|(k, t)| *k == kind && t == table)
        {
            inner.failures.remove(pos);
            return Err(StorageError::Injected(format!("{kind:?} on {table}")));
        }
        Ok(())
    }
}

fn table_mut<'a>(tables: &'a mut Tables, table: &str) -> StorageResult<&'a mut Table> {
    tables.get_mut(table).ok_or_else(|| StorageError::TableNotFound {
        table: table.to_string(),
    })
}

fn matches(row: &Row, scope: &Row) -> bool {
    scope
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

/// Checks every non-null foreign key of `row` against the referenced tables.
fn check_references(tables: &Tables, schema: &TableSchema, row: &Row) -> StorageResult<()> {
    for fk in &schema.foreign_keys {
        let value = row.get(&fk.column).unwrap_or(&Value::Null);
        if value.is_null() {
            continue;
        }
        let parent = tables
            .get(&fk.references)
            .ok_or_else(|| StorageError::TableNotFound {
                table: fk.references.clone(),
            })?;
        let found = parent
            .rows
            .values()
            .any(|r| r.get(&fk.referenced_column) == Some(value));
        if !found {
            return Err(StorageError::ForeignKeyViolation {
                table: schema.name.clone(),
                column: fk.column.clone(),
                references: fk.references.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Removes the given rows and applies referential actions transitively.
fn remove_rows(tables: &mut Tables, table: &str, keys: Vec<Value>) -> StorageResult<()> {
    let mut pending: Vec<(String, Value)> = keys.into_iter().map(|k| (table.to_string(), k)).collect();

    while let Some((table, key)) = pending.pop() {
        let Some(row) = table_mut(tables, &table)?.rows.remove(&key) else {
            continue;
        };

        let referencing: Vec<(String, crate::schema::ForeignKey)> = tables
            .values()
            .flat_map(|t| {
                t.schema
                    .foreign_keys
                    .iter()
                    .filter(|fk| fk.references == table)
                    .map(|fk| (t.schema.name.clone(), fk.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (child_table, fk) in referencing {
            let value = row.get(&fk.referenced_column).cloned().unwrap_or_default();
            if value.is_null() {
                continue;
            }
            let child = table_mut(tables, &child_table)?;
            let hits: Vec<Value> = child
                .rows
                .iter()
                .filter(|(_, r)| r.get(&fk.column) == Some(&value))
                .map(|(k, _)| k.clone())
                .collect();
            if hits.is_empty() {
                continue;
            }
            match fk.on_delete {
                OnDelete::Restrict => {
                    return Err(StorageError::StillReferenced {
                        table,
                        key: key.to_string(),
                        referenced_by: child_table,
                    });
                }
                OnDelete::Cascade => {
                    trace!(table = %child_table, rows = hits.len(), "cascading delete");
                    pending.extend(hits.into_iter().map(|k| (child_table.clone(), k)));
                }
                OnDelete::SetNull => {
                    for k in hits {
                        if let Some(r) = child.rows.get_mut(&k) {
                            r.insert(fk.column.clone(), Value::Null);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

impl Database for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.snapshot.is_some() {
            return Err(StorageError::TransactionActive {
                database: self.name.clone(),
            });
        }
        inner.snapshot = Some(inner.tables.clone());
        inner
            .journal
            .push(Statement::control(&self.name, StatementKind::Begin));
        debug!(database = %self.name, "begin");
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.snapshot.take().is_none() {
            return Err(StorageError::NoTransaction {
                database: self.name.clone(),
            });
        }
        inner
            .journal
            .push(Statement::control(&self.name, StatementKind::Commit));
        debug!(database = %self.name, "commit");
        Ok(())
    }

    fn rollback(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let Some(snapshot) = inner.snapshot.take() else {
            return Err(StorageError::NoTransaction {
                database: self.name.clone(),
            });
        };
        inner.tables = snapshot;
        inner
            .journal
            .push(Statement::control(&self.name, StatementKind::Rollback));
        debug!(database = %self.name, "rollback");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.read().snapshot.is_some()
    }

    fn insert(&self, table: &str, values: &Row) -> StorageResult<Option<Value>> {
        let mut inner = self.inner.write();
        Self::take_failure(&mut inner, StatementKind::Insert, table)?;

        let mut row = values.clone();
        let t = table_mut(&mut inner.tables, table)?;
        let pk = t.schema.primary_key.clone();

        let mut generated = None;
        match row.get(&pk).cloned() {
            Some(Value::Int(explicit)) => t.last_key = t.last_key.max(explicit),
            Some(value) if !value.is_null() => {}
            _ if t.schema.generated => {
                t.last_key += 1;
                let key = Value::Int(t.last_key);
                row.insert(pk.clone(), key.clone());
                generated = Some(key);
            }
            _ => {
                return Err(StorageError::MissingKey {
                    table: table.to_string(),
                    column: pk,
                })
            }
        }

        let key = row.get(&pk).cloned().unwrap_or_default();
        if t.rows.contains_key(&key) {
            return Err(StorageError::DuplicateKey {
                table: table.to_string(),
                key: key.to_string(),
            });
        }

        let schema = t.schema.clone();
        check_references(&inner.tables, &schema, &row)?;

        table_mut(&mut inner.tables, table)?
            .rows
            .insert(key, row.clone());
        inner.journal.push(Statement::data(
            &self.name,
            StatementKind::Insert,
            table,
            row,
            Row::new(),
        ));
        Ok(generated)
    }

    fn update(&self, table: &str, scope: &Row, values: &Row) -> StorageResult<usize> {
        let mut inner = self.inner.write();
        Self::take_failure(&mut inner, StatementKind::Update, table)?;

        let mut staged = inner.tables.clone();
        let t = table_mut(&mut staged, table)?;
        let schema = t.schema.clone();
        let keys: Vec<Value> = t
            .rows
            .iter()
            .filter(|(_, r)| matches(r, scope))
            .map(|(k, _)| k.clone())
            .collect();

        let mut changed = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(row) = t.rows.get_mut(key) {
                row.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                changed.push(row.clone());
            }
        }
        for row in &changed {
            check_references(&staged, &schema, row)?;
        }

        inner.tables = staged;
        inner.journal.push(Statement::data(
            &self.name,
            StatementKind::Update,
            table,
            values.clone(),
            scope.clone(),
        ));
        Ok(keys.len())
    }

    fn delete(&self, table: &str, scope: &Row) -> StorageResult<usize> {
        let mut inner = self.inner.write();
        Self::take_failure(&mut inner, StatementKind::Delete, table)?;

        let mut staged = inner.tables.clone();
        let keys: Vec<Value> = table_mut(&mut staged, table)?
            .rows
            .iter()
            .filter(|(_, r)| matches(r, scope))
            .map(|(k, _)| k.clone())
            .collect();
        let removed = keys.len();
        remove_rows(&mut staged, table, keys)?;

        inner.tables = staged;
        inner.journal.push(Statement::data(
            &self.name,
            StatementKind::Delete,
            table,
            Row::new(),
            scope.clone(),
        ));
        Ok(removed)
    }

    fn fetch(&self, table: &str, scope: &Row) -> StorageResult<Vec<Row>> {
        let inner = self.inner.read();
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound {
                table: table.to_string(),
            })?;
        Ok(t.rows.values().filter(|r| matches(r, scope)).cloned().collect())
    }
}
