//! Table definitions.

use serde::{Deserialize, Serialize};

/// Referential action applied to referencing rows when a parent row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnDelete {
    /// Refuse the delete while referencing rows exist.
    #[default]
    Restrict,
    /// Delete referencing rows as well.
    Cascade,
    /// Set the referencing column to `NULL`.
    SetNull,
}

/// A foreign key from a column of one table to a column of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub references: String,
    /// Referenced column.
    pub referenced_column: String,
    /// Action on parent delete.
    pub on_delete: OnDelete,
}

impl ForeignKey {
    /// Creates a restricting foreign key.
    pub fn new(
        column: impl Into<String>,
        references: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            references: references.into(),
            referenced_column: referenced_column.into(),
            on_delete: OnDelete::Restrict,
        }
    }

    /// Sets the referential action.
    #[must_use]
    pub fn on_delete(mut self, action: OnDelete) -> Self {
        self.on_delete = action;
        self
    }
}

/// Definition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Primary key column.
    pub primary_key: String,
    /// Whether the store generates integer keys for rows inserted without one.
    pub generated: bool,
    /// Outgoing foreign keys.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Creates a table keyed by `primary_key` with caller supplied keys.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            generated: false,
            foreign_keys: Vec::new(),
        }
    }

    /// Lets the store generate keys.
    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_pattern() {
        let schema = TableSchema::new("posts", "id")
            .generated()
            .foreign_key(ForeignKey::new("user_id", "users", "id").on_delete(OnDelete::Cascade));

        assert!(schema.generated);
        assert_eq!(schema.foreign_keys.len(), 1);
        assert_eq!(schema.foreign_keys[0].on_delete, OnDelete::Cascade);
    }

    #[test]
    fn foreign_keys_restrict_by_default() {
        let fk = ForeignKey::new("a", "b", "c");
        assert_eq!(fk.on_delete, OnDelete::Restrict);
    }
}
