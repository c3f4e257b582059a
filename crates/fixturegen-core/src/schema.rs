use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::LogicalType;

/// Schema snapshot captured once per population run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDescriptor {
    /// Optional label for the schema (database or namespace name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tables in declaration order.
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { name: None, tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// A table and its ordered columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Tables referenced by this table's foreign keys.
    pub fn depends_on(&self) -> BTreeSet<String> {
        self.columns
            .iter()
            .filter_map(|column| column.foreign_key.as_ref())
            .map(|reference| reference.table.clone())
            .collect()
    }

    /// The primary key column, when the key is a single column.
    pub fn key_column(&self) -> Option<&ColumnDescriptor> {
        let mut keys = self.columns.iter().filter(|column| column.primary_key);
        let first = keys.next()?;
        if keys.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// The database-assigned column, if any.
    pub fn identity_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.identity)
    }

    /// Column whose value a sink reports back for each inserted row: the
    /// identity column when there is one, otherwise the single key column.
    pub fn returned_column(&self) -> Option<&ColumnDescriptor> {
        self.identity_column().or_else(|| self.key_column())
    }
}

/// Column metadata consumed by the generator dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    pub logical_type: LogicalType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Value is assigned by the database (serial / identity) and read back after insert.
    #[serde(default)]
    pub identity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ColumnReference>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: false,
            primary_key: false,
            identity: false,
            foreign_key: None,
        }
    }

    /// Database-assigned primary key.
    pub fn identity_key(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Integer)
            .primary_key()
            .identity()
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ColumnReference {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }
}

/// Target of a foreign key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions() -> TableDescriptor {
        TableDescriptor::new(
            "permissions",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("issued_by", LogicalType::Integer).references("users", "id"),
                ColumnDescriptor::new("issued_to", LogicalType::Integer).references("users", "id"),
                ColumnDescriptor::new("can_write", LogicalType::Boolean).nullable(),
            ],
        )
    }

    #[test]
    fn depends_on_collapses_repeated_targets() {
        let deps = permissions().depends_on();
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["users".to_string()]);
    }

    #[test]
    fn key_column_requires_single_primary_key() {
        let table = permissions();
        assert_eq!(table.key_column().map(|c| c.name.as_str()), Some("id"));

        let composite = TableDescriptor::new(
            "memberships",
            vec![
                ColumnDescriptor::new("user_id", LogicalType::Integer).primary_key(),
                ColumnDescriptor::new("group_id", LogicalType::Integer).primary_key(),
            ],
        );
        assert!(composite.key_column().is_none());
        assert!(composite.returned_column().is_none());
    }

    #[test]
    fn identity_is_returned_even_inside_a_composite_key() {
        let table = TableDescriptor::new(
            "grants",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("user_id", LogicalType::Integer)
                    .primary_key()
                    .references("users", "id"),
            ],
        );
        assert!(table.key_column().is_none());
        assert_eq!(table.returned_column().map(|c| c.name.as_str()), Some("id"));
    }
}
