use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::SchemaDescriptor;

/// Validate internal consistency of a schema descriptor.
///
/// This checks:
/// - duplicate tables/columns
/// - foreign key targets exist
/// - identity columns are integer primary keys, at most one per table
pub fn validate_schema(schema: &SchemaDescriptor) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for table in &schema.tables {
        if catalog.contains_key(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }

        catalog.insert(table.name.as_str(), columns);
    }

    for table in &schema.tables {
        if table.columns.iter().filter(|column| column.identity).count() > 1 {
            return Err(Error::InvalidSchema(format!(
                "more than one identity column in table: {}",
                table.name
            )));
        }

        for column in &table.columns {
            if column.identity && !column.primary_key {
                return Err(Error::InvalidSchema(format!(
                    "identity column must be a primary key: {}.{}",
                    table.name, column.name
                )));
            }

            let Some(reference) = &column.foreign_key else {
                continue;
            };

            let ref_columns = catalog.get(reference.table.as_str()).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "referenced table not found: {}.{} -> {}",
                    table.name, column.name, reference.table
                ))
            })?;

            if !ref_columns.contains(reference.column.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "referenced column not found: {}.{} -> {}.{}",
                    table.name, column.name, reference.table, reference.column
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, TableDescriptor};
    use crate::types::LogicalType;

    #[test]
    fn rejects_duplicate_columns() {
        let schema = SchemaDescriptor::new(vec![TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("id", LogicalType::Integer),
            ],
        )]);

        let err = validate_schema(&schema).expect_err("duplicate column");
        assert!(err.to_string().contains("users.id"));
    }

    #[test]
    fn rejects_missing_reference_target() {
        let schema = SchemaDescriptor::new(vec![TableDescriptor::new(
            "orders",
            vec![ColumnDescriptor::new("user_id", LogicalType::Integer).references("users", "id")],
        )]);

        assert!(matches!(
            validate_schema(&schema),
            Err(Error::InvalidSchema(message)) if message.contains("referenced table not found")
        ));
    }

    #[test]
    fn rejects_missing_reference_column() {
        let schema = SchemaDescriptor::new(vec![
            TableDescriptor::new("users", vec![ColumnDescriptor::identity_key("id")]),
            TableDescriptor::new(
                "orders",
                vec![ColumnDescriptor::new("user_id", LogicalType::Integer)
                    .references("users", "uuid")],
            ),
        ]);

        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn rejects_second_identity_column() {
        let schema = SchemaDescriptor::new(vec![TableDescriptor::new(
            "tickets",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::identity_key("serial_no"),
            ],
        )]);

        assert!(matches!(
            validate_schema(&schema),
            Err(Error::InvalidSchema(message)) if message.contains("more than one identity column")
        ));
    }

    #[test]
    fn accepts_well_formed_schema() {
        let schema = SchemaDescriptor::new(vec![
            TableDescriptor::new("users", vec![ColumnDescriptor::identity_key("id")]),
            TableDescriptor::new(
                "orders",
                vec![
                    ColumnDescriptor::identity_key("id"),
                    ColumnDescriptor::new("user_id", LogicalType::Integer).references("users", "id"),
                ],
            ),
        ]);

        validate_schema(&schema).expect("valid schema");
    }
}
