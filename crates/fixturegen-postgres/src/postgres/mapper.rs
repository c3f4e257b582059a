use std::collections::BTreeMap;

use tracing::warn;

use fixturegen_core::{ColumnDescriptor, LogicalType, TableDescriptor};

use super::queries::{RawColumn, RawForeignKeyColumn};

/// Map a catalog type name onto a logical type.
///
/// Unbounded `varchar` and everything unrecognized become `Other`, which the
/// generator rejects with the type name attached.
pub fn map_logical_type(udt_name: &str, character_max_length: Option<i32>) -> LogicalType {
    match udt_name {
        "int2" | "int4" | "int8" => LogicalType::Integer,
        "varchar" => match character_max_length {
            Some(length) if length > 0 => LogicalType::var_char(length as u32),
            _ => LogicalType::other("varchar"),
        },
        "timestamp" | "timestamptz" => LogicalType::DateTime,
        "date" => LogicalType::Date,
        "bool" => LogicalType::Boolean,
        other => LogicalType::other(other),
    }
}

/// Assemble the descriptor of one table from its catalog rows.
///
/// Only single-column foreign keys are carried over.
pub fn map_table(
    name: String,
    raw_columns: Vec<RawColumn>,
    primary_key: &[String],
    raw_fks: Vec<RawForeignKeyColumn>,
) -> TableDescriptor {
    let mut constraints: BTreeMap<String, Vec<RawForeignKeyColumn>> = BTreeMap::new();
    for fk in raw_fks {
        constraints.entry(fk.constraint.clone()).or_default().push(fk);
    }

    let mut references = BTreeMap::new();
    for (constraint, mut columns) in constraints {
        if columns.len() != 1 {
            warn!(
                table = %name,
                constraint = %constraint,
                columns = columns.len(),
                "skipping composite foreign key"
            );
            continue;
        }
        if let Some(fk) = columns.pop() {
            references
                .entry(fk.column)
                .or_insert((fk.referenced_table, fk.referenced_column));
        }
    }

    let mut identity_taken = false;
    let columns = raw_columns
        .into_iter()
        .map(|raw| {
            let logical_type = map_logical_type(&raw.udt_name, raw.character_max_length);
            let is_key = primary_key.iter().any(|key| key == &raw.name);
            let mut column = ColumnDescriptor::new(raw.name, logical_type);
            if raw.is_nullable {
                column = column.nullable();
            }
            if is_key {
                column = column.primary_key();
                if raw.is_identity && !identity_taken {
                    identity_taken = true;
                    column = column.identity();
                }
            }
            if let Some((table, referenced)) = references.remove(&column.name) {
                column = column.references(table, referenced);
            }
            column
        })
        .collect();

    TableDescriptor::new(name, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, udt_name: &str, length: Option<i32>, identity: bool) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            udt_name: udt_name.to_string(),
            character_max_length: length,
            is_nullable: false,
            is_identity: identity,
        }
    }

    fn fk(constraint: &str, column: &str, table: &str) -> RawForeignKeyColumn {
        RawForeignKeyColumn {
            constraint: constraint.to_string(),
            column: column.to_string(),
            referenced_table: table.to_string(),
            referenced_column: "id".to_string(),
        }
    }

    #[test]
    fn maps_catalog_types() {
        assert_eq!(map_logical_type("int8", None), LogicalType::Integer);
        assert_eq!(map_logical_type("varchar", Some(40)), LogicalType::var_char(40));
        assert_eq!(map_logical_type("varchar", None), LogicalType::other("varchar"));
        assert_eq!(map_logical_type("timestamptz", None), LogicalType::DateTime);
        assert_eq!(map_logical_type("date", None), LogicalType::Date);
        assert_eq!(map_logical_type("bool", None), LogicalType::Boolean);
        assert_eq!(map_logical_type("text", None), LogicalType::other("text"));
    }

    #[test]
    fn serial_primary_key_becomes_identity() {
        let table = map_table(
            "orders".to_string(),
            vec![
                raw("id", "int4", None, true),
                raw("customer_id", "int4", None, false),
            ],
            &["id".to_string()],
            vec![fk("orders_customer_fk", "customer_id", "customers")],
        );

        let id = table.column("id").expect("id");
        assert!(id.primary_key && id.identity);
        let customer = table.column("customer_id").expect("customer_id");
        let reference = customer.foreign_key.as_ref().expect("reference");
        assert_eq!(reference.table, "customers");
        assert_eq!(reference.column, "id");
    }

    #[test]
    fn identity_survives_inside_a_composite_key() {
        let table = map_table(
            "permissions".to_string(),
            vec![
                raw("idPermissions", "int4", None, true),
                raw("grantedBy", "int4", None, false),
                raw("grantedTo", "int4", None, false),
            ],
            &[
                "idPermissions".to_string(),
                "grantedBy".to_string(),
                "grantedTo".to_string(),
            ],
            vec![
                fk("permissions_by_fk", "grantedBy", "users"),
                fk("permissions_to_fk", "grantedTo", "users"),
            ],
        );

        assert!(table.key_column().is_none());
        assert_eq!(
            table.returned_column().map(|column| column.name.as_str()),
            Some("idPermissions")
        );
        assert!(table.column("grantedBy").is_some_and(|c| c.primary_key && !c.identity));
    }

    #[test]
    fn composite_foreign_keys_are_skipped() {
        let table = map_table(
            "lines".to_string(),
            vec![
                raw("order_id", "int4", None, false),
                raw("line_no", "int4", None, false),
            ],
            &["order_id".to_string(), "line_no".to_string()],
            vec![
                fk("lines_order_fk", "order_id", "orders"),
                fk("lines_order_fk", "line_no", "orders"),
            ],
        );
        assert!(table.columns.iter().all(|column| column.foreign_key.is_none()));
        assert!(table.columns.iter().all(|column| !column.identity));
        assert!(table.key_column().is_none());
    }
}
