use sqlx::PgPool;
use tracing::info;

use fixturegen_core::{LogicalType, Result, TableDescriptor};
use fixturegen_generate::PopulationPlan;

use super::{qualified_name, quote_ident};

fn column_type_sql(logical_type: &LogicalType) -> String {
    match logical_type {
        LogicalType::Integer => "integer".to_string(),
        LogicalType::VarChar { length } => format!("varchar({length})"),
        LogicalType::DateTime => "timestamp".to_string(),
        LogicalType::Date => "date".to_string(),
        LogicalType::Boolean => "boolean".to_string(),
        LogicalType::Other { name } => name.clone(),
    }
}

/// `CREATE TABLE IF NOT EXISTS` statement for `table`.
pub fn create_table_sql(schema: Option<&str>, table: &TableDescriptor) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let mut line = format!(
                "{} {}",
                quote_ident(&column.name),
                column_type_sql(&column.logical_type)
            );
            if column.identity {
                line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            } else if !column.nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();

    let keys: Vec<String> = table
        .columns
        .iter()
        .filter(|column| column.primary_key)
        .map(|column| quote_ident(&column.name))
        .collect();
    if !keys.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    for column in &table.columns {
        if let Some(reference) = &column.foreign_key {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_ident(&column.name),
                qualified_name(schema, &reference.table),
                quote_ident(&reference.column)
            ));
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_name(schema, &table.name),
        lines.join(",\n  ")
    )
}

pub fn drop_table_sql(schema: Option<&str>, table: &TableDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_name(schema, &table.name))
}

/// Create every planned table, parents first, in one transaction.
pub async fn create_tables(pool: &PgPool, schema: Option<&str>, plan: &PopulationPlan) -> Result<usize> {
    let statements = plan
        .tables()
        .iter()
        .map(|table| create_table_sql(schema, table));
    execute_all(pool, statements).await?;
    info!(tables = plan.tables().len(), "tables created");
    Ok(plan.tables().len())
}

/// Drop every planned table, children first, in one transaction.
pub async fn drop_tables(pool: &PgPool, schema: Option<&str>, plan: &PopulationPlan) -> Result<usize> {
    let statements = plan
        .tables()
        .iter()
        .rev()
        .map(|table| drop_table_sql(schema, table));
    execute_all(pool, statements).await?;
    info!(tables = plan.tables().len(), "tables dropped");
    Ok(plan.tables().len())
}

async fn execute_all(pool: &PgPool, statements: impl Iterator<Item = String>) -> Result<()> {
    let db_error = |err: sqlx::Error| fixturegen_core::Error::Db(err.to_string());
    let mut tx = pool.begin().await.map_err(db_error)?;
    for sql in statements {
        sqlx::query(&sql).execute(&mut *tx).await.map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)
}

#[cfg(test)]
mod tests {
    use fixturegen_core::ColumnDescriptor;

    use super::*;

    #[test]
    fn renders_keys_and_references() {
        let table = TableDescriptor::new(
            "child",
            vec![
                ColumnDescriptor::identity_key("id"),
                ColumnDescriptor::new("parent_id", LogicalType::Integer).references("parent", "id"),
                ColumnDescriptor::new("note", LogicalType::var_char(40)).nullable(),
            ],
        );

        assert_eq!(
            create_table_sql(None, &table),
            "CREATE TABLE IF NOT EXISTS \"child\" (\n  \
             \"id\" integer GENERATED BY DEFAULT AS IDENTITY,\n  \
             \"parent_id\" integer NOT NULL,\n  \
             \"note\" varchar(40),\n  \
             PRIMARY KEY (\"id\"),\n  \
             FOREIGN KEY (\"parent_id\") REFERENCES \"parent\" (\"id\")\n)"
        );
    }

    #[test]
    fn drop_is_idempotent() {
        let table = TableDescriptor::new("parent", vec![ColumnDescriptor::identity_key("id")]);
        assert_eq!(
            drop_table_sql(Some("app"), &table),
            "DROP TABLE IF EXISTS \"app\".\"parent\""
        );
    }
}
