use std::fmt;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _, Transaction};
use tracing::debug;

use fixturegen_core::{ColumnDescriptor, LogicalType, TableDescriptor};
use fixturegen_generate::{GeneratedValue, PersistenceSink, Row, SinkError};

use super::{qualified_name, quote_ident};

/// Sink inserting rows into PostgreSQL inside a single transaction.
///
/// Keys are read back with `RETURNING`, so identity and serial columns get
/// the values the database assigned.
pub struct PgSink {
    pool: PgPool,
    schema: Option<String>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: None,
            tx: None,
        }
    }

    /// Qualify table names with `schema` instead of relying on `search_path`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl fmt::Debug for PgSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSink")
            .field("schema", &self.schema)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

fn backend(err: sqlx::Error) -> SinkError {
    SinkError::Backend(err.to_string())
}

fn placeholder_cast(logical_type: &LogicalType) -> &str {
    match logical_type {
        LogicalType::Integer => "bigint",
        LogicalType::VarChar { .. } => "varchar",
        LogicalType::DateTime => "timestamp",
        LogicalType::Date => "date",
        LogicalType::Boolean => "boolean",
        LogicalType::Other { name } => name,
    }
}

/// Render the insert for one row. NULLs are inlined; every other value gets a
/// placeholder cast to the column type.
fn insert_sql(
    schema: Option<&str>,
    table: &TableDescriptor,
    row: &Row,
    key: Option<&ColumnDescriptor>,
) -> (String, Vec<GeneratedValue>) {
    let mut names = Vec::new();
    let mut slots = Vec::new();
    let mut binds = Vec::new();

    for column in &table.columns {
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        names.push(quote_ident(&column.name));
        if value.is_null() {
            slots.push("NULL".to_string());
        } else {
            binds.push(value.clone());
            slots.push(format!(
                "${}::{}",
                binds.len(),
                placeholder_cast(&column.logical_type)
            ));
        }
    }

    let target = qualified_name(schema, &table.name);
    let mut sql = if names.is_empty() {
        format!("INSERT INTO {target} DEFAULT VALUES")
    } else {
        format!(
            "INSERT INTO {target} ({}) VALUES ({})",
            names.join(", "),
            slots.join(", ")
        )
    };

    if let Some(key) = key {
        let cast = match key.logical_type {
            LogicalType::Integer => "bigint",
            _ => "text",
        };
        sql.push_str(&format!(" RETURNING {}::{cast}", quote_ident(&key.name)));
    }

    (sql, binds)
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: GeneratedValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        GeneratedValue::Null => query.bind(None::<String>),
        GeneratedValue::Bool(value) => query.bind(value),
        GeneratedValue::Int(value) => query.bind(value),
        GeneratedValue::Text(value) => query.bind(value),
        GeneratedValue::Date(value) => query.bind(value),
        GeneratedValue::Timestamp(value) => query.bind(value),
    }
}

#[async_trait]
impl PersistenceSink for PgSink {
    async fn begin(&mut self) -> Result<(), SinkError> {
        if self.tx.is_some() {
            return Err(SinkError::Backend("transaction already open".to_string()));
        }
        self.tx = Some(self.pool.begin().await.map_err(backend)?);
        Ok(())
    }

    async fn insert_all(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
    ) -> Result<Vec<GeneratedValue>, SinkError> {
        let tx = self.tx.as_mut().ok_or(SinkError::NoTransaction)?;
        let key = table.returned_column();
        let mut keys = Vec::with_capacity(rows.len());

        for row in rows {
            let (sql, binds) = insert_sql(self.schema.as_deref(), table, row, key);
            let query = binds
                .into_iter()
                .fold(sqlx::query(&sql), bind_value);

            let assigned = match key {
                Some(key) => {
                    let record = query.fetch_one(&mut **tx).await.map_err(backend)?;
                    match key.logical_type {
                        LogicalType::Integer => {
                            GeneratedValue::Int(record.try_get::<i64, _>(0).map_err(backend)?)
                        }
                        _ => record
                            .try_get::<Option<String>, _>(0)
                            .map_err(backend)?
                            .map(GeneratedValue::Text)
                            .unwrap_or(GeneratedValue::Null),
                    }
                }
                None => {
                    query.execute(&mut **tx).await.map_err(backend)?;
                    GeneratedValue::Null
                }
            };
            keys.push(assigned);
        }

        debug!(table = %table.name, rows = rows.len(), "rows inserted");
        Ok(keys)
    }

    async fn commit(&mut self) -> Result<(), SinkError> {
        let tx = self.tx.take().ok_or(SinkError::NoTransaction)?;
        tx.commit().await.map_err(backend)
    }

    async fn rollback(&mut self) -> Result<(), SinkError> {
        let tx = self.tx.take().ok_or(SinkError::NoTransaction)?;
        tx.rollback().await.map_err(backend)
    }
}
