use thiserror::Error;

/// Errors emitted while planning, generating or populating fixtures.
///
/// Every variant is terminal for the current population run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unsupported column type '{type_name}' for {table}.{column}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        type_name: String,
    },
    #[error("override names unknown column {table}.{column}")]
    UnknownOverrideColumn { table: String, column: String },
    #[error("invalid row count {count} for table '{table}'")]
    InvalidCount { table: String, count: i64 },
    #[error(
        "{table}.{column} references {referenced_table}.{referenced_column}, which has not been populated in this run"
    )]
    UnresolvedReference {
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    #[error(
        "{table}.{column} references {referenced_table}.{referenced_column}, which was populated with zero rows"
    )]
    EmptyReferencedTable {
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    #[error(
        "{table}.{column} is a primary key with room for {capacity} distinct values, {requested} needed"
    )]
    KeySpaceExhausted {
        table: String,
        column: String,
        capacity: u64,
        requested: u64,
    },
    #[error("foreign key cycle between tables: {}", .tables.join(", "))]
    CyclicDependency { tables: Vec<String> },
    #[error("table '{0}' is not part of the schema")]
    UnknownTable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("schema error: {0}")]
    Schema(#[from] fixturegen_core::Error),
    #[error("persisting '{table}' failed: {source}")]
    Persistence {
        table: String,
        #[source]
        source: SinkError,
    },
    #[error("transaction failed: {0}")]
    Transaction(#[source] SinkError),
    #[error("population run cancelled")]
    Cancelled,
}

/// Errors reported by a persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("no open transaction")]
    NoTransaction,
    #[error("sink returned {actual} keys for {expected} rows")]
    KeyCountMismatch { expected: usize, actual: usize },
    #[error("rows rejected: {0}")]
    Rejected(String),
}
