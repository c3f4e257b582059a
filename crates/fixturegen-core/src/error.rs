use thiserror::Error;

/// Core error type shared across fixturegen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error or adapter failure.
    #[error("database error: {0}")]
    Db(String),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A schema document failed JSON Schema validation.
    #[error("schema document rejected: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml decode error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias for results returned by fixturegen crates.
pub type Result<T> = std::result::Result<T, Error>;
