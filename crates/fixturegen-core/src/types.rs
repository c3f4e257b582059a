use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Abstract column kind, independent of any schema-description syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicalType {
    Integer,
    /// Bounded character data; generated values never exceed `length` characters.
    VarChar { length: u32 },
    DateTime,
    Date,
    Boolean,
    /// A type the schema source could not map. Generation refuses these.
    Other { name: String },
}

impl LogicalType {
    pub fn var_char(length: u32) -> Self {
        LogicalType::VarChar { length }
    }

    pub fn other(name: impl Into<String>) -> Self {
        LogicalType::Other { name: name.into() }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, LogicalType::Other { .. })
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Integer => f.write_str("INTEGER"),
            LogicalType::VarChar { length } => write!(f, "VARCHAR({length})"),
            LogicalType::DateTime => f.write_str("DATETIME"),
            LogicalType::Date => f.write_str("DATE"),
            LogicalType::Boolean => f.write_str("BOOLEAN"),
            LogicalType::Other { name } => f.write_str(name),
        }
    }
}
