//! Distinct values for primary key columns the sink does not assign.
//!
//! Keys are a pure function of the row ordinal (rows issued by a factory so
//! far plus the row index within the batch), so they never repeat within a
//! run and stay identical under parallel generation.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use fixturegen_core::{ColumnDescriptor, ColumnReference, LogicalType};

use crate::errors::GenerationError;
use crate::foreign::ForeignKeyResolver;
use crate::generators::GeneratedValue;
use crate::model::GeneratorConfig;

const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
// 64^11 overflows u64.
const MAX_TOKEN_WIDTH: u32 = 10;

#[derive(Debug, Clone)]
enum KeyKind {
    Integer,
    Token { width: u32 },
    Boolean,
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Reference {
        reference: ColumnReference,
        keys: Arc<[GeneratedValue]>,
    },
}

/// Value source for a single-column primary key.
#[derive(Debug, Clone)]
pub struct KeySequence {
    kind: KeyKind,
}

impl KeySequence {
    /// Pick the key source for `column` of `table`.
    ///
    /// Referencing keys walk the parent keys in recorded order instead of
    /// sampling them.
    pub fn for_column(
        table: &str,
        column: &ColumnDescriptor,
        resolver: &dyn ForeignKeyResolver,
        config: &GeneratorConfig,
    ) -> Result<Self, GenerationError> {
        let kind = if let Some(reference) = &column.foreign_key {
            let keys = resolver.referenced_keys(reference).ok_or_else(|| {
                GenerationError::UnresolvedReference {
                    table: table.to_string(),
                    column: column.name.clone(),
                    referenced_table: reference.table.clone(),
                    referenced_column: reference.column.clone(),
                }
            })?;
            KeyKind::Reference {
                reference: reference.clone(),
                keys,
            }
        } else {
            let base_time = config
                .base_time
                .unwrap_or_else(|| chrono::Utc::now().naive_utc());
            match &column.logical_type {
                LogicalType::Integer => KeyKind::Integer,
                LogicalType::VarChar { length } => KeyKind::Token {
                    width: (*length).min(MAX_TOKEN_WIDTH),
                },
                LogicalType::Boolean => KeyKind::Boolean,
                LogicalType::Date => KeyKind::Date(base_time.date()),
                LogicalType::DateTime => KeyKind::Timestamp(base_time),
                LogicalType::Other { name } => {
                    return Err(GenerationError::UnsupportedColumnType {
                        table: table.to_string(),
                        column: column.name.clone(),
                        type_name: name.clone(),
                    });
                }
            }
        };
        Ok(Self { kind })
    }

    /// Number of distinct values this sequence can produce.
    pub fn capacity(&self) -> u64 {
        match &self.kind {
            KeyKind::Integer => i64::MAX as u64,
            KeyKind::Token { width } => 64_u64.pow(*width),
            KeyKind::Boolean => 2,
            KeyKind::Date(base) => (NaiveDate::MAX - *base).num_days() as u64 + 1,
            KeyKind::Timestamp(base) => (NaiveDateTime::MAX - *base).num_seconds() as u64 + 1,
            KeyKind::Reference { keys, .. } => keys.len() as u64,
        }
    }

    /// Fail unless ordinals `first..first + count` all map to distinct values.
    pub fn check(
        &self,
        table: &str,
        column: &str,
        first: u64,
        count: u64,
    ) -> Result<(), GenerationError> {
        if let KeyKind::Reference { reference, keys } = &self.kind {
            if keys.is_empty() {
                return Err(GenerationError::EmptyReferencedTable {
                    table: table.to_string(),
                    column: column.to_string(),
                    referenced_table: reference.table.clone(),
                    referenced_column: reference.column.clone(),
                });
            }
        }

        let capacity = self.capacity();
        let requested = first.saturating_add(count);
        if requested > capacity {
            return Err(GenerationError::KeySpaceExhausted {
                table: table.to_string(),
                column: column.to_string(),
                capacity,
                requested,
            });
        }
        Ok(())
    }

    /// Key for row `ordinal`; only meaningful below [`KeySequence::capacity`].
    pub fn value(&self, ordinal: u64) -> GeneratedValue {
        match &self.kind {
            KeyKind::Integer => GeneratedValue::Int(1_i64.saturating_add(ordinal as i64)),
            KeyKind::Token { width } => GeneratedValue::Text(encode_token(ordinal, *width)),
            KeyKind::Boolean => GeneratedValue::Bool(ordinal % 2 == 1),
            KeyKind::Date(base) => GeneratedValue::Date(
                base.checked_add_signed(Duration::days(ordinal as i64))
                    .unwrap_or(NaiveDate::MAX),
            ),
            KeyKind::Timestamp(base) => GeneratedValue::Timestamp(
                base.checked_add_signed(Duration::seconds(ordinal as i64))
                    .unwrap_or(NaiveDateTime::MAX),
            ),
            KeyKind::Reference { keys, .. } => keys
                .get(ordinal as usize)
                .cloned()
                .unwrap_or(GeneratedValue::Null),
        }
    }
}

/// Fixed-width base-64 rendering of `ordinal` in the URL-safe alphabet.
fn encode_token(mut ordinal: u64, width: u32) -> String {
    let mut digits = vec![TOKEN_ALPHABET[0]; width as usize];
    for slot in digits.iter_mut().rev() {
        *slot = TOKEN_ALPHABET[(ordinal % 64) as usize];
        ordinal /= 64;
    }
    digits.into_iter().map(char::from).collect()
}
