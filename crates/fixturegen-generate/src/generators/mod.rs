//! Column generator dispatch.
//!
//! A [`Generator`] is a thread-safe function from an injected random source to
//! a [`GeneratedValue`]. [`build_generator`] picks the default generator for a
//! column; callers replace individual columns through an [`OverrideMap`].

pub mod keys;
pub mod primitives;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use rand::{Rng, RngCore};
use serde::Serialize;
use tracing::debug;

use fixturegen_core::{ColumnDescriptor, LogicalType};

use crate::errors::GenerationError;
use crate::foreign::ForeignKeyResolver;
use crate::model::GeneratorConfig;

pub use self::keys::KeySequence;

/// Generated value for a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn to_csv(&self) -> String {
        match self {
            GeneratedValue::Null => String::new(),
            GeneratedValue::Bool(value) => value.to_string(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::Text(value) => value.clone(),
            GeneratedValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            GeneratedValue::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for GeneratedValue {
    fn from(value: i64) -> Self {
        GeneratedValue::Int(value)
    }
}

impl From<bool> for GeneratedValue {
    fn from(value: bool) -> Self {
        GeneratedValue::Bool(value)
    }
}

impl From<&str> for GeneratedValue {
    fn from(value: &str) -> Self {
        GeneratedValue::Text(value.to_string())
    }
}

impl From<String> for GeneratedValue {
    fn from(value: String) -> Self {
        GeneratedValue::Text(value)
    }
}

type GeneratorFn = dyn Fn(&mut dyn RngCore) -> Result<GeneratedValue, GenerationError> + Send + Sync;

/// Value-producing function for one column.
#[derive(Clone)]
pub struct Generator {
    id: &'static str,
    inner: Arc<GeneratorFn>,
}

impl Generator {
    pub fn named<F>(id: &'static str, func: F) -> Self
    where
        F: Fn(&mut dyn RngCore) -> Result<GeneratedValue, GenerationError> + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(func),
        }
    }

    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&mut dyn RngCore) -> Result<GeneratedValue, GenerationError> + Send + Sync + 'static,
    {
        Self::named("custom", func)
    }

    /// Always yields `value`.
    pub fn constant(value: impl Into<GeneratedValue>) -> Self {
        let value = value.into();
        Self::named("constant", move |_rng| Ok(value.clone()))
    }

    /// Counts up from `start`. Values are unique; under parallel generation
    /// they are handed out in call order rather than row order.
    pub fn sequence(start: i64) -> Self {
        let next = Arc::new(AtomicI64::new(start));
        Self::named("sequence", move |_rng| {
            Ok(GeneratedValue::Int(next.fetch_add(1, Ordering::Relaxed)))
        })
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn generate(&self, rng: &mut dyn RngCore) -> Result<GeneratedValue, GenerationError> {
        (self.inner)(rng)
    }

    /// Emit NULL with probability `rate`, otherwise defer to `self`.
    pub fn with_null_rate(self, rate: f64) -> Self {
        let id = self.id;
        Self::named(id, move |rng| {
            if rng.random_bool(rate) {
                Ok(GeneratedValue::Null)
            } else {
                self.generate(rng)
            }
        })
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("id", &self.id).finish()
    }
}

/// Caller-supplied generators keyed by column name.
pub type OverrideMap = BTreeMap<String, Generator>;

/// Pick the default generator for `column` of `table`.
///
/// Foreign keys are checked first and sample the keys already recorded for the
/// referenced table; everything else dispatches on the logical type.
pub fn build_generator(
    table: &str,
    column: &ColumnDescriptor,
    resolver: &dyn ForeignKeyResolver,
    config: &GeneratorConfig,
) -> Result<Generator, GenerationError> {
    debug!(
        table,
        column = %column.name,
        logical_type = %column.logical_type,
        foreign_key = column.is_foreign_key(),
        "dispatching column generator"
    );

    let generator = if let Some(reference) = &column.foreign_key {
        let keys = resolver.referenced_keys(reference).ok_or_else(|| {
            GenerationError::UnresolvedReference {
                table: table.to_string(),
                column: column.name.clone(),
                referenced_table: reference.table.clone(),
                referenced_column: reference.column.clone(),
            }
        })?;
        primitives::foreign_key(table, &column.name, reference, keys)
    } else {
        let base_time = config
            .base_time
            .unwrap_or_else(|| chrono::Utc::now().naive_utc());
        match &column.logical_type {
            LogicalType::DateTime => primitives::timestamp(base_time, config.temporal_jitter_days),
            LogicalType::Date => primitives::date(base_time.date(), config.temporal_jitter_days),
            LogicalType::Integer => primitives::int_range(config.int_min, config.int_max),
            LogicalType::VarChar { length } => primitives::url_safe_token(*length),
            LogicalType::Boolean => primitives::boolean(),
            LogicalType::Other { name } => {
                return Err(GenerationError::UnsupportedColumnType {
                    table: table.to_string(),
                    column: column.name.clone(),
                    type_name: name.clone(),
                });
            }
        }
    };

    if column.nullable && config.null_rate > 0.0 {
        Ok(generator.with_null_rate(config.null_rate))
    } else {
        Ok(generator)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::foreign::KeyRegistry;

    fn config() -> GeneratorConfig {
        GeneratorConfig::default().resolved()
    }

    fn sample(generator: &Generator, count: usize) -> Vec<GeneratedValue> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        (0..count)
            .map(|_| generator.generate(&mut rng).expect("generate"))
            .collect()
    }

    #[test]
    fn integer_defaults_stay_in_range_and_vary() {
        let column = ColumnDescriptor::new("quantity", LogicalType::Integer);
        let generator =
            build_generator("items", &column, &KeyRegistry::new(), &config()).expect("generator");

        let values: Vec<i64> = sample(&generator, 10_000)
            .into_iter()
            .map(|value| value.as_i64().expect("int"))
            .collect();
        assert!(values.iter().all(|value| (0..4096).contains(value)));
        let distinct: BTreeSet<_> = values.iter().collect();
        assert!(distinct.len() > 1000);
    }

    #[test]
    fn var_char_never_exceeds_declared_length() {
        for length in [0_u32, 1, 2, 3, 5, 16, 32, 255] {
            let column = ColumnDescriptor::new("token", LogicalType::var_char(length));
            let generator = build_generator("users", &column, &KeyRegistry::new(), &config())
                .expect("generator");
            for value in sample(&generator, 200) {
                let text = value.as_str().expect("text").to_string();
                assert!(text.len() <= length as usize, "{text:?} longer than {length}");
                assert!(
                    text.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                );
            }
        }
    }

    #[test]
    fn temporal_values_vary_around_base_time() {
        let config = config();
        let base = config.base_time.expect("resolved");
        let column = ColumnDescriptor::new("created", LogicalType::DateTime);
        let generator =
            build_generator("users", &column, &KeyRegistry::new(), &config).expect("generator");

        let values = sample(&generator, 50);
        let distinct: BTreeSet<String> = values.iter().map(|v| v.to_csv()).collect();
        assert!(distinct.len() > 1);
        for value in values {
            let GeneratedValue::Timestamp(ts) = value else {
                panic!("expected timestamp, got {value:?}");
            };
            assert!((ts - base).num_days().abs() <= 365);
        }

        let column = ColumnDescriptor::new("born", LogicalType::Date);
        let generator =
            build_generator("users", &column, &KeyRegistry::new(), &config).expect("generator");
        assert!(matches!(sample(&generator, 1)[0], GeneratedValue::Date(_)));
    }

    #[test]
    fn boolean_produces_both_values() {
        let column = ColumnDescriptor::new("is_admin", LogicalType::Boolean);
        let generator =
            build_generator("users", &column, &KeyRegistry::new(), &config()).expect("generator");
        let values: BTreeSet<String> = sample(&generator, 100).iter().map(|v| v.to_csv()).collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn unmapped_type_is_rejected_with_context() {
        let column = ColumnDescriptor::new("payload", LogicalType::other("jsonb"));
        let err = build_generator("events", &column, &KeyRegistry::new(), &config())
            .expect_err("jsonb is unsupported");
        match err {
            GenerationError::UnsupportedColumnType {
                table,
                column,
                type_name,
            } => {
                assert_eq!((table.as_str(), column.as_str(), type_name.as_str()), ("events", "payload", "jsonb"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn foreign_key_to_unpopulated_table_is_unresolved() {
        let column = ColumnDescriptor::new("user_id", LogicalType::Integer).references("users", "id");
        let err = build_generator("orders", &column, &KeyRegistry::new(), &config())
            .expect_err("users not populated");
        assert!(matches!(err, GenerationError::UnresolvedReference { .. }));
    }

    #[test]
    fn nullable_columns_honor_null_rate() {
        let column = ColumnDescriptor::new("alias", LogicalType::var_char(32)).nullable();
        let config = GeneratorConfig {
            null_rate: 1.0,
            ..config()
        };
        let generator =
            build_generator("users", &column, &KeyRegistry::new(), &config).expect("generator");
        assert!(sample(&generator, 20).iter().all(GeneratedValue::is_null));

        let required = ColumnDescriptor::new("name", LogicalType::var_char(32));
        let generator =
            build_generator("users", &required, &KeyRegistry::new(), &config).expect("generator");
        assert!(sample(&generator, 20).iter().all(|v| !v.is_null()));
    }

    #[test]
    fn sequence_counts_up() {
        let generator = Generator::sequence(10);
        let values: Vec<i64> = sample(&generator, 3)
            .iter()
            .filter_map(GeneratedValue::as_i64)
            .collect();
        assert_eq!(values, vec![10, 11, 12]);
    }
}
