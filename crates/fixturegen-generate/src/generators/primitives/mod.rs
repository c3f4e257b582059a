use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;

use fixturegen_core::ColumnReference;

use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, Generator};

const SECONDS_PER_DAY: i64 = 86_400;

/// Uniform integer in `[min, max)`.
pub fn int_range(min: i64, max: i64) -> Generator {
    Generator::named("primitive.int", move |rng| {
        Ok(GeneratedValue::Int(rng.random_range(min..max)))
    })
}

/// URL-safe base64 token of random bytes, never longer than `length`.
pub fn url_safe_token(length: u32) -> Generator {
    // Unpadded base64 emits ceil(4n/3) characters for n bytes.
    let byte_count = (length as usize).saturating_mul(3) / 4;
    Generator::named("primitive.token", move |rng| {
        let mut bytes = vec![0_u8; byte_count];
        rng.fill_bytes(&mut bytes);
        Ok(GeneratedValue::Text(URL_SAFE_NO_PAD.encode(&bytes)))
    })
}

/// Instant within `jitter_days` of `base`, second resolution.
pub fn timestamp(base: NaiveDateTime, jitter_days: i64) -> Generator {
    let span = jitter_days.saturating_mul(SECONDS_PER_DAY);
    Generator::named("primitive.timestamp", move |rng| {
        let offset = rng.random_range(-span..=span);
        let value = base
            .checked_add_signed(Duration::seconds(offset))
            .unwrap_or(base);
        Ok(GeneratedValue::Timestamp(value))
    })
}

/// Day within `jitter_days` of `base`.
pub fn date(base: NaiveDate, jitter_days: i64) -> Generator {
    Generator::named("primitive.date", move |rng| {
        let offset = rng.random_range(-jitter_days..=jitter_days);
        let value = base
            .checked_add_signed(Duration::days(offset))
            .unwrap_or(base);
        Ok(GeneratedValue::Date(value))
    })
}

pub fn boolean() -> Generator {
    Generator::named("primitive.bool", |rng| {
        Ok(GeneratedValue::Bool(rng.random_bool(0.5)))
    })
}

/// Uniform draw from the keys recorded for the referenced column.
///
/// An empty key set is only an error once a value is actually requested.
pub fn foreign_key(
    table: &str,
    column: &str,
    reference: &ColumnReference,
    keys: Arc<[GeneratedValue]>,
) -> Generator {
    let table = table.to_string();
    let column = column.to_string();
    let reference = reference.clone();
    Generator::named("reference.sample", move |rng| {
        if keys.is_empty() {
            return Err(GenerationError::EmptyReferencedTable {
                table: table.clone(),
                column: column.clone(),
                referenced_table: reference.table.clone(),
                referenced_column: reference.column.clone(),
            });
        }
        Ok(keys[rng.random_range(0..keys.len())].clone())
    })
}
