use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use fixturegen_core::TableDescriptor;

use crate::cancel::CancelFlag;
use crate::errors::GenerationError;
use crate::foreign::ForeignKeyResolver;
use crate::generators::{GeneratedValue, Generator, KeySequence, OverrideMap, build_generator};
use crate::model::GeneratorConfig;

/// One generated table instance, keyed by column name.
pub type Row = BTreeMap<String, GeneratedValue>;

#[derive(Debug)]
enum ColumnSource {
    Random(Generator),
    Key(KeySequence),
}

/// Produces rows for a single table from its resolved column generators.
#[derive(Debug)]
pub struct RowFactory {
    table: String,
    columns: Vec<(String, ColumnSource)>,
    seed: u64,
    batches: AtomicU64,
    issued: AtomicU64,
    parallel_threshold: usize,
    workers: usize,
    cancel: CancelFlag,
}

/// Resolve the effective generator of every column of `table`.
///
/// Overrides are validated against the column set before anything else;
/// identity columns without an override are left to the sink, and any other
/// single-column primary key draws from a [`KeySequence`] so keys never repeat.
pub fn build_row_factory(
    table: &TableDescriptor,
    overrides: &OverrideMap,
    resolver: &dyn ForeignKeyResolver,
    config: &GeneratorConfig,
) -> Result<RowFactory, GenerationError> {
    if let Some(unknown) = overrides.keys().find(|name| table.column(name).is_none()) {
        return Err(GenerationError::UnknownOverrideColumn {
            table: table.name.clone(),
            column: unknown.clone(),
        });
    }

    let key_column = table.key_column().map(|column| column.name.as_str());
    let mut columns = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let source = match overrides.get(&column.name) {
            Some(generator) => ColumnSource::Random(generator.clone()),
            None if column.identity => continue,
            None if Some(column.name.as_str()) == key_column => {
                ColumnSource::Key(KeySequence::for_column(&table.name, column, resolver, config)?)
            }
            None => ColumnSource::Random(build_generator(&table.name, column, resolver, config)?),
        };
        columns.push((column.name.clone(), source));
    }

    debug!(
        table = %table.name,
        columns = columns.len(),
        overrides = overrides.len(),
        "row factory built"
    );

    Ok(RowFactory {
        table: table.name.clone(),
        columns,
        seed: hash_seed(0, &table.name),
        batches: AtomicU64::new(0),
        issued: AtomicU64::new(0),
        parallel_threshold: usize::MAX,
        workers: 1,
        cancel: CancelFlag::new(),
    })
}

impl RowFactory {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate on up to `workers` threads once a batch reaches `threshold` rows.
    pub fn with_parallelism(mut self, threshold: usize, workers: usize) -> Self {
        self.parallel_threshold = threshold;
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Names of the columns this factory fills, in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Produce `count` rows. Rows come back in row-index order whether or not
    /// they were generated in parallel; successive calls yield fresh rows.
    pub fn generate(&self, count: i64) -> Result<Vec<Row>, GenerationError> {
        if count < 0 {
            return Err(GenerationError::InvalidCount {
                table: self.table.clone(),
                count,
            });
        }
        let count = count as u64;
        if count == 0 {
            return Ok(Vec::new());
        }

        let first = self.issued.fetch_add(count, Ordering::Relaxed);
        for (name, source) in &self.columns {
            if let ColumnSource::Key(keys) = source {
                keys.check(&self.table, name, first, count)?;
            }
        }

        let batch = self.batches.fetch_add(1, Ordering::Relaxed);
        let batch = Batch {
            seed: hash_batch_seed(self.seed, batch),
            first,
        };

        if self.workers > 1 && count as usize >= self.parallel_threshold {
            self.generate_parallel(batch, count)
        } else {
            self.generate_range(batch, 0..count)
        }
    }

    fn generate_parallel(&self, batch: Batch, count: u64) -> Result<Vec<Row>, GenerationError> {
        let chunk = count.div_ceil(self.workers as u64);

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..count)
                .step_by(chunk as usize)
                .map(|start| {
                    let end = (start + chunk).min(count);
                    scope.spawn(move || self.generate_range(batch, start..end))
                })
                .collect();

            let mut rows = Vec::with_capacity(count as usize);
            for handle in handles {
                match handle.join() {
                    Ok(chunk_rows) => rows.extend(chunk_rows?),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok(rows)
        })
    }

    fn generate_range(&self, batch: Batch, range: Range<u64>) -> Result<Vec<Row>, GenerationError> {
        self.cancel.check()?;

        let mut rows = Vec::with_capacity((range.end - range.start) as usize);
        for row_index in range {
            let mut rng = ChaCha8Rng::seed_from_u64(hash_row_seed(batch.seed, row_index));
            let mut row = Row::new();
            for (name, source) in &self.columns {
                let value = match source {
                    ColumnSource::Random(generator) => generator.generate(&mut rng)?,
                    ColumnSource::Key(keys) => keys.value(batch.first + row_index),
                };
                row.insert(name.clone(), value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Seed and first row ordinal of one `generate` call.
#[derive(Debug, Clone, Copy)]
struct Batch {
    seed: u64,
    first: u64,
}

pub(crate) fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_batch_seed(seed: u64, batch: u64) -> u64 {
    (seed ^ batch.wrapping_mul(0xbf58476d1ce4e5b9)).wrapping_mul(0x100000001b3)
}

fn hash_row_seed(batch_seed: u64, row_index: u64) -> u64 {
    let hash = batch_seed ^ row_index.wrapping_mul(0x9e3779b97f4a7c15);
    hash.wrapping_mul(0x100000001b3)
}
