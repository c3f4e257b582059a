use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use fixturegen_core::SchemaDescriptor;

use crate::cancel::CancelFlag;
use crate::errors::GenerationError;
use crate::factory::{build_row_factory, hash_seed};
use crate::foreign::KeyRegistry;
use crate::generators::{Generator, OverrideMap};
use crate::model::{GeneratorConfig, PopulateOptions, PopulationReport, TableReport};
use crate::planner::{PopulationPlan, plan_population};
use crate::sink::PersistenceSink;

/// Per-table row counts and column overrides for one population run.
#[derive(Debug, Clone, Default)]
pub struct PopulationRequest {
    counts: BTreeMap<String, i64>,
    overrides: BTreeMap<String, OverrideMap>,
}

impl PopulationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert exactly `count` rows into `table`.
    pub fn rows(mut self, table: impl Into<String>, count: i64) -> Self {
        self.counts.insert(table.into(), count);
        self
    }

    /// Use `generator` for `table.column` instead of the default one.
    pub fn override_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        generator: Generator,
    ) -> Self {
        self.overrides
            .entry(table.into())
            .or_default()
            .insert(column.into(), generator);
        self
    }

    pub fn count(&self, table: &str) -> Option<i64> {
        self.counts.get(table).copied()
    }

    pub fn overrides(&self, table: &str) -> Option<&OverrideMap> {
        self.overrides.get(table)
    }

    /// Reject tables, columns and counts the plan cannot satisfy.
    pub fn validate(&self, plan: &PopulationPlan) -> Result<(), GenerationError> {
        for (table, count) in &self.counts {
            if plan.position(table).is_none() {
                return Err(GenerationError::UnknownTable(table.clone()));
            }
            if *count < 0 {
                return Err(GenerationError::InvalidCount {
                    table: table.clone(),
                    count: *count,
                });
            }
        }

        for (table_name, overrides) in &self.overrides {
            let table = plan
                .tables()
                .iter()
                .find(|table| &table.name == table_name)
                .ok_or_else(|| GenerationError::UnknownTable(table_name.clone()))?;
            if let Some(column) = overrides.keys().find(|column| table.column(column).is_none()) {
                return Err(GenerationError::UnknownOverrideColumn {
                    table: table_name.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Drives a population run: plans the schema, generates each table in
/// dependency order and hands the rows to a [`PersistenceSink`] inside one
/// transaction.
#[derive(Debug, Clone)]
pub struct Populator {
    options: PopulateOptions,
    run_id: Option<String>,
}

enum Interrupted {
    Failed(GenerationError),
    Panicked(Box<dyn Any + Send>),
}

impl From<GenerationError> for Interrupted {
    fn from(err: GenerationError) -> Self {
        Interrupted::Failed(err)
    }
}

impl Populator {
    pub fn new(options: PopulateOptions) -> Self {
        Self {
            options,
            run_id: None,
        }
    }

    /// Report and log under `run_id` instead of a fresh id per run.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn options(&self) -> &PopulateOptions {
        &self.options
    }

    pub fn plan(&self, schema: &SchemaDescriptor) -> Result<PopulationPlan, GenerationError> {
        plan_population(schema)
    }

    pub async fn run<S>(
        &self,
        schema: &SchemaDescriptor,
        request: &PopulationRequest,
        sink: &mut S,
    ) -> Result<PopulationReport, GenerationError>
    where
        S: PersistenceSink + ?Sized,
    {
        self.run_with_cancel(schema, request, sink, &CancelFlag::new())
            .await
    }

    /// Populate every table of `schema`. Either all tables are committed or
    /// the sink is rolled back and the first error is returned.
    pub async fn run_with_cancel<S>(
        &self,
        schema: &SchemaDescriptor,
        request: &PopulationRequest,
        sink: &mut S,
        cancel: &CancelFlag,
    ) -> Result<PopulationReport, GenerationError>
    where
        S: PersistenceSink + ?Sized,
    {
        self.options.validate()?;
        let plan = plan_population(schema)?;
        request.validate(&plan)?;

        let start = Instant::now();
        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config = self.options.generator.resolved();
        let mut report = PopulationReport::new(run_id.clone(), self.options.seed, plan.table_names());

        info!(
            run_id = %run_id,
            tables = plan.tables().len(),
            seed = self.options.seed,
            "population started"
        );

        sink.begin().await.map_err(GenerationError::Transaction)?;

        let mut keys = KeyRegistry::new();
        let outcome = self
            .populate_tables(&plan, request, &config, sink, cancel, &mut keys, &mut report)
            .await;

        match outcome {
            Ok(()) => {
                if let Err(err) = sink.commit().await {
                    warn!(run_id = %run_id, error = %err, "commit failed");
                    return Err(GenerationError::Transaction(err));
                }
                report.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    run_id = %run_id,
                    tables = report.tables.len(),
                    rows_total = report.rows_total,
                    duration_ms = report.duration_ms,
                    "population committed"
                );
                Ok(report)
            }
            Err(Interrupted::Failed(err)) => {
                warn!(run_id = %run_id, error = %err, "population failed, rolling back");
                rollback(sink, &run_id).await;
                keys.clear();
                Err(err)
            }
            Err(Interrupted::Panicked(panic)) => {
                warn!(run_id = %run_id, "generator panicked, rolling back");
                rollback(sink, &run_id).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn populate_tables<S>(
        &self,
        plan: &PopulationPlan,
        request: &PopulationRequest,
        config: &GeneratorConfig,
        sink: &mut S,
        cancel: &CancelFlag,
        keys: &mut KeyRegistry,
        report: &mut PopulationReport,
    ) -> Result<(), Interrupted>
    where
        S: PersistenceSink + ?Sized,
    {
        let mut count_rng = ChaCha8Rng::seed_from_u64(hash_seed(self.options.seed, "row-counts"));
        let no_overrides = OverrideMap::new();

        for table in plan.tables() {
            cancel.check()?;
            let table_start = Instant::now();

            let count = match request.count(&table.name) {
                Some(count) => count,
                None => count_rng
                    .random_range(self.options.default_rows_min..=self.options.default_rows_max),
            };
            let overrides = request.overrides(&table.name).unwrap_or(&no_overrides);

            info!(table = %table.name, rows = count, overrides = overrides.len(), "populating table");

            let factory = build_row_factory(table, overrides, &*keys, config)?
                .with_seed(hash_seed(self.options.seed, &table.name))
                .with_parallelism(self.options.parallel_threshold, self.options.workers)
                .with_cancel(cancel.clone());

            let rows = std::panic::catch_unwind(AssertUnwindSafe(|| factory.generate(count)))
                .map_err(Interrupted::Panicked)??;

            let inserted = sink
                .insert_all(table, &rows)
                .await
                .map_err(|source| GenerationError::Persistence {
                    table: table.name.clone(),
                    source,
                })?;
            keys.record_table(table, &rows, &inserted)?;

            let table_report = TableReport {
                table: table.name.clone(),
                rows_requested: count,
                rows_inserted: inserted.len() as u64,
                duration_ms: table_start.elapsed().as_millis() as u64,
            };
            info!(
                table = %table.name,
                rows_inserted = table_report.rows_inserted,
                duration_ms = table_report.duration_ms,
                "table populated"
            );
            report.record_table(table_report);
        }

        Ok(())
    }
}

async fn rollback<S>(sink: &mut S, run_id: &str)
where
    S: PersistenceSink + ?Sized,
{
    if let Err(err) = sink.rollback().await {
        warn!(run_id = %run_id, error = %err, "rollback failed");
    }
}
