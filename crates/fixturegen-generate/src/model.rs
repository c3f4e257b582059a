use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Knobs for the default column generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Inclusive lower bound for integer columns.
    pub int_min: i64,
    /// Exclusive upper bound for integer columns.
    pub int_max: i64,
    /// Temporal values fall within this many days of `base_time`, either side.
    pub temporal_jitter_days: i64,
    /// Probability of emitting NULL for a nullable column.
    pub null_rate: f64,
    /// Anchor for temporal values. `None` means the wall clock at run start.
    pub base_time: Option<NaiveDateTime>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            int_min: 0,
            int_max: 4096,
            temporal_jitter_days: 365,
            null_rate: 0.0,
            base_time: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.int_min >= self.int_max {
            return Err(GenerationError::InvalidConfig(format!(
                "int_min ({}) must be < int_max ({})",
                self.int_min, self.int_max
            )));
        }
        if self.temporal_jitter_days < 0 {
            return Err(GenerationError::InvalidConfig(
                "temporal_jitter_days must be >= 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.null_rate) {
            return Err(GenerationError::InvalidConfig(
                "null_rate must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Pin `base_time` to now when unset, so every generator of a run shares one anchor.
    pub fn resolved(&self) -> Self {
        let mut config = self.clone();
        if config.base_time.is_none() {
            config.base_time = Some(chrono::Utc::now().naive_utc());
        }
        config
    }
}

/// Options for a population run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulateOptions {
    /// Seed for every random draw of the run.
    pub seed: u64,
    /// Row count range used for tables without an explicit count.
    pub default_rows_min: i64,
    pub default_rows_max: i64,
    /// Tables with at least this many rows are generated on worker threads.
    pub parallel_threshold: usize,
    pub workers: usize,
    pub generator: GeneratorConfig,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            default_rows_min: 0,
            default_rows_max: 1000,
            parallel_threshold: 2048,
            workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
            generator: GeneratorConfig::default(),
        }
    }
}

impl PopulateOptions {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.default_rows_min < 0 || self.default_rows_min > self.default_rows_max {
            return Err(GenerationError::InvalidConfig(format!(
                "default row range [{}, {}] is invalid",
                self.default_rows_min, self.default_rows_max
            )));
        }
        self.generator.validate()
    }
}

/// Summary of a populated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_requested: i64,
    pub rows_inserted: u64,
    pub duration_ms: u64,
}

/// Report for a committed population run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationReport {
    pub run_id: String,
    pub seed: u64,
    pub plan: Vec<String>,
    pub tables: Vec<TableReport>,
    pub rows_total: u64,
    pub duration_ms: u64,
}

impl PopulationReport {
    pub fn new(run_id: String, seed: u64, plan: Vec<String>) -> Self {
        Self {
            run_id,
            seed,
            plan,
            tables: Vec::new(),
            rows_total: 0,
            duration_ms: 0,
        }
    }

    pub fn record_table(&mut self, table: TableReport) {
        self.rows_total += table.rows_inserted;
        self.tables.push(table);
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|table| table.table == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_bounds() {
        let config = GeneratorConfig::default();
        assert_eq!((config.int_min, config.int_max), (0, 4096));
        config.validate().expect("defaults are valid");

        let options = PopulateOptions::default();
        assert_eq!((options.default_rows_min, options.default_rows_max), (0, 1000));
        assert!(options.workers >= 1);
    }

    #[test]
    fn rejects_empty_integer_range() {
        let config = GeneratorConfig {
            int_min: 10,
            int_max: 10,
            ..GeneratorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn resolved_pins_base_time_once() {
        let resolved = GeneratorConfig::default().resolved();
        assert!(resolved.base_time.is_some());
        assert_eq!(resolved.resolved().base_time, resolved.base_time);
    }
}
