//! Fixture generation for relational schemas.
//!
//! Columns get a default generator from their logical type, tables are
//! populated in foreign-key dependency order, and every row set is handed to a
//! [`PersistenceSink`] inside a single transaction.

pub mod cancel;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod foreign;
pub mod generators;
pub mod model;
pub mod output;
pub mod planner;
pub mod sink;

pub use cancel::CancelFlag;
pub use engine::{PopulationRequest, Populator};
pub use errors::{GenerationError, SinkError};
pub use factory::{Row, RowFactory, build_row_factory};
pub use foreign::{ForeignKeyResolver, KeyRegistry};
pub use generators::{GeneratedValue, Generator, KeySequence, OverrideMap, build_generator};
pub use model::{GeneratorConfig, PopulateOptions, PopulationReport, TableReport};
pub use output::CsvSink;
pub use planner::{PopulationPlan, plan_population};
pub use sink::{MemorySink, PersistenceSink};
