//! File-backed persistence sinks.

pub mod csv;

pub use self::csv::CsvSink;
