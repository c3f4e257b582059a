use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use fixturegen_core::TableDescriptor;

use crate::errors::SinkError;
use crate::factory::Row;
use crate::generators::GeneratedValue;
use crate::sink::{PersistenceSink, assign_keys};

/// Sink writing one `<table>.csv` per table.
///
/// Files are written to a hidden staging directory and only moved into the
/// output directory on commit; a rollback deletes the staging directory.
#[derive(Debug)]
pub struct CsvSink {
    out_dir: PathBuf,
    staging: Option<PathBuf>,
    next_keys: BTreeMap<String, i64>,
    bytes_written: u64,
}

impl CsvSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            staging: None,
            next_keys: BTreeMap::new(),
            bytes_written: 0,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Path the committed file for `table` ends up at.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.out_dir.join(format!("{table}.csv"))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[async_trait]
impl PersistenceSink for CsvSink {
    async fn begin(&mut self) -> Result<(), SinkError> {
        if self.staging.is_some() {
            return Err(SinkError::Backend("transaction already open".to_string()));
        }
        let staging = self
            .out_dir
            .join(format!(".staging-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&staging)?;
        debug!(staging = %staging.display(), "csv staging directory created");
        self.staging = Some(staging);
        Ok(())
    }

    async fn insert_all(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
    ) -> Result<Vec<GeneratedValue>, SinkError> {
        let staging = self.staging.as_ref().ok_or(SinkError::NoTransaction)?;
        let mut rows = rows.to_vec();
        let keys = assign_keys(table, &mut rows, &mut self.next_keys);

        let path = staging.join(format!("{}.csv", table.name));
        let bytes = append_table_csv(&path, table, &rows)?;
        self.bytes_written = self.bytes_written.saturating_add(bytes);
        debug!(table = %table.name, rows = rows.len(), bytes, "csv rows staged");
        Ok(keys)
    }

    async fn commit(&mut self) -> Result<(), SinkError> {
        let staging = self.staging.take().ok_or(SinkError::NoTransaction)?;
        let entries = std::fs::read_dir(&staging)?.collect::<Result<Vec<_>, _>>()?;
        let files = entries.len();
        for entry in entries {
            std::fs::rename(entry.path(), self.out_dir.join(entry.file_name()))?;
        }
        std::fs::remove_dir(&staging)?;
        info!(out_dir = %self.out_dir.display(), files, "csv output committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SinkError> {
        let staging = self.staging.take().ok_or(SinkError::NoTransaction)?;
        std::fs::remove_dir_all(&staging)?;
        Ok(())
    }
}

/// Append rows to `path`, writing the header first when the file is new.
/// Columns follow table order; absent values are written as empty fields.
fn append_table_csv(path: &Path, table: &TableDescriptor, rows: &[Row]) -> Result<u64, SinkError> {
    let is_new = !path.exists();
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;
    let counting = CountingWriter::new(BufWriter::new(file));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    if is_new {
        writer.write_record(table.columns.iter().map(|column| column.name.as_str()))?;
    }

    for row in rows {
        let record: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                row.get(&column.name)
                    .map(GeneratedValue::to_csv)
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
