use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use fixturegen_core::TableDescriptor;

use crate::errors::SinkError;
use crate::factory::Row;
use crate::generators::GeneratedValue;

/// Transactional destination for generated rows.
///
/// A population run calls `begin` once, `insert_all` once per table in plan
/// order, then either `commit` or `rollback`.
#[async_trait]
pub trait PersistenceSink: Send {
    async fn begin(&mut self) -> Result<(), SinkError>;

    /// Persist `rows` and return the key of each row, in row order.
    ///
    /// The key is the value of [`TableDescriptor::returned_column`]; tables
    /// without one yield `GeneratedValue::Null` keys.
    async fn insert_all(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
    ) -> Result<Vec<GeneratedValue>, SinkError>;

    async fn commit(&mut self) -> Result<(), SinkError>;

    async fn rollback(&mut self) -> Result<(), SinkError>;
}

/// Fill identity columns the way a database sequence would and collect the
/// key of every row.
///
/// Each identity column has its own counter in `next_keys`, keyed by
/// `table.column`. Counters are never rewound, so keys stay unique across
/// rolled back transactions.
pub(crate) fn assign_keys(
    table: &TableDescriptor,
    rows: &mut [Row],
    next_keys: &mut BTreeMap<String, i64>,
) -> Vec<GeneratedValue> {
    if let Some(identity) = table.identity_column() {
        let next = next_keys
            .entry(format!("{}.{}", table.name, identity.name))
            .or_insert(1);
        for row in rows.iter_mut() {
            if !row.contains_key(&identity.name) {
                row.insert(identity.name.clone(), GeneratedValue::Int(*next));
                *next += 1;
            }
        }
    }

    let Some(returned) = table.returned_column() else {
        return vec![GeneratedValue::Null; rows.len()];
    };
    rows.iter()
        .map(|row| row.get(&returned.name).cloned().unwrap_or(GeneratedValue::Null))
        .collect()
}

/// Sink that keeps rows in memory; mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    staged: Option<BTreeMap<String, Vec<Row>>>,
    committed: BTreeMap<String, Vec<Row>>,
    next_keys: BTreeMap<String, i64>,
    fail_on: Option<String>,
    rollbacks: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every insert into `table`.
    pub fn fail_on_table(mut self, table: impl Into<String>) -> Self {
        self.fail_on = Some(table.into());
        self
    }

    /// Committed rows of `table`, keys included.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.committed
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.committed.keys().map(String::as_str)
    }

    pub fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn begin(&mut self) -> Result<(), SinkError> {
        if self.staged.is_some() {
            return Err(SinkError::Backend("transaction already open".to_string()));
        }
        self.staged = Some(BTreeMap::new());
        Ok(())
    }

    async fn insert_all(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
    ) -> Result<Vec<GeneratedValue>, SinkError> {
        let staged = self.staged.as_mut().ok_or(SinkError::NoTransaction)?;
        if self.fail_on.as_deref() == Some(table.name.as_str()) {
            return Err(SinkError::Rejected(format!(
                "inserts into '{}' are disabled",
                table.name
            )));
        }

        let mut rows = rows.to_vec();
        let keys = assign_keys(table, &mut rows, &mut self.next_keys);
        debug!(table = %table.name, rows = rows.len(), "rows staged in memory");
        staged.entry(table.name.clone()).or_default().extend(rows);
        Ok(keys)
    }

    async fn commit(&mut self) -> Result<(), SinkError> {
        let staged = self.staged.take().ok_or(SinkError::NoTransaction)?;
        for (table, rows) in staged {
            self.committed.entry(table).or_default().extend(rows);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SinkError> {
        self.staged.take().ok_or(SinkError::NoTransaction)?;
        self.rollbacks += 1;
        Ok(())
    }
}
