use std::collections::BTreeMap;
use std::sync::Arc;

use fixturegen_core::{ColumnReference, TableDescriptor};

use crate::errors::{GenerationError, SinkError};
use crate::factory::Row;
use crate::generators::GeneratedValue;

/// Source of parent keys for foreign-key generators.
pub trait ForeignKeyResolver {
    /// Values recorded for the referenced column, in insertion order.
    ///
    /// `None` means the referenced table has not been populated in this run,
    /// or was populated without values for that column. An empty slice means
    /// the table was populated with zero rows.
    fn referenced_keys(&self, reference: &ColumnReference) -> Option<Arc<[GeneratedValue]>>;
}

#[derive(Debug, Default)]
struct RecordedTable {
    row_count: usize,
    columns: BTreeMap<String, Arc<[GeneratedValue]>>,
}

/// Keys of the tables persisted so far in a population run.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    tables: BTreeMap<String, RecordedTable>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the persisted rows of `table`. `keys` holds the value the sink
    /// reported for each row's [`TableDescriptor::returned_column`] and
    /// overrides whatever the row carried for that column.
    pub fn record_table(
        &mut self,
        table: &TableDescriptor,
        rows: &[Row],
        keys: &[GeneratedValue],
    ) -> Result<(), GenerationError> {
        if keys.len() != rows.len() {
            return Err(GenerationError::Persistence {
                table: table.name.clone(),
                source: SinkError::KeyCountMismatch {
                    expected: rows.len(),
                    actual: keys.len(),
                },
            });
        }

        let key_column = table.returned_column().map(|column| column.name.as_str());
        let mut columns: BTreeMap<String, Arc<[GeneratedValue]>> = BTreeMap::new();

        for column in &table.columns {
            let values: Vec<GeneratedValue> = if Some(column.name.as_str()) == key_column {
                keys.to_vec()
            } else if rows.iter().all(|row| row.contains_key(&column.name)) {
                rows.iter()
                    .filter_map(|row| row.get(&column.name).cloned())
                    .collect()
            } else {
                continue;
            };
            columns.insert(column.name.clone(), Arc::from(values));
        }

        self.tables.insert(
            table.name.clone(),
            RecordedTable {
                row_count: rows.len(),
                columns,
            },
        );

        Ok(())
    }

    pub fn is_populated(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|recorded| recorded.row_count)
    }

    /// Forget everything; used when a run is rolled back.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

impl ForeignKeyResolver for KeyRegistry {
    fn referenced_keys(&self, reference: &ColumnReference) -> Option<Arc<[GeneratedValue]>> {
        let recorded = self.tables.get(&reference.table)?;
        if recorded.row_count == 0 {
            return Some(Arc::from(Vec::new()));
        }
        recorded.columns.get(&reference.column).cloned()
    }
}
