/// Options that control which tables are described.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Namespace to read tables from.
    pub schema: String,
    /// Restrict to these tables; `None` reads every base table.
    pub tables: Option<Vec<String>>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            tables: None,
        }
    }
}

impl SourceOptions {
    pub fn includes(&self, table: &str) -> bool {
        match &self.tables {
            Some(list) => list.iter().any(|item| item == table),
            None => true,
        }
    }
}
