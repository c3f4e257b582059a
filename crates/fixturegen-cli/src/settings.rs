use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fixturegen_generate::{GeneratedValue, GeneratorConfig, PopulateOptions};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Contents of `fixturegen.toml`. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub seed: u64,
    pub database_url: Option<String>,
    /// Namespace read and written on PostgreSQL.
    pub db_schema: String,
    pub default_rows_min: i64,
    pub default_rows_max: i64,
    pub generator: GeneratorConfig,
    /// Row counts per table.
    pub rows: BTreeMap<String, i64>,
    /// Constant values per `table.column`.
    pub overrides: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl Default for Settings {
    fn default() -> Self {
        let populate = PopulateOptions::default();
        Self {
            seed: populate.seed,
            database_url: None,
            db_schema: "public".to_string(),
            default_rows_min: populate.default_rows_min,
            default_rows_max: populate.default_rows_max,
            generator: populate.generator,
            rows: BTreeMap::new(),
            overrides: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Populate options seeded from these settings.
    pub fn populate_options(&self, seed: Option<u64>) -> PopulateOptions {
        PopulateOptions {
            seed: seed.unwrap_or(self.seed),
            default_rows_min: self.default_rows_min,
            default_rows_max: self.default_rows_max,
            generator: self.generator.clone(),
            ..PopulateOptions::default()
        }
    }

    /// Settings overrides as `(table, column, value)` triples.
    pub fn fixed_values(&self) -> SettingsResult<Vec<(String, String, GeneratedValue)>> {
        let mut fixed = Vec::new();
        for (table, columns) in &self.overrides {
            for (column, value) in columns {
                let value = toml_to_value(value).ok_or_else(|| {
                    SettingsError::Invalid(format!(
                        "override {table}.{column} must be a string, integer or boolean"
                    ))
                })?;
                fixed.push((table.clone(), column.clone(), value));
            }
        }
        Ok(fixed)
    }
}

fn toml_to_value(value: &toml::Value) -> Option<GeneratedValue> {
    match value {
        toml::Value::String(text) => Some(GeneratedValue::Text(text.clone())),
        toml::Value::Integer(number) => Some(GeneratedValue::Int(*number)),
        toml::Value::Boolean(flag) => Some(GeneratedValue::Bool(*flag)),
        _ => None,
    }
}

/// Load settings from `path`, falling back to defaults when the file is absent.
pub fn load_settings(path: &Path) -> SettingsResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content)
}

pub fn parse_settings(content: &str) -> SettingsResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    if let Some((table, count)) = settings.rows.iter().find(|(_, count)| **count < 0) {
        return Err(SettingsError::Invalid(format!(
            "rows.{table} must not be negative (got {count})"
        )));
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = parse_settings("").expect("parse");
        assert_eq!(settings.seed, 0);
        assert_eq!(settings.db_schema, "public");
        assert_eq!(settings.default_rows_max, 1000);
        assert!(settings.rows.is_empty());
    }

    #[test]
    fn parses_rows_generator_and_overrides() {
        let settings = parse_settings(
            r#"
            seed = 42
            database_url = "postgres://app@localhost/app"

            [generator]
            int_max = 100
            null_rate = 0.25

            [rows]
            users = 5
            orders = 20

            [overrides.users]
            userName = "fixed"
            active = true
            "#,
        )
        .expect("parse");

        assert_eq!(settings.seed, 42);
        assert_eq!(settings.generator.int_max, 100);
        assert_eq!(settings.generator.int_min, 0);
        assert_eq!(settings.rows.get("orders"), Some(&20));

        let options = settings.populate_options(Some(7));
        assert_eq!(options.seed, 7);
        assert_eq!(options.generator.null_rate, 0.25);

        let fixed = settings.fixed_values().expect("fixed values");
        assert!(fixed.contains(&(
            "users".to_string(),
            "userName".to_string(),
            GeneratedValue::from("fixed")
        )));
        assert!(fixed.contains(&(
            "users".to_string(),
            "active".to_string(),
            GeneratedValue::Bool(true)
        )));
    }

    #[test]
    fn rejects_negative_row_counts() {
        assert!(matches!(
            parse_settings("[rows]\nusers = -1\n"),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_non_scalar_overrides() {
        let settings = parse_settings("[overrides.users]\ntags = [1, 2]\n").expect("parse");
        assert!(matches!(
            settings.fixed_values(),
            Err(SettingsError::Invalid(_))
        ));
    }
}
