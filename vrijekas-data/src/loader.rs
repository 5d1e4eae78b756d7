use std::io::Read;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use vrijekas_core::workflow::is_engine_input;
use vrijekas_core::{RepositoryError, VariableCategory, VariableMetadata, VariableRepository};

/// Errors that can occur when importing variables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: missing key")]
    MissingKey { row: usize },

    #[error("Row {row}: invalid value '{value}' for '{key}'")]
    InvalidValue {
        row: usize,
        key: String,
        value: String,
    },

    #[error("Row {row}: unknown category '{category}'")]
    UnknownCategory { row: usize, category: String },

    #[error("'{0}' is a derived variable and cannot be imported")]
    DerivedVariable(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for VariableLoaderError {
    fn from(err: csv::Error) -> Self {
        VariableLoaderError::CsvParse(err.to_string())
    }
}

/// Row as it appears in the file, before validation.
#[derive(Debug, Deserialize)]
struct RawRecord {
    key: String,
    value: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// A validated input variable read from CSV.
///
/// `unit`, `category` and `label` are only used when the key does not
/// exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub key: String,
    pub value: Decimal,
    pub unit: Option<String>,
    pub category: Option<VariableCategory>,
    pub label: Option<String>,
}

impl VariableRecord {
    fn metadata(&self) -> VariableMetadata {
        VariableMetadata {
            unit: self.unit.clone(),
            category: self.category,
            label: self.label.clone(),
            ..Default::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Loader for input variables from CSV files.
///
/// The CSV has a `key,value` header with optional `unit`, `category` and
/// `label` columns:
///
/// ```text
/// key,value,unit,category,label
/// hrs_home,620,hrs,revenue,Hours home
/// box1_rate,0.1785
/// ```
pub struct VariableLoader;

impl VariableLoader {
    /// Parse and validate records from a CSV reader.
    ///
    /// Row numbers in errors count data rows from 1.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<VariableRecord>, VariableLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut records = Vec::new();

        for (index, result) in csv_reader.deserialize().enumerate() {
            let row = index + 1;
            let raw: RawRecord = result?;

            if raw.key.is_empty() {
                return Err(VariableLoaderError::MissingKey { row });
            }

            let value =
                Decimal::from_str(&raw.value).map_err(|_| VariableLoaderError::InvalidValue {
                    row,
                    key: raw.key.clone(),
                    value: raw.value.clone(),
                })?;

            let category = match non_empty(raw.category) {
                Some(c) => Some(VariableCategory::parse(&c.to_lowercase()).ok_or(
                    VariableLoaderError::UnknownCategory { row, category: c },
                )?),
                None => None,
            };

            records.push(VariableRecord {
                key: raw.key,
                value,
                unit: non_empty(raw.unit),
                category,
                label: non_empty(raw.label),
            });
        }

        debug!(count = records.len(), "Parsed variable records");
        Ok(records)
    }

    /// Upsert records as editable inputs and return how many were written.
    ///
    /// Every key is checked first; if any names a derived variable nothing
    /// is written.
    pub async fn load<R: VariableRepository + ?Sized>(
        repo: &R,
        records: &[VariableRecord],
    ) -> Result<usize, VariableLoaderError> {
        let mut created = Vec::new();
        for record in records {
            match repo.get_variable(&record.key).await? {
                Some(existing) if !existing.editable => {
                    return Err(VariableLoaderError::DerivedVariable(record.key.clone()));
                }
                Some(_) => {}
                None => created.push(record.key.as_str()),
            }
        }

        for record in records {
            repo.upsert_variable(&record.key, record.value, true, Some(&record.metadata()))
                .await?;
        }

        for key in created.into_iter().filter(|k| !is_engine_input(k)) {
            warn!(key, "Imported an input the statement does not read");
        }
        info!(count = records.len(), "Imported variables");
        Ok(records.len())
    }
}
