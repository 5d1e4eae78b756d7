use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{AppMeta, StatementLine, Variable, VariableFilter, VariableMetadata};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Persistent store for variables, the latest statement and app metadata.
#[async_trait]
pub trait VariableRepository: Send + Sync {
    // Variables
    async fn list_variables(
        &self,
        filter: &VariableFilter,
    ) -> Result<Vec<Variable>, RepositoryError>;

    async fn get_variable(&self, key: &str) -> Result<Option<Variable>, RepositoryError>;

    /// Inserts the variable or updates its value and editable flag.
    ///
    /// `metadata` is only used on insert; descriptive columns of an
    /// existing row are left untouched.
    async fn upsert_variable(
        &self,
        key: &str,
        value: Decimal,
        editable: bool,
        metadata: Option<&VariableMetadata>,
    ) -> Result<(), RepositoryError>;

    /// Puts `keys` back to their seeded default rows in one transaction.
    ///
    /// Value, editability and descriptive columns are all restored. Keys
    /// without a seeded default are removed.
    async fn restore_defaults(
        &self,
        keys: &[&str],
    ) -> Result<(), RepositoryError>;

    // Statement

    /// Replaces the stored statement and writes `outputs` back as derived
    /// variables, all in one transaction.
    async fn save_statement(
        &self,
        lines: &[StatementLine],
        outputs: &[(&str, Decimal)],
    ) -> Result<(), RepositoryError>;

    /// The stored statement ordered by sequence number.
    async fn list_statement(&self) -> Result<Vec<StatementLine>, RepositoryError>;

    // Metadata
    async fn get_meta(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn app_meta(&self) -> Result<AppMeta, RepositoryError>;
}
