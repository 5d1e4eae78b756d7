use async_trait::async_trait;
use tracing::info;
use vrijekas_core::db::{DbConfig, RepositoryFactory};
use vrijekas_core::{RepositoryError, VariableRepository};

use crate::repository::SqliteRepository;

/// [`RepositoryFactory`] for SQLite.
///
/// ```rust,no_run
/// use vrijekas_core::db::RepositoryRegistry;
/// use vrijekas_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Opens `config.connection_string` (a file path or `:memory:`), creates
    /// the schema and applies the default seeds.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn VariableRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        repo.run_seeds()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        info!(database = %config.connection_string, "SQLite store ready");
        Ok(Box::new(repo))
    }
}
