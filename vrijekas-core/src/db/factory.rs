use async_trait::async_trait;
use tracing::debug;

use super::repository::{RepositoryError, VariableRepository};

/// Which store to open and where.
///
/// `connection_string` is handed to the backend untouched; for SQLite it is
/// a file path or `:memory:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl DbConfig {
    pub fn new(
        backend: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.into(),
            connection_string: connection_string.into(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new("sqlite", ":memory:")
    }
}

/// Opens a ready-to-use store for one backend.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Opens or creates the store, including schema and default rows.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn VariableRepository>, RepositoryError>;
}

/// The backends a binary was built with.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: Vec<Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend. A later factory with the same name wins.
    pub fn register(
        &mut self,
        factory: Box<dyn RepositoryFactory>,
    ) {
        self.factories
            .retain(|f| f.backend_name() != factory.backend_name());
        self.factories.push(factory);
    }

    pub fn backends(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.backend_name()).collect()
    }

    /// Opens the store named by `config.backend`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Configuration`] for a backend that is not built
    /// in, otherwise whatever the backend reports.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn VariableRepository>, RepositoryError> {
        let Some(factory) = self
            .factories
            .iter()
            .find(|f| f.backend_name() == config.backend)
        else {
            let built = match self.backends().as_slice() {
                [] => "none".to_string(),
                names => names.join(", "),
            };
            return Err(RepositoryError::Configuration(format!(
                "unsupported backend '{}' (built with: {built})",
                config.backend
            )));
        };

        debug!(backend = factory.backend_name(), "Opening store");
        factory.create(config).await
    }
}
