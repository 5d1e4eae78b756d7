pub mod calculations;
pub mod db;
pub mod models;
pub mod workflow;

pub use calculations::{StatementError, StatementResult};
pub use db::repository::{RepositoryError, VariableRepository};
pub use models::*;
pub use workflow::WorkflowError;
