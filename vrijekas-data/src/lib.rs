//! CSV import of input variables.

mod loader;

pub use loader::{VariableLoader, VariableLoaderError, VariableRecord};
