mod app_meta;
mod statement_line;
mod variable;

pub use app_meta::AppMeta;
pub use statement_line::{LineKind, StatementLine};
pub use variable::{Variable, VariableCategory, VariableFilter, VariableMetadata};
