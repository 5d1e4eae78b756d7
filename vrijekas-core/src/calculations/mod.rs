pub mod common;
pub mod schedules;
pub mod statement;

pub use statement::{
    MkbExemption, StatementError, StatementInput, StatementOutputs, StatementResult, TaxStatement,
};
