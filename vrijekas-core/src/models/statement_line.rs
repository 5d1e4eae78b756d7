use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a statement line contributes to the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Add,
    Subtract,
    Result,
    Tax,
    Credit,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Result => "result",
            Self::Tax => "tax",
            Self::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Add),
            "subtract" => Some(Self::Subtract),
            "result" => Some(Self::Result),
            "tax" => Some(Self::Tax),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// One row of a computed tax statement.
///
/// Deductions and credits carry negative amounts so the add/subtract rows
/// sum to the taxable profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub sequence_no: i64,
    pub label: String,
    pub amount: Decimal,
    pub kind: LineKind,
    pub notes: String,
}

impl StatementLine {
    pub fn new(
        sequence_no: i64,
        label: impl Into<String>,
        amount: Decimal,
        kind: LineKind,
    ) -> Self {
        Self {
            sequence_no,
            label: label.into(),
            amount,
            kind,
            notes: String::new(),
        }
    }

    pub fn with_notes(
        mut self,
        notes: impl Into<String>,
    ) -> Self {
        self.notes = notes.into();
        self
    }
}
