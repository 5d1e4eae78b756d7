//! Terminal tables for variables and statements.

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use vrijekas_core::calculations::StatementOutputs;
use vrijekas_core::{AppMeta, StatementLine, Variable};

use crate::utils::{format_amount, format_value};

#[derive(Debug, Clone, Tabled)]
pub struct VariableRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Label")]
    pub label: String,
    #[tabled(rename = "Type")]
    pub kind: &'static str,
}

impl From<&Variable> for VariableRow {
    fn from(v: &Variable) -> Self {
        Self {
            key: v.key.clone(),
            value: format_value(v.value),
            unit: v.unit.clone().unwrap_or_default(),
            category: v.category.map(|c| c.as_str().to_string()).unwrap_or_default(),
            label: match &v.label_nl {
                Some(nl) if nl != &v.label => format!("{} ({})", v.label, nl),
                _ => v.label.clone(),
            },
            kind: if v.editable { "input" } else { "derived" },
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct StatementRow {
    #[tabled(rename = "#")]
    pub seq: i64,
    #[tabled(rename = "Line")]
    pub label: String,
    #[tabled(rename = "Amount (€)")]
    pub amount: String,
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Notes")]
    pub notes: String,
}

impl From<&StatementLine> for StatementRow {
    fn from(line: &StatementLine) -> Self {
        Self {
            seq: line.sequence_no,
            label: line.label.clone(),
            amount: format_amount(line.amount),
            kind: line.kind.as_str(),
            notes: line.notes.clone(),
        }
    }
}

pub fn variables_table(variables: &[Variable]) -> String {
    let rows: Vec<VariableRow> = variables.iter().map(VariableRow::from).collect();
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string()
}

pub fn statement_table(lines: &[StatementLine]) -> String {
    let rows: Vec<StatementRow> = lines.iter().map(StatementRow::from).collect();
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string()
}

/// `VrijeKas 0.1.0 · tax year 2026`, plus the last computation time when known.
pub fn header(meta: &AppMeta) -> String {
    let mut out = format!("{} {} · tax year {}", meta.app_name, meta.version, meta.tax_year);
    if let Some(at) = meta.last_computed_at {
        out.push_str(&format!(
            " · computed {}",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ));
    }
    out
}

pub fn metrics(outputs: &StatementOutputs) -> String {
    let mut out = format!(
        "Final income tax: € {}\nNet cash:         € {}",
        format_amount(outputs.final_income_tax),
        format_amount(outputs.net_cash)
    );
    if outputs.mkb_overridden {
        out.push_str("\nMKB vrijstelling: overridden");
    }
    out
}
