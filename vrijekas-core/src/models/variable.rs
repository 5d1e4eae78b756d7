use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Revenue,
    Car,
    Tax,
    Calculation,
    General,
}

impl VariableCategory {
    pub fn all() -> &'static [VariableCategory] {
        &[
            Self::Revenue,
            Self::Car,
            Self::Tax,
            Self::Calculation,
            Self::General,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Car => "car",
            Self::Tax => "tax",
            Self::Calculation => "calculation",
            Self::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revenue" => Some(Self::Revenue),
            "car" => Some(Self::Car),
            "tax" => Some(Self::Tax),
            "calculation" => Some(Self::Calculation),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// A named numeric value held by the variable store.
///
/// Editable variables are user inputs. Non-editable variables are derived
/// values written back after a statement is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: Decimal,
    pub unit: Option<String>,
    pub category: Option<VariableCategory>,
    /// English display label.
    pub label: String,
    /// Dutch display label.
    pub label_nl: Option<String>,
    pub editable: bool,
    pub notes: Option<String>,
}

/// Descriptive fields used when a variable is inserted for the first time.
///
/// Updates to an existing variable never touch these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub unit: Option<String>,
    pub category: Option<VariableCategory>,
    pub label: Option<String>,
    pub label_nl: Option<String>,
    pub notes: Option<String>,
}

impl VariableMetadata {
    pub fn with_category(category: VariableCategory) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }
}

/// Selection criteria for listing variables. `None` matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableFilter {
    pub category: Option<VariableCategory>,
    pub editable: Option<bool>,
}

impl VariableFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn editable() -> Self {
        Self {
            editable: Some(true),
            ..Default::default()
        }
    }

    pub fn derived() -> Self {
        Self {
            editable: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, variable: &Variable) -> bool {
        self.category.is_none_or(|c| variable.category == Some(c))
            && self.editable.is_none_or(|e| variable.editable == e)
    }
}
