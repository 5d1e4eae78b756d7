//! Store-backed operations shared by every front end.
//!
//! The engine itself never touches storage; these functions read the
//! editable snapshot, run the statement and write the result back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculations::statement::{self, StatementError, StatementResult, keys};
use crate::db::{RepositoryError, VariableRepository};
use crate::models::{VariableCategory, VariableFilter, VariableMetadata};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The key holds a derived value and cannot be set directly.
    #[error("'{0}' is a derived variable and cannot be set")]
    DerivedVariable(String),

    #[error("'{0}' cannot be overridden")]
    NotOverridable(String),
}

/// Returns true for derived keys that accept an absolute user value.
pub fn is_overridable(key: &str) -> bool {
    keys::OVERRIDABLE.contains(&key)
}

/// Key/value map of every editable variable.
pub async fn load_snapshot(
    repo: &dyn VariableRepository,
) -> Result<BTreeMap<String, Decimal>, RepositoryError> {
    let variables = repo.list_variables(&VariableFilter::editable()).await?;
    debug!(count = variables.len(), "Loaded input snapshot");

    Ok(variables.into_iter().map(|v| (v.key, v.value)).collect())
}

/// Computes the statement from the stored inputs and persists it.
///
/// Nothing is written when the computation fails.
pub async fn compute_and_save(
    repo: &dyn VariableRepository,
) -> Result<StatementResult, WorkflowError> {
    let snapshot = load_snapshot(repo).await?;
    let result = statement::compute(&snapshot)?;

    repo.save_statement(&result.lines, &result.outputs.derived_entries())
        .await?;

    info!(
        lines = result.lines.len(),
        final_income_tax = %result.outputs.final_income_tax,
        net_cash = %result.outputs.net_cash,
        "Statement saved"
    );
    Ok(result)
}

/// Returns true for keys the statement reads from its inputs.
pub fn is_engine_input(key: &str) -> bool {
    keys::INPUTS.contains(&key)
}

/// Updates input variables, creating unknown keys as new inputs.
///
/// Every key is checked before anything is written; a single derived key
/// rejects the whole batch. Returns the keys that were created even though
/// the statement never reads them, which usually means a typo.
pub async fn set_inputs(
    repo: &dyn VariableRepository,
    values: &[(String, Decimal)],
) -> Result<Vec<String>, WorkflowError> {
    let mut unused = Vec::new();
    for (key, _) in values {
        match repo.get_variable(key).await? {
            Some(existing) if !existing.editable => {
                return Err(WorkflowError::DerivedVariable(key.clone()));
            }
            Some(_) => {}
            None if !is_engine_input(key) => unused.push(key.clone()),
            None => {}
        }
    }

    for (key, value) in values {
        repo.upsert_variable(key, *value, true, None).await?;
        info!(key = %key, value = %value, "Input updated");
    }
    for key in &unused {
        warn!(key = %key, "Created an input the statement does not read");
    }
    Ok(unused)
}

/// Turns an overridable derived value into a user input holding `value`.
pub async fn set_override(
    repo: &dyn VariableRepository,
    key: &str,
    value: Decimal,
) -> Result<(), WorkflowError> {
    if !is_overridable(key) {
        return Err(WorkflowError::NotOverridable(key.to_string()));
    }

    let metadata = VariableMetadata::with_category(VariableCategory::Calculation);
    repo.upsert_variable(key, value, true, Some(&metadata)).await?;
    info!(key, value = %value, "Override set");
    Ok(())
}

/// Hands an overridden value back to the engine.
///
/// The stored value is kept until the next computation replaces it.
pub async fn clear_override(
    repo: &dyn VariableRepository,
    key: &str,
) -> Result<(), WorkflowError> {
    if !is_overridable(key) {
        return Err(WorkflowError::NotOverridable(key.to_string()));
    }

    let Some(existing) = repo.get_variable(key).await? else {
        return Ok(());
    };
    repo.upsert_variable(key, existing.value, false, None).await?;
    info!(key, "Override cleared");
    Ok(())
}

/// Restores every statement input to its seeded default.
///
/// Also drops an override, since `mkb_vrijstelling` is one of the inputs.
/// Extra inputs the statement does not read are kept.
pub async fn reset_inputs(repo: &dyn VariableRepository) -> Result<(), WorkflowError> {
    repo.restore_defaults(keys::INPUTS).await?;
    info!(count = keys::INPUTS.len(), "Inputs reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{AppMeta, StatementLine, Variable};

    /// Map-backed store used to exercise the workflow without a database.
    #[derive(Default)]
    struct MemoryRepository {
        variables: Mutex<BTreeMap<String, Variable>>,
        statement: Mutex<Vec<StatementLine>>,
    }

    impl MemoryRepository {
        fn seeded() -> Self {
            let repo = Self::default();
            *repo.variables.lock().unwrap() = defaults();
            repo
        }
    }

    fn defaults() -> BTreeMap<String, Variable> {
        let mut vars = BTreeMap::new();
        for (key, value) in [
            ("hrs_home", dec!(500)),
            ("rate_home", dec!(50)),
            ("hrs_onsite", dec!(500)),
            ("rate_onsite", dec!(70)),
            ("tesla_price", dec!(50000)),
            ("vat_recovered", dec!(8678)),
            ("depr_years", dec!(5)),
            ("bijtelling", dec!(9091)),
            ("zelfstandigenaftrek", dec!(1200)),
            ("startersaftrek", dec!(2123)),
            ("mkb_vrijstelling_pct", dec!(0.127)),
            ("box1_rate", dec!(0.1785)),
        ] {
            vars.insert(key.to_string(), variable(key, value, true));
        }
        vars.insert(
            "mkb_vrijstelling".to_string(),
            variable("mkb_vrijstelling", dec!(0), false),
        );
        vars
    }

    fn variable(
        key: &str,
        value: Decimal,
        editable: bool,
    ) -> Variable {
        Variable {
            key: key.to_string(),
            value,
            unit: None,
            category: None,
            label: key.to_string(),
            label_nl: None,
            editable,
            notes: None,
        }
    }

    #[async_trait]
    impl VariableRepository for MemoryRepository {
        async fn list_variables(
            &self,
            filter: &VariableFilter,
        ) -> Result<Vec<Variable>, RepositoryError> {
            let vars = self.variables.lock().unwrap();
            Ok(vars.values().filter(|v| filter.matches(v)).cloned().collect())
        }

        async fn get_variable(
            &self,
            key: &str,
        ) -> Result<Option<Variable>, RepositoryError> {
            Ok(self.variables.lock().unwrap().get(key).cloned())
        }

        async fn upsert_variable(
            &self,
            key: &str,
            value: Decimal,
            editable: bool,
            _metadata: Option<&VariableMetadata>,
        ) -> Result<(), RepositoryError> {
            let mut vars = self.variables.lock().unwrap();
            let entry = vars
                .entry(key.to_string())
                .or_insert_with(|| variable(key, value, editable));
            entry.value = value;
            entry.editable = editable;
            Ok(())
        }

        async fn restore_defaults(
            &self,
            keys: &[&str],
        ) -> Result<(), RepositoryError> {
            let defaults = defaults();
            let mut vars = self.variables.lock().unwrap();
            for key in keys {
                match defaults.get(*key) {
                    Some(default) => vars.insert(key.to_string(), default.clone()),
                    None => vars.remove(*key),
                };
            }
            Ok(())
        }

        async fn save_statement(
            &self,
            lines: &[StatementLine],
            outputs: &[(&str, Decimal)],
        ) -> Result<(), RepositoryError> {
            *self.statement.lock().unwrap() = lines.to_vec();
            let mut vars = self.variables.lock().unwrap();
            for (key, value) in outputs {
                vars.insert(key.to_string(), variable(key, *value, false));
            }
            Ok(())
        }

        async fn list_statement(&self) -> Result<Vec<StatementLine>, RepositoryError> {
            Ok(self.statement.lock().unwrap().clone())
        }

        async fn get_meta(
            &self,
            _key: &str,
        ) -> Result<Option<String>, RepositoryError> {
            Ok(None)
        }

        async fn app_meta(&self) -> Result<AppMeta, RepositoryError> {
            Err(RepositoryError::NotFound)
        }
    }

    async fn value_of(
        repo: &MemoryRepository,
        key: &str,
    ) -> Option<Decimal> {
        repo.get_variable(key).await.unwrap().map(|v| v.value)
    }

    // =========================================================================
    // compute_and_save
    // =========================================================================

    #[tokio::test]
    async fn compute_and_save_persists_lines_and_outputs() {
        let repo = MemoryRepository::seeded();

        let result = compute_and_save(&repo).await.unwrap();

        assert_eq!(repo.list_statement().await.unwrap(), result.lines);
        assert_eq!(value_of(&repo, "final_income_tax").await, Some(dec!(4328.92772192)));
        assert_eq!(value_of(&repo, "mkb_vrijstelling").await, Some(dec!(5833.54688)));
    }

    #[tokio::test]
    async fn compute_and_save_ignores_derived_values_in_snapshot() {
        let repo = MemoryRepository::seeded();

        let first = compute_and_save(&repo).await.unwrap();
        let second = compute_and_save(&repo).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn compute_and_save_writes_nothing_on_missing_input() {
        let repo = MemoryRepository::seeded();
        repo.variables.lock().unwrap().remove("box1_rate");

        let result = compute_and_save(&repo).await;

        assert_eq!(
            result,
            Err(WorkflowError::Statement(StatementError::MissingKey(
                "box1_rate".to_string()
            )))
        );
        assert!(repo.list_statement().await.unwrap().is_empty());
        assert_eq!(value_of(&repo, "final_income_tax").await, None);
    }

    // =========================================================================
    // set_inputs
    // =========================================================================

    #[tokio::test]
    async fn set_inputs_updates_and_creates_inputs() {
        let repo = MemoryRepository::seeded();

        let unused = set_inputs(
            &repo,
            &[
                ("hrs_home".to_string(), dec!(600)),
                ("notes_hours".to_string(), dec!(1)),
            ],
        )
        .await
        .unwrap();

        assert_eq!(value_of(&repo, "hrs_home").await, Some(dec!(600)));
        assert_eq!(value_of(&repo, "notes_hours").await, Some(dec!(1)));
        assert_eq!(unused, vec!["notes_hours".to_string()]);
    }

    #[tokio::test]
    async fn set_inputs_reports_mistyped_key() {
        let repo = MemoryRepository::seeded();

        let unused = set_inputs(&repo, &[("hrs_hom".to_string(), dec!(600))])
            .await
            .unwrap();

        assert_eq!(unused, vec!["hrs_hom".to_string()]);
        assert_eq!(value_of(&repo, "hrs_home").await, Some(dec!(500)));
    }

    #[tokio::test]
    async fn set_inputs_recreates_known_input_silently() {
        let repo = MemoryRepository::seeded();
        repo.variables.lock().unwrap().remove("box1_rate");

        let unused = set_inputs(&repo, &[("box1_rate".to_string(), dec!(0.37))])
            .await
            .unwrap();

        assert!(unused.is_empty());
    }

    #[tokio::test]
    async fn set_inputs_rejects_batch_with_derived_key() {
        let repo = MemoryRepository::seeded();

        let result = set_inputs(
            &repo,
            &[
                ("hrs_home".to_string(), dec!(600)),
                ("mkb_vrijstelling".to_string(), dec!(7620)),
            ],
        )
        .await;

        assert_eq!(
            result,
            Err(WorkflowError::DerivedVariable("mkb_vrijstelling".to_string()))
        );
        assert_eq!(value_of(&repo, "hrs_home").await, Some(dec!(500)));
    }

    // =========================================================================
    // overrides
    // =========================================================================

    #[tokio::test]
    async fn override_is_used_then_cleared() {
        let repo = MemoryRepository::seeded();

        set_override(&repo, "mkb_vrijstelling", dec!(7620)).await.unwrap();
        let overridden = compute_and_save(&repo).await.unwrap();

        assert_eq!(overridden.outputs.final_income_tax, dec!(4010.04584));
        assert_eq!(value_of(&repo, "mkb_vrijstelling").await, Some(dec!(7620)));
        assert!(repo.get_variable("mkb_vrijstelling").await.unwrap().unwrap().editable);

        clear_override(&repo, "mkb_vrijstelling").await.unwrap();
        let restored = compute_and_save(&repo).await.unwrap();

        assert_eq!(restored.outputs.final_income_tax, dec!(4328.92772192));
        assert_eq!(value_of(&repo, "mkb_vrijstelling").await, Some(dec!(5833.54688)));
    }

    #[tokio::test]
    async fn reset_restores_inputs_and_drops_override() {
        let repo = MemoryRepository::seeded();
        set_inputs(&repo, &[("hrs_home".to_string(), dec!(640))])
            .await
            .unwrap();
        set_override(&repo, "mkb_vrijstelling", dec!(7620)).await.unwrap();

        reset_inputs(&repo).await.unwrap();
        let result = compute_and_save(&repo).await.unwrap();

        assert_eq!(value_of(&repo, "hrs_home").await, Some(dec!(500)));
        assert!(!result.outputs.mkb_overridden);
        assert_eq!(result.outputs.final_income_tax, dec!(4328.92772192));
    }

    #[tokio::test]
    async fn override_rejects_other_keys() {
        let repo = MemoryRepository::seeded();

        assert_eq!(
            set_override(&repo, "net_cash", dec!(1)).await,
            Err(WorkflowError::NotOverridable("net_cash".to_string()))
        );
        assert_eq!(
            clear_override(&repo, "box1_rate").await,
            Err(WorkflowError::NotOverridable("box1_rate".to_string()))
        );
    }

    #[test]
    fn engine_inputs_include_override_key() {
        assert!(is_engine_input("hrs_home"));
        assert!(is_engine_input("mkb_vrijstelling"));
        assert!(!is_engine_input("net_cash"));
        assert!(!is_engine_input("hrs_hom"));
    }

    #[test]
    fn only_mkb_exemption_is_overridable() {
        assert!(is_overridable("mkb_vrijstelling"));
        assert!(!is_overridable("mkb_vrijstelling_pct"));
        assert!(!is_overridable("taxable_profit"));
    }
}
