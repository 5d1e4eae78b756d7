//! Command handlers. Every handler writes its report to `out`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use vrijekas_core::db::{DbConfig, RepositoryRegistry};
use vrijekas_core::workflow;
use vrijekas_core::{VariableFilter, VariableRepository};
use vrijekas_data::VariableLoader;
use vrijekas_db_sqlite::SqliteRepositoryFactory;

use crate::cli::{Command, ShowArgs};
use crate::render;
use crate::utils::{parse_assignment, parse_decimal};

/// Registry with every backend compiled into the binary.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

/// Opens the store selected on the command line.
pub async fn open_store(config: &DbConfig) -> Result<Box<dyn VariableRepository>> {
    build_registry().create(config).await.with_context(|| {
        format!(
            "Failed to open {} store '{}'",
            config.backend, config.connection_string
        )
    })
}

pub async fn run<W: Write>(
    command: &Command,
    repo: &dyn VariableRepository,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Show(args) => show(repo, args, out).await,
        Command::Get { key } => get(repo, key, out).await,
        Command::Set { assignments } => set(repo, assignments, out).await,
        Command::Override { key, value } => set_override(repo, key, value, out).await,
        Command::ClearOverride { key } => clear_override(repo, key, out).await,
        Command::Reset => reset(repo, out).await,
        Command::Import { file } => import(repo, file, out).await,
        Command::Compute => compute(repo, out).await,
        Command::Statement => statement(repo, out).await,
    }
}

async fn show<W: Write>(
    repo: &dyn VariableRepository,
    args: &ShowArgs,
    out: &mut W,
) -> Result<()> {
    let filter = VariableFilter {
        category: args.category,
        editable: match (args.editable, args.derived) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
    };

    let variables = repo
        .list_variables(&filter)
        .await
        .context("Failed to list variables")?;

    if variables.is_empty() {
        writeln!(out, "No variables match.")?;
    } else {
        writeln!(out, "{}", render::variables_table(&variables))?;
    }
    Ok(())
}

async fn get<W: Write>(
    repo: &dyn VariableRepository,
    key: &str,
    out: &mut W,
) -> Result<()> {
    let Some(variable) = repo
        .get_variable(key)
        .await
        .with_context(|| format!("Failed to read '{key}'"))?
    else {
        warn!(key, "Variable not found");
        bail!("variable '{key}' not found");
    };

    writeln!(out, "{}", render::variables_table(std::slice::from_ref(&variable)))?;
    if let Some(notes) = &variable.notes {
        writeln!(out, "{notes}")?;
    }
    Ok(())
}

async fn set<W: Write>(
    repo: &dyn VariableRepository,
    assignments: &[String],
    out: &mut W,
) -> Result<()> {
    let values = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>, _>>()?;

    let unused = workflow::set_inputs(repo, &values).await?;

    for (key, value) in &values {
        writeln!(out, "{key} = {value}")?;
    }
    for key in &unused {
        writeln!(out, "warning: '{key}' is new and not read by the statement")?;
    }
    Ok(())
}

async fn set_override<W: Write>(
    repo: &dyn VariableRepository,
    key: &str,
    value: &str,
    out: &mut W,
) -> Result<()> {
    let value = parse_decimal(value)?;
    workflow::set_override(repo, key, value).await?;

    writeln!(out, "{key} fixed at {value}; run `compute` to apply")?;
    Ok(())
}

async fn clear_override<W: Write>(
    repo: &dyn VariableRepository,
    key: &str,
    out: &mut W,
) -> Result<()> {
    workflow::clear_override(repo, key).await?;

    writeln!(out, "{key} is derived again; run `compute` to apply")?;
    Ok(())
}

async fn reset<W: Write>(
    repo: &dyn VariableRepository,
    out: &mut W,
) -> Result<()> {
    workflow::reset_inputs(repo)
        .await
        .context("Failed to reset inputs")?;

    writeln!(out, "Inputs restored to defaults; run `compute` to apply")?;
    Ok(())
}

async fn import<W: Write>(
    repo: &dyn VariableRepository,
    path: &Path,
    out: &mut W,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let records = VariableLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;

    info!(path = %path.display(), records = records.len(), "Importing variables");
    let count = VariableLoader::load(repo, &records)
        .await
        .context("Failed to import variables")?;

    writeln!(out, "Imported {count} variables from {}", path.display())?;
    Ok(())
}

async fn compute<W: Write>(
    repo: &dyn VariableRepository,
    out: &mut W,
) -> Result<()> {
    let result = workflow::compute_and_save(repo)
        .await
        .context("Failed to compute statement")?;
    let meta = repo.app_meta().await.context("Failed to read app metadata")?;

    writeln!(out, "{}", render::header(&meta))?;
    writeln!(out, "{}", render::statement_table(&result.lines))?;
    writeln!(out, "{}", render::metrics(&result.outputs))?;
    Ok(())
}

async fn statement<W: Write>(
    repo: &dyn VariableRepository,
    out: &mut W,
) -> Result<()> {
    let lines = repo
        .list_statement()
        .await
        .context("Failed to read statement")?;

    if lines.is_empty() {
        writeln!(out, "No statement yet; run `compute` first.")?;
        return Ok(());
    }

    let meta = repo.app_meta().await.context("Failed to read app metadata")?;
    writeln!(out, "{}", render::header(&meta))?;
    writeln!(out, "{}", render::statement_table(&lines))?;
    Ok(())
}
