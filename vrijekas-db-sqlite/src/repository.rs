use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};
use tracing::debug;
use vrijekas_core::{
    AppMeta, LineKind, RepositoryError, StatementLine, Variable, VariableCategory,
    VariableFilter, VariableMetadata, VariableRepository,
};

use crate::decimal::{decimal_to_f64, get_decimal};

const META_SEED: (&str, &str) = ("001_meta.sql", include_str!("../seeds/001_meta.sql"));
const INPUT_SEED: (&str, &str) = ("002_inputs.sql", include_str!("../seeds/002_inputs.sql"));
const DERIVED_SEED: (&str, &str) = ("003_derived.sql", include_str!("../seeds/003_derived.sql"));

/// Seed files compiled into the binary, executed in order.
const SEEDS: &[(&str, &str)] = &[META_SEED, INPUT_SEED, DERIVED_SEED];

/// Seeds that describe variable rows; replayed to restore defaults.
const VARIABLE_SEEDS: &[(&str, &str)] = &[INPUT_SEED, DERIVED_SEED];

const LAST_COMPUTED_AT: &str = "last_computed_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens a database from a bare file path or `:memory:`.
    ///
    /// Files are created when missing. An in-memory database lives on a
    /// single pooled connection that is never recycled.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = if connection_string == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .context("Invalid in-memory connection options")?;
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            let options = SqliteConnectOptions::new()
                .filename(connection_string)
                .create_if_missing(true);
            SqlitePoolOptions::new().connect_with(options).await
        }
        .with_context(|| format!("Failed to open database: {}", connection_string))?;

        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Executes the embedded seed files. Existing rows are never replaced.
    pub async fn run_seeds(&self) -> Result<()> {
        for &(name, sql) in SEEDS {
            sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", name))?;
            debug!(seed = name, "Seed applied");
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_variable(row: &SqliteRow) -> Result<Variable, RepositoryError> {
    let key: String = row.try_get("key").map_err(db_err)?;

    let category = match row
        .try_get::<Option<String>, _>("category")
        .map_err(db_err)?
        .filter(|c| !c.is_empty())
    {
        Some(c) => Some(VariableCategory::parse(&c).ok_or_else(|| {
            RepositoryError::Database(format!("Unknown category '{}' for '{}'", c, key))
        })?),
        None => None,
    };

    let label = row
        .try_get::<Option<String>, _>("label_en")
        .map_err(db_err)?
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| key.clone());

    Ok(Variable {
        value: get_decimal(row, "value")?,
        unit: non_empty(row.try_get("unit").map_err(db_err)?),
        category,
        label,
        label_nl: non_empty(row.try_get("label_nl").map_err(db_err)?),
        editable: row
            .try_get::<Option<i64>, _>("editable")
            .map_err(db_err)?
            .is_none_or(|e| e != 0),
        notes: non_empty(row.try_get("notes").map_err(db_err)?),
        key,
    })
}

fn row_to_line(row: &SqliteRow) -> Result<StatementLine, RepositoryError> {
    let kind: String = row
        .try_get::<Option<String>, _>("kind")
        .map_err(db_err)?
        .unwrap_or_default();

    Ok(StatementLine {
        sequence_no: row.try_get("line_no").map_err(db_err)?,
        label: row
            .try_get::<Option<String>, _>("label")
            .map_err(db_err)?
            .unwrap_or_default(),
        amount: get_decimal(row, "amount")?,
        kind: LineKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Database(format!("Unknown line kind '{}'", kind)))?,
        notes: row
            .try_get::<Option<String>, _>("notes")
            .map_err(db_err)?
            .unwrap_or_default(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Insert-or-update shared by direct upserts and statement saves.
///
/// On conflict only `value` and `editable` change.
async fn upsert<'e, E>(
    executor: E,
    key: &str,
    value: Decimal,
    editable: bool,
    metadata: Option<&VariableMetadata>,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let metadata = metadata.cloned().unwrap_or_default();

    sqlx::query(
        "INSERT INTO variables (key, value, unit, category, label_nl, label_en, editable, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, editable = excluded.editable",
    )
    .bind(key)
    .bind(decimal_to_f64(value))
    .bind(metadata.unit)
    .bind(metadata.category.map(|c| c.as_str()))
    .bind(metadata.label_nl)
    .bind(metadata.label)
    .bind(editable)
    .bind(metadata.notes)
    .execute(executor)
    .await
    .map_err(db_err)?;

    Ok(())
}

#[async_trait]
impl VariableRepository for SqliteRepository {
    async fn list_variables(
        &self,
        filter: &VariableFilter,
    ) -> Result<Vec<Variable>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT key, value, unit, category, label_nl, label_en, editable, notes
             FROM variables
             WHERE (?1 IS NULL OR category = ?1)
               AND (?2 IS NULL OR COALESCE(editable, 1) = ?2)
             ORDER BY key",
        )
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.editable)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_variable).collect()
    }

    async fn get_variable(&self, key: &str) -> Result<Option<Variable>, RepositoryError> {
        let row = sqlx::query(
            "SELECT key, value, unit, category, label_nl, label_en, editable, notes
             FROM variables WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_variable).transpose()
    }

    async fn upsert_variable(
        &self,
        key: &str,
        value: Decimal,
        editable: bool,
        metadata: Option<&VariableMetadata>,
    ) -> Result<(), RepositoryError> {
        upsert(&self.pool, key, value, editable, metadata).await?;
        debug!(key, value = %value, editable, "Variable upserted");
        Ok(())
    }

    async fn restore_defaults(
        &self,
        keys: &[&str],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for key in keys {
            sqlx::query("DELETE FROM variables WHERE key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        // The variable seeds only insert missing rows, so this refills
        // exactly the keys deleted above.
        for &(name, sql) in VARIABLE_SEEDS {
            let conn: &mut sqlx::SqliteConnection = &mut tx;
            sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
                .await
                .map_err(|e| RepositoryError::Database(format!("{name}: {e}")))?;
        }

        tx.commit().await.map_err(db_err)?;

        debug!(count = keys.len(), "Defaults restored");
        Ok(())
    }

    async fn save_statement(
        &self,
        lines: &[StatementLine],
        outputs: &[(&str, Decimal)],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM tax_statement")
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for line in lines {
            sqlx::query(
                "INSERT INTO tax_statement (line_no, label, amount, kind, notes)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(line.sequence_no)
            .bind(&line.label)
            .bind(decimal_to_f64(line.amount))
            .bind(line.kind.as_str())
            .bind(&line.notes)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let derived = VariableMetadata::with_category(VariableCategory::Calculation);
        for (key, value) in outputs {
            upsert(&mut *tx, key, *value, false, Some(&derived)).await?;
        }

        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(LAST_COMPUTED_AT)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        debug!(lines = lines.len(), outputs = outputs.len(), "Statement saved");
        Ok(())
    }

    async fn list_statement(&self) -> Result<Vec<StatementLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT line_no, label, amount, kind, notes FROM tax_statement ORDER BY line_no",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_line).collect()
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(value.flatten())
    }

    async fn app_meta(&self) -> Result<AppMeta, RepositoryError> {
        let app_name = self.get_meta("app_name").await?.ok_or(RepositoryError::NotFound)?;
        let version = self.get_meta("version").await?.ok_or(RepositoryError::NotFound)?;
        let tax_year = self
            .get_meta("tax_year")
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let tax_year = tax_year.trim().parse::<i32>().map_err(|e| {
            RepositoryError::Database(format!("Invalid tax_year '{}': {}", tax_year, e))
        })?;

        let last_computed_at = match self.get_meta(LAST_COMPUTED_AT).await? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        RepositoryError::Database(format!(
                            "Invalid {} '{}': {}",
                            LAST_COMPUTED_AT, raw, e
                        ))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(AppMeta {
            app_name,
            version,
            tax_year,
            last_computed_at,
        })
    }
}
