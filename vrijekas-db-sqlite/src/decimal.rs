//! Conversions between exact decimals and SQLite's numeric storage.
//!
//! Values are stored in `REAL` columns, but seeds and hand-edited rows may
//! hold `INTEGER` values. Both decode to [`Decimal`].

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};
use vrijekas_core::RepositoryError;

/// Reads a numeric column as a decimal. NULL decodes to zero.
///
/// A `REAL` goes through its shortest round-trip text, so `0.1785` comes
/// back as exactly `0.1785` rather than the nearest binary fraction.
pub fn get_decimal(
    row: &SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    let db_err = |what: String| RepositoryError::Database(format!("{what} in column '{column}'"));

    let raw = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{column}' not found: {e}")))?;
    if raw.is_null() {
        return Ok(Decimal::ZERO);
    }
    let storage = raw.type_info().name().to_owned();

    match storage.as_str() {
        "INTEGER" => row
            .try_get::<i64, _>(column)
            .map(Decimal::from)
            .map_err(|e| db_err(e.to_string())),
        "REAL" => {
            let float = row
                .try_get::<f64, _>(column)
                .map_err(|e| db_err(e.to_string()))?;
            if !float.is_finite() {
                return Err(db_err(format!("Non-finite value {float}")));
            }
            Decimal::from_str(&float.to_string())
                .map_err(|_| db_err(format!("Value {float} does not fit a decimal")))
        }
        other => Err(db_err(format!("Unexpected storage class {other}"))),
    }
}

/// Converts a decimal for a `REAL` column.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
