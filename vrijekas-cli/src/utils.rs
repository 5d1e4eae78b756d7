use rust_decimal::Decimal;
use thiserror::Error;
use vrijekas_core::calculations::common::round_half_up;

/// Error returned when command-line input cannot be parsed as a [`Decimal`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDecimalError {
    #[error("invalid decimal '{input}': {reason}")]
    Invalid { input: String, reason: String },

    #[error("expected KEY=VALUE, got '{0}'")]
    MalformedAssignment(String),
}

/// Trims whitespace and removes commas (thousands separator).
fn normalize_decimal_input(s: &str) -> String {
    s.trim().replace(',', "")
}

/// Parses a string into a [`Decimal`].
///
/// Handles comma as thousands separator (e.g. `"50,000"`). Empty input is
/// an error: a missing value is never silently zero.
pub fn parse_decimal(s: &str) -> Result<Decimal, ParseDecimalError> {
    let normalized = normalize_decimal_input(s);
    if normalized.is_empty() {
        return Err(ParseDecimalError::Invalid {
            input: s.to_string(),
            reason: "empty value".to_string(),
        });
    }
    normalized.parse::<Decimal>().map_err(|e| {
        tracing::warn!(input = %s, "invalid decimal: {}", e);
        ParseDecimalError::Invalid {
            input: s.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Splits `KEY=VALUE` and parses the value.
pub fn parse_assignment(s: &str) -> Result<(String, Decimal), ParseDecimalError> {
    let (key, value) = s
        .split_once('=')
        .map(|(k, v)| (k.trim(), v))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| ParseDecimalError::MalformedAssignment(s.to_string()))?;

    Ok((key.to_string(), parse_decimal(value)?))
}

/// Formats an amount rounded half-up to cents with thousands separators.
///
/// ```
/// use rust_decimal_macros::dec;
/// use vrijekas_cli::utils::format_amount;
///
/// assert_eq!(format_amount(dec!(47406.67227808)), "47,406.67");
/// assert_eq!(format_amount(dec!(-8264.4)), "-8,264.40");
/// ```
pub fn format_amount(value: Decimal) -> String {
    let rounded = format!("{:.2}", round_half_up(value));
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // Rounding can leave "-0.00".
    if grouped.chars().all(|c| c == '0') && frac_part == "00" {
        return "0.00".to_string();
    }
    format!("{sign}{grouped}.{frac_part}")
}

/// Formats a stored value without rounding, dropping trailing zeros.
pub fn format_value(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_decimal_accepts_comma_thousands_separator() {
        assert_eq!(parse_decimal("50,000").unwrap(), dec!(50000));
        assert_eq!(parse_decimal("1,234,567.89").unwrap(), dec!(1234567.89));
    }

    #[test]
    fn parse_decimal_trims_whitespace() {
        assert_eq!(parse_decimal("  0.1785  ").unwrap(), dec!(0.1785));
    }

    #[test]
    fn parse_decimal_rejects_empty_and_garbage() {
        assert!(matches!(
            parse_decimal("   "),
            Err(ParseDecimalError::Invalid { .. })
        ));
        assert!(matches!(
            parse_decimal("abc"),
            Err(ParseDecimalError::Invalid { input, .. }) if input == "abc"
        ));
    }

    #[test]
    fn parse_assignment_splits_key_and_value() {
        assert_eq!(
            parse_assignment("hrs_home=620").unwrap(),
            ("hrs_home".to_string(), dec!(620))
        );
        assert_eq!(
            parse_assignment(" tesla_price = 52,500 ").unwrap(),
            ("tesla_price".to_string(), dec!(52500))
        );
    }

    #[test]
    fn parse_assignment_rejects_malformed_input() {
        assert_eq!(
            parse_assignment("hrs_home"),
            Err(ParseDecimalError::MalformedAssignment("hrs_home".to_string()))
        );
        assert_eq!(
            parse_assignment("=5"),
            Err(ParseDecimalError::MalformedAssignment("=5".to_string()))
        );
        assert!(matches!(
            parse_assignment("hrs_home=lots"),
            Err(ParseDecimalError::Invalid { .. })
        ));
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(dec!(60000)), "60,000.00");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
        assert_eq!(format_amount(dec!(999.995)), "1,000.00");
        assert_eq!(format_amount(dec!(12.5)), "12.50");
    }

    #[test]
    fn format_amount_handles_negatives_and_zero() {
        assert_eq!(format_amount(dec!(-11570.16)), "-11,570.16");
        assert_eq!(format_amount(dec!(-0.001)), "0.00");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn format_value_keeps_precision() {
        assert_eq!(format_value(dec!(0.1785)), "0.1785");
        assert_eq!(format_value(dec!(500.000)), "500");
    }
}
