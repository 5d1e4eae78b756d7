//! Simplified income tax statement for a Dutch freelancer.
//!
//! The statement is an ordered chain of derivations. Every amount is kept
//! exact; rounding is left to whoever presents the result.
//!
//! # Statement Structure
//!
//! | Seq | Line | Kind | Amount |
//! |-----|------|------|--------|
//! | 10  | Total revenue | add | hrs_home × rate_home + hrs_onsite × rate_onsite |
//! | 20  | Depreciation | subtract | −(tesla_price − vat_recovered) / depr_years |
//! | 30  | KIA | subtract | −kia(net investment) |
//! | 40  | Bijtelling | add | bijtelling |
//! | 50  | Zelfstandigenaftrek | subtract | −zelfstandigenaftrek |
//! | 60  | Startersaftrek | subtract | −startersaftrek |
//! | 70  | MKB vrijstelling | subtract | −(absolute override, or after deductions × rate) |
//! | 80  | Taxable profit | result | sum of lines 10–70 |
//! | 90  | Income tax | tax | taxable profit × box1_rate |
//! | 100 | Arbeidskorting | credit | −arbeidskorting(max(0, after deductions)) |
//! | 110 | Final income tax | result | line 90 + line 100 |
//!
//! Net cash is revenue minus depreciation minus the final income tax.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use rust_decimal_macros::dec;
//! use vrijekas_core::calculations::statement;
//!
//! let snapshot: BTreeMap<String, _> = [
//!     ("hrs_home", dec!(500)),
//!     ("rate_home", dec!(50)),
//!     ("hrs_onsite", dec!(500)),
//!     ("rate_onsite", dec!(70)),
//!     ("tesla_price", dec!(50000)),
//!     ("vat_recovered", dec!(8678)),
//!     ("depr_years", dec!(5)),
//!     ("bijtelling", dec!(9091)),
//!     ("zelfstandigenaftrek", dec!(1200)),
//!     ("startersaftrek", dec!(2123)),
//!     ("mkb_vrijstelling_pct", dec!(0.127)),
//!     ("box1_rate", dec!(0.1785)),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v))
//! .collect();
//!
//! let result = statement::compute(&snapshot).unwrap();
//!
//! assert_eq!(result.outputs.total_revenue, dec!(60000));
//! assert_eq!(result.outputs.final_income_tax, dec!(4328.92772192));
//! assert_eq!(result.lines.len(), 11);
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calculations::schedules::{arbeidskorting, kia};
use crate::models::{LineKind, StatementLine};

/// Variable keys read and written by the statement.
pub mod keys {
    pub const HRS_HOME: &str = "hrs_home";
    pub const RATE_HOME: &str = "rate_home";
    pub const HRS_ONSITE: &str = "hrs_onsite";
    pub const RATE_ONSITE: &str = "rate_onsite";
    pub const TESLA_PRICE: &str = "tesla_price";
    pub const VAT_RECOVERED: &str = "vat_recovered";
    pub const DEPR_YEARS: &str = "depr_years";
    pub const BIJTELLING: &str = "bijtelling";
    pub const ZELFSTANDIGENAFTREK: &str = "zelfstandigenaftrek";
    pub const STARTERSAFTREK: &str = "startersaftrek";
    pub const MKB_VRIJSTELLING_PCT: &str = "mkb_vrijstelling_pct";
    pub const BOX1_RATE: &str = "box1_rate";

    /// Absolute MKB exemption. An input when the user supplies it, otherwise
    /// a derived output.
    pub const MKB_VRIJSTELLING: &str = "mkb_vrijstelling";

    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const NET_INVESTMENT: &str = "net_investment";
    pub const DEPRECIATION: &str = "depreciation";
    pub const KIA: &str = "kia";
    pub const PROFIT_BEFORE: &str = "profit_before";
    pub const AFTER_DEDUCTIONS: &str = "after_deductions";
    pub const TAXABLE_PROFIT: &str = "taxable_profit";
    pub const TAX_BEFORE_CREDIT: &str = "tax_before_credit";
    pub const ARBEIDSKORTING: &str = "arbeidskorting";
    pub const FINAL_INCOME_TAX: &str = "final_income_tax";
    pub const NET_CASH: &str = "net_cash";

    /// Derived keys that a user may take over with an absolute value.
    pub const OVERRIDABLE: &[&str] = &[MKB_VRIJSTELLING];

    /// Keys the statement reads from the input snapshot.
    pub const INPUTS: &[&str] = &[
        HRS_HOME,
        RATE_HOME,
        HRS_ONSITE,
        RATE_ONSITE,
        TESLA_PRICE,
        VAT_RECOVERED,
        DEPR_YEARS,
        BIJTELLING,
        ZELFSTANDIGENAFTREK,
        STARTERSAFTREK,
        MKB_VRIJSTELLING_PCT,
        BOX1_RATE,
        MKB_VRIJSTELLING,
    ];
}

/// Errors that can occur while building or computing a statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    /// A required variable is absent from the snapshot.
    #[error("missing required variable '{0}'")]
    MissingKey(String),

    /// A variable is present but its value cannot be used.
    #[error("invalid value {value} for '{key}': {reason}")]
    InvalidInput {
        key: String,
        value: Decimal,
        reason: &'static str,
    },

    /// An intermediate amount exceeds the decimal range.
    #[error("'{0}' does not fit in a decimal")]
    Overflow(&'static str),
}

fn overflow(output: &'static str) -> impl FnOnce() -> StatementError {
    move || StatementError::Overflow(output)
}

/// Where the MKB exemption comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MkbExemption {
    /// A fixed amount supplied by the user.
    Absolute(Decimal),
    /// A fraction of the profit after deductions.
    Rate(Decimal),
}

/// Typed inputs for the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementInput {
    pub hrs_home: Decimal,
    pub rate_home: Decimal,
    pub hrs_onsite: Decimal,
    pub rate_onsite: Decimal,
    pub tesla_price: Decimal,
    pub vat_recovered: Decimal,
    /// Years over which the net investment is written off. Must be non-zero.
    pub depr_years: Decimal,
    pub bijtelling: Decimal,
    pub zelfstandigenaftrek: Decimal,
    pub startersaftrek: Decimal,
    pub mkb_exemption: MkbExemption,
    pub box1_rate: Decimal,
}

impl StatementInput {
    /// Reads every required key from a variable snapshot.
    ///
    /// An absolute `mkb_vrijstelling` in the snapshot wins over
    /// `mkb_vrijstelling_pct`; the rate is only required when no absolute
    /// value is present.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError::MissingKey`] for the first absent key.
    pub fn from_snapshot(snapshot: &BTreeMap<String, Decimal>) -> Result<Self, StatementError> {
        let get = |key: &str| {
            snapshot
                .get(key)
                .copied()
                .ok_or_else(|| StatementError::MissingKey(key.to_string()))
        };

        let mkb_exemption = match snapshot.get(keys::MKB_VRIJSTELLING) {
            Some(amount) => MkbExemption::Absolute(*amount),
            None => MkbExemption::Rate(get(keys::MKB_VRIJSTELLING_PCT)?),
        };

        Ok(Self {
            hrs_home: get(keys::HRS_HOME)?,
            rate_home: get(keys::RATE_HOME)?,
            hrs_onsite: get(keys::HRS_ONSITE)?,
            rate_onsite: get(keys::RATE_ONSITE)?,
            tesla_price: get(keys::TESLA_PRICE)?,
            vat_recovered: get(keys::VAT_RECOVERED)?,
            depr_years: get(keys::DEPR_YEARS)?,
            bijtelling: get(keys::BIJTELLING)?,
            zelfstandigenaftrek: get(keys::ZELFSTANDIGENAFTREK)?,
            startersaftrek: get(keys::STARTERSAFTREK)?,
            mkb_exemption,
            box1_rate: get(keys::BOX1_RATE)?,
        })
    }

    /// Checks values the arithmetic cannot handle.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError::InvalidInput`] when `depr_years` is zero.
    pub fn validate(&self) -> Result<(), StatementError> {
        if self.depr_years.is_zero() {
            return Err(StatementError::InvalidInput {
                key: keys::DEPR_YEARS.to_string(),
                value: self.depr_years,
                reason: "depreciation period must be non-zero",
            });
        }
        Ok(())
    }
}

/// Derived values of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementOutputs {
    pub total_revenue: Decimal,
    pub net_investment: Decimal,
    pub depreciation: Decimal,
    pub kia: Decimal,
    pub profit_before: Decimal,
    pub after_deductions: Decimal,
    pub mkb_vrijstelling: Decimal,
    pub taxable_profit: Decimal,
    pub tax_before_credit: Decimal,
    pub arbeidskorting: Decimal,
    pub final_income_tax: Decimal,
    pub net_cash: Decimal,

    /// True when the exemption was an absolute user value rather than a rate.
    pub mkb_overridden: bool,
}

impl StatementOutputs {
    /// Every output keyed by its variable name, in statement order.
    pub fn entries(&self) -> Vec<(&'static str, Decimal)> {
        vec![
            (keys::TOTAL_REVENUE, self.total_revenue),
            (keys::NET_INVESTMENT, self.net_investment),
            (keys::DEPRECIATION, self.depreciation),
            (keys::KIA, self.kia),
            (keys::PROFIT_BEFORE, self.profit_before),
            (keys::AFTER_DEDUCTIONS, self.after_deductions),
            (keys::MKB_VRIJSTELLING, self.mkb_vrijstelling),
            (keys::TAXABLE_PROFIT, self.taxable_profit),
            (keys::TAX_BEFORE_CREDIT, self.tax_before_credit),
            (keys::ARBEIDSKORTING, self.arbeidskorting),
            (keys::FINAL_INCOME_TAX, self.final_income_tax),
            (keys::NET_CASH, self.net_cash),
        ]
    }

    /// Outputs to write back as derived variables.
    ///
    /// An overridden exemption belongs to the user and is left out.
    pub fn derived_entries(&self) -> Vec<(&'static str, Decimal)> {
        self.entries()
            .into_iter()
            .filter(|(key, _)| !(self.mkb_overridden && *key == keys::MKB_VRIJSTELLING))
            .collect()
    }

    pub fn to_map(&self) -> BTreeMap<String, Decimal> {
        self.entries()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

/// Statement lines together with the derived values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementResult {
    pub lines: Vec<StatementLine>,
    pub outputs: StatementOutputs,
}

/// Calculator for the tax statement.
#[derive(Debug, Clone)]
pub struct TaxStatement {
    input: StatementInput,
}

impl TaxStatement {
    pub fn new(input: StatementInput) -> Self {
        Self { input }
    }

    /// Computes all lines and outputs.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError::InvalidInput`] if the input fails
    /// [`StatementInput::validate`], or [`StatementError::Overflow`] when an
    /// intermediate amount leaves the decimal range.
    pub fn compute(&self) -> Result<StatementResult, StatementError> {
        self.input.validate()?;
        let input = &self.input;

        let revenue = self.revenue()?;
        let net_investment = self.net_investment()?;
        let depreciation = self.depreciation(net_investment)?;
        let kia = kia(net_investment);
        let profit_before = revenue
            .checked_sub(depreciation)
            .and_then(|v| v.checked_add(input.bijtelling))
            .ok_or_else(overflow(keys::PROFIT_BEFORE))?;
        let after_deductions = self.after_deductions(profit_before, kia)?;
        let (mkb, mkb_overridden) = self.mkb_exemption(after_deductions)?;
        let taxable_profit = after_deductions
            .checked_sub(mkb)
            .ok_or_else(overflow(keys::TAXABLE_PROFIT))?;
        let arbeidskorting = arbeidskorting(after_deductions);
        let tax_before_credit = taxable_profit
            .checked_mul(input.box1_rate)
            .ok_or_else(overflow(keys::TAX_BEFORE_CREDIT))?;
        let final_income_tax = tax_before_credit
            .checked_sub(arbeidskorting)
            .ok_or_else(overflow(keys::FINAL_INCOME_TAX))?;
        let net_cash = revenue
            .checked_sub(depreciation)
            .and_then(|v| v.checked_sub(final_income_tax))
            .ok_or_else(overflow(keys::NET_CASH))?;

        debug!(
            revenue = %revenue,
            after_deductions = %after_deductions,
            taxable_profit = %taxable_profit,
            final_income_tax = %final_income_tax,
            net_cash = %net_cash,
            "statement computed"
        );

        let lines = vec![
            StatementLine::new(10, "Total revenue", revenue, LineKind::Add),
            StatementLine::new(20, "Depreciation", -depreciation, LineKind::Subtract),
            StatementLine::new(30, "KIA", -kia, LineKind::Subtract),
            StatementLine::new(40, "Bijtelling", input.bijtelling, LineKind::Add)
                .with_notes("tax only"),
            StatementLine::new(
                50,
                "Zelfstandigenaftrek",
                -input.zelfstandigenaftrek,
                LineKind::Subtract,
            ),
            StatementLine::new(60, "Startersaftrek", -input.startersaftrek, LineKind::Subtract),
            StatementLine::new(70, "MKB vrijstelling", -mkb, LineKind::Subtract),
            StatementLine::new(80, "Taxable profit", taxable_profit, LineKind::Result),
            StatementLine::new(90, "Income tax", tax_before_credit, LineKind::Tax),
            StatementLine::new(100, "Arbeidskorting", -arbeidskorting, LineKind::Credit),
            StatementLine::new(110, "Final income tax", final_income_tax, LineKind::Result),
        ];

        Ok(StatementResult {
            lines,
            outputs: StatementOutputs {
                total_revenue: revenue,
                net_investment,
                depreciation,
                kia,
                profit_before,
                after_deductions,
                mkb_vrijstelling: mkb,
                taxable_profit,
                tax_before_credit,
                arbeidskorting,
                final_income_tax,
                net_cash,
                mkb_overridden,
            },
        })
    }

    fn revenue(&self) -> Result<Decimal, StatementError> {
        let input = &self.input;
        let home = input.hrs_home.checked_mul(input.rate_home);
        let onsite = input.hrs_onsite.checked_mul(input.rate_onsite);
        home.zip(onsite)
            .and_then(|(home, onsite)| home.checked_add(onsite))
            .ok_or_else(overflow(keys::TOTAL_REVENUE))
    }

    fn net_investment(&self) -> Result<Decimal, StatementError> {
        let net_investment = self
            .input
            .tesla_price
            .checked_sub(self.input.vat_recovered)
            .ok_or_else(overflow(keys::NET_INVESTMENT))?;
        if net_investment < Decimal::ZERO {
            warn!(
                tesla_price = %self.input.tesla_price,
                vat_recovered = %self.input.vat_recovered,
                "Recovered VAT exceeds the purchase price; net investment is negative"
            );
        }
        Ok(net_investment)
    }

    fn depreciation(
        &self,
        net_investment: Decimal,
    ) -> Result<Decimal, StatementError> {
        net_investment
            .checked_div(self.input.depr_years)
            .ok_or_else(overflow(keys::DEPRECIATION))
    }

    fn after_deductions(
        &self,
        profit_before: Decimal,
        kia: Decimal,
    ) -> Result<Decimal, StatementError> {
        let after = profit_before
            .checked_sub(self.input.zelfstandigenaftrek)
            .and_then(|v| v.checked_sub(self.input.startersaftrek))
            .and_then(|v| v.checked_sub(kia))
            .ok_or_else(overflow(keys::AFTER_DEDUCTIONS))?;
        if after < Decimal::ZERO {
            warn!(
                profit_before = %profit_before,
                after_deductions = %after,
                "Profit after deductions is negative; arbeidskorting is computed on zero"
            );
        }
        Ok(after)
    }

    fn mkb_exemption(
        &self,
        after_deductions: Decimal,
    ) -> Result<(Decimal, bool), StatementError> {
        match self.input.mkb_exemption {
            MkbExemption::Absolute(amount) => Ok((amount, true)),
            MkbExemption::Rate(rate) => after_deductions
                .checked_mul(rate)
                .map(|mkb| (mkb, false))
                .ok_or_else(overflow(keys::MKB_VRIJSTELLING)),
        }
    }
}

/// Validates a snapshot and computes its statement.
///
/// # Errors
///
/// Any [`StatementError`]; no partial result is returned.
pub fn compute(snapshot: &BTreeMap<String, Decimal>) -> Result<StatementResult, StatementError> {
    let input = StatementInput::from_snapshot(snapshot)?;
    TaxStatement::new(input).compute()
}
