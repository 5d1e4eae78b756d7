//! Policy tables for the 2026 statement.
//!
//! Both schedules are fixed constants of the modelled tax year. They are
//! reproduced as published in the source tables, not derived.
//!
//! # Kleinschaligheidsinvesteringsaftrek (KIA)
//!
//! | Net investment | Deduction |
//! |----------------|-----------|
//! | ≤ 2,900        | 0 |
//! | > 2,900        | 28% of the net investment |
//!
//! The upper band starting at 69,765 would normally reduce the deduction.
//! It is deliberately not applied: every investment above the entry
//! threshold gets the flat 28%.
//!
//! # Arbeidskorting
//!
//! Applied to a proxy income `y = max(0, profit after deductions)`.
//!
//! | Proxy income        | Credit |
//! |---------------------|--------|
//! | ≤ 11,965            | 4.156% × y |
//! | 11,965 – 25,845     | 498 + 15.483% × (y − 11,965) |
//! | 25,845 – 45,592     | 2,647 + 0.974% × (y − 25,845) |
//! | > 45,592            | max(0, 2,840 − 3.25% × (y − 45,592)) |
//!
//! Each band is inclusive of its upper bound. The published base amounts
//! are rounded to whole euros, so adjacent bands meet to within a euro
//! rather than exactly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::calculations::common::max;

/// Net investment at or below which no KIA is granted.
pub const KIA_ENTRY_THRESHOLD: Decimal = dec!(2900);

/// Start of the band where the KIA would taper. Not applied.
pub const KIA_UPPER_THRESHOLD: Decimal = dec!(69765);

pub const KIA_RATE: Decimal = dec!(0.28);

/// One linear band of the arbeidskorting schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditBand {
    /// Inclusive upper bound of the band, `None` for the open top band.
    pub upper: Option<Decimal>,
    /// Income at which the band starts.
    pub floor: Decimal,
    pub base: Decimal,
    /// Signed rate applied to income above `floor`.
    pub rate: Decimal,
}

impl CreditBand {
    fn credit(&self, income: Decimal) -> Decimal {
        self.base + self.rate * (income - self.floor)
    }
}

pub const ARBEIDSKORTING_BANDS: [CreditBand; 4] = [
    CreditBand {
        upper: Some(dec!(11965)),
        floor: Decimal::ZERO,
        base: Decimal::ZERO,
        rate: dec!(0.04156),
    },
    CreditBand {
        upper: Some(dec!(25845)),
        floor: dec!(11965),
        base: dec!(498),
        rate: dec!(0.15483),
    },
    CreditBand {
        upper: Some(dec!(45592)),
        floor: dec!(25845),
        base: dec!(2647),
        rate: dec!(0.00974),
    },
    CreditBand {
        upper: None,
        floor: dec!(45592),
        base: dec!(2840),
        rate: dec!(-0.03250),
    },
];

/// Investment deduction for the given net investment.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vrijekas_core::calculations::schedules::kia;
///
/// assert_eq!(kia(dec!(2900)), dec!(0));
/// assert_eq!(kia(dec!(41322)), dec!(11570.16));
/// ```
pub fn kia(net_investment: Decimal) -> Decimal {
    if net_investment <= KIA_ENTRY_THRESHOLD {
        Decimal::ZERO
    } else {
        net_investment * KIA_RATE
    }
}

/// Labour tax credit for the given proxy income.
///
/// Negative income is treated as zero and the credit never goes below zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use vrijekas_core::calculations::schedules::arbeidskorting;
///
/// assert_eq!(arbeidskorting(dec!(10000)), dec!(415.6));
/// assert_eq!(arbeidskorting(dec!(45933.44)), dec!(2828.9032));
/// assert_eq!(arbeidskorting(dec!(-500)), dec!(0));
/// ```
pub fn arbeidskorting(income: Decimal) -> Decimal {
    let y = max(Decimal::ZERO, income);
    let band = band_for(y);
    max(Decimal::ZERO, band.credit(y))
}

fn band_for(income: Decimal) -> &'static CreditBand {
    ARBEIDSKORTING_BANDS
        .iter()
        .find(|band| band.upper.is_none_or(|upper| income <= upper))
        .unwrap_or(&ARBEIDSKORTING_BANDS[ARBEIDSKORTING_BANDS.len() - 1])
}
