//! Compensation formulas.
//!
//! [`resolve`] turns a payee's [`CompensationConfig`] and monthly USD basis
//! into a gross payout before bonuses and fines.  Only the arm matching the
//! configured variant runs.  A missing basis (net revenue not reported) is
//! not an error: the payout is zero and the resolution is flagged.

use crate::currency::show;
use crate::error::FieldIssue;
use crate::models::{BreakdownKind, CompensationConfig, Currency, Money};
use rust_decimal::Decimal;

/// The gross payout produced by one compensation formula.
///
/// Amounts are kept per currency because a hybrid deal can pair a USD
/// percentage with a EUR flat fee; the line builder reconciles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub usd: Decimal,
    pub eur: Decimal,
    pub component: BreakdownKind,
    pub formula: String,
    pub net_revenue_missing: bool,
}

impl Resolution {
    fn money(fee: Money) -> (Decimal, Decimal) {
        match fee.currency {
            Currency::Usd => (fee.amount, Decimal::ZERO),
            Currency::Eur => (Decimal::ZERO, fee.amount),
        }
    }
}

/// Checks that `value` is a percentage in `[0, 100]`.
pub(crate) fn check_percentage(field: &str, value: Decimal) -> Option<FieldIssue> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        Some(FieldIssue::new(
            field,
            format!("percentage {value} is outside [0, 100]"),
        ))
    } else {
        None
    }
}

/// Largest magnitude accepted for any money figure, in either currency.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Checks that `value` lies within `±limit`.  Inputs past the bound are
/// rejected before any arithmetic runs on them.
pub(crate) fn check_magnitude(field: &str, value: Decimal, limit: Decimal) -> Option<FieldIssue> {
    (value.abs() > limit).then(|| {
        FieldIssue::new(field, format!("value {value} exceeds the limit of {limit}"))
    })
}

fn check_amount(field: &str, value: Decimal) -> Option<FieldIssue> {
    if value < Decimal::ZERO {
        Some(FieldIssue::new(field, format!("amount {value} is negative")))
    } else {
        check_magnitude(field, value, MAX_AMOUNT)
    }
}

/// Returns every invariant violation in `config`.
pub fn validate_config(config: &CompensationConfig) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    match config {
        CompensationConfig::None => {}
        CompensationConfig::Percentage { pct } => {
            issues.extend(check_percentage("compensation.pct", *pct));
        }
        CompensationConfig::FlatFee { amount, .. } => {
            issues.extend(check_amount("compensation.amount", *amount));
        }
        CompensationConfig::Hybrid { pct, flat_fee } => {
            issues.extend(check_percentage("compensation.pct", *pct));
            issues.extend(check_amount(
                "compensation.flat_fee.amount",
                flat_fee.amount,
            ));
        }
        CompensationConfig::TieredDeal {
            monthly_threshold_usd,
            flat_under_threshold,
            percent_above_threshold,
        } => {
            match monthly_threshold_usd {
                Some(threshold) => issues.extend(check_amount(
                    "compensation.monthly_threshold_usd",
                    *threshold,
                )),
                None => issues.push(FieldIssue::new(
                    "compensation.monthly_threshold_usd",
                    "tiered deal requires a monthly threshold",
                )),
            }
            match flat_under_threshold {
                Some(flat) => issues.extend(check_amount(
                    "compensation.flat_under_threshold.amount",
                    flat.amount,
                )),
                None => issues.push(FieldIssue::new(
                    "compensation.flat_under_threshold",
                    "tiered deal requires a flat amount under the threshold",
                )),
            }
            match percent_above_threshold {
                Some(pct) => {
                    issues.extend(check_percentage("compensation.percent_above_threshold", *pct))
                }
                None => issues.push(FieldIssue::new(
                    "compensation.percent_above_threshold",
                    "tiered deal requires a percentage above the threshold",
                )),
            }
        }
    }
    issues
}

fn revenue_label(basis_usd: Option<Decimal>) -> String {
    basis_usd.map_or_else(|| "missing".to_string(), show)
}

/// Computes the gross payout for `config` against `basis_usd`.
///
/// Returns `Ok(None)` for [`CompensationConfig::None`].  Expects `config`
/// to have passed [`validate_config`]; an incomplete tiered deal is
/// reported as an error rather than guessed.
pub fn resolve(
    config: &CompensationConfig,
    basis_usd: Option<Decimal>,
) -> Result<Option<Resolution>, FieldIssue> {
    let resolution = match config {
        CompensationConfig::None => return Ok(None),
        CompensationConfig::Percentage { pct } => {
            let factor = *pct / Decimal::ONE_HUNDRED;
            let payout = basis_usd.map_or(Decimal::ZERO, |basis| basis * factor);
            Resolution {
                usd: payout,
                eur: Decimal::ZERO,
                component: BreakdownKind::Percentage {
                    basis_usd,
                    pct: *pct,
                    payout_usd: payout,
                },
                formula: format!(
                    "revenue({}) * {} = {}",
                    revenue_label(basis_usd),
                    show(factor),
                    show(payout)
                ),
                net_revenue_missing: basis_usd.is_none(),
            }
        }
        CompensationConfig::FlatFee { amount, currency } => {
            let fee = Money::new(*amount, *currency);
            let (usd, eur) = Resolution::money(fee);
            Resolution {
                usd,
                eur,
                component: BreakdownKind::FlatFee { fee },
                formula: format!("flat_fee({} {}) = {}", show(*amount), currency, show(*amount)),
                net_revenue_missing: false,
            }
        }
        CompensationConfig::Hybrid { pct, flat_fee } => {
            let factor = *pct / Decimal::ONE_HUNDRED;
            match basis_usd {
                Some(basis) => {
                    let percent_part = basis * factor;
                    let (flat_usd, flat_eur) = Resolution::money(*flat_fee);
                    Resolution {
                        usd: percent_part + flat_usd,
                        eur: flat_eur,
                        component: BreakdownKind::Hybrid {
                            basis_usd,
                            pct: *pct,
                            percent_part_usd: percent_part,
                            flat_fee: *flat_fee,
                        },
                        formula: format!(
                            "revenue({}) * {} + flat_fee({} {}) = {} USD + {} {}",
                            show(basis),
                            show(factor),
                            show(flat_fee.amount),
                            flat_fee.currency,
                            show(percent_part),
                            show(flat_fee.amount),
                            flat_fee.currency
                        ),
                        net_revenue_missing: false,
                    }
                }
                None => Resolution {
                    usd: Decimal::ZERO,
                    eur: Decimal::ZERO,
                    component: BreakdownKind::Hybrid {
                        basis_usd: None,
                        pct: *pct,
                        percent_part_usd: Decimal::ZERO,
                        flat_fee: *flat_fee,
                    },
                    formula: "revenue(missing) -> hybrid payout withheld = 0".to_string(),
                    net_revenue_missing: true,
                },
            }
        }
        CompensationConfig::TieredDeal {
            monthly_threshold_usd,
            flat_under_threshold,
            percent_above_threshold,
        } => {
            let threshold = monthly_threshold_usd.ok_or_else(|| {
                FieldIssue::new("compensation.monthly_threshold_usd", "missing")
            })?;
            let flat = flat_under_threshold.ok_or_else(|| {
                FieldIssue::new("compensation.flat_under_threshold", "missing")
            })?;
            let pct = percent_above_threshold.ok_or_else(|| {
                FieldIssue::new("compensation.percent_above_threshold", "missing")
            })?;
            resolve_tiered(threshold, flat, pct, basis_usd)
        }
    };
    Ok(Some(resolution))
}

fn resolve_tiered(
    threshold: Decimal,
    flat: Money,
    pct: Decimal,
    revenue_usd: Option<Decimal>,
) -> Resolution {
    let Some(revenue) = revenue_usd else {
        return Resolution {
            usd: Decimal::ZERO,
            eur: Decimal::ZERO,
            component: BreakdownKind::TieredDeal {
                revenue_usd: None,
                threshold_usd: threshold,
                above_threshold: false,
                payout: Money::new(Decimal::ZERO, flat.currency),
            },
            formula: format!("revenue(missing) vs threshold({}) = 0", show(threshold)),
            net_revenue_missing: true,
        };
    };

    // The threshold itself still earns the flat amount.
    if revenue <= threshold {
        let (usd, eur) = Resolution::money(flat);
        Resolution {
            usd,
            eur,
            component: BreakdownKind::TieredDeal {
                revenue_usd,
                threshold_usd: threshold,
                above_threshold: false,
                payout: flat,
            },
            formula: format!(
                "revenue({}) <= threshold({}) -> flat({} {}) = {}",
                show(revenue),
                show(threshold),
                show(flat.amount),
                flat.currency,
                show(flat.amount)
            ),
            net_revenue_missing: false,
        }
    } else {
        let factor = pct / Decimal::ONE_HUNDRED;
        let payout = revenue * factor;
        Resolution {
            usd: payout,
            eur: Decimal::ZERO,
            component: BreakdownKind::TieredDeal {
                revenue_usd,
                threshold_usd: threshold,
                above_threshold: true,
                payout: Money::new(payout, Currency::Usd),
            },
            formula: format!(
                "revenue({}) > threshold({}) -> revenue({}) * {} = {}",
                show(revenue),
                show(threshold),
                show(revenue),
                show(factor),
                show(payout)
            ),
            net_revenue_missing: false,
        }
    }
}
