//! Payout computation engine.
//!
//! The `engine` module turns a month's [`MonthInputs`] into a [`Preview`]:
//! one [`PayoutLine`] per active payee plus totals.  Inputs are validated
//! up front, aggregated once, and each payee's line is then built
//! independently, in parallel via [`rayon`].  A preview is never persisted
//! and depends only on its inputs and FX rate, so repeated calls return
//! identical lines.

use crate::basis::{aggregate, MonthBasis};
use crate::buckets::{allocate, validate_buckets, validate_snapshot};
use crate::category::{categorize, Category};
use crate::compensation::{
    check_magnitude, check_percentage, resolve, validate_config, Resolution, MAX_AMOUNT,
};
use crate::currency::{convert, normalize, round_money, show, FxRate, RateOrigin, ResolvedRate};
use crate::error::{FieldIssue, PayoutError, ValidationError};
use crate::models::{
    BasisEntry, Breakdown, BreakdownFlags, BreakdownKind, CompensationConfig, Currency, MonthId,
    MonthInputs, PaidStatus, Payee, PayoutLine,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Sums for one category of payees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub lines: usize,
    pub payout_usd: Decimal,
    pub payout_eur: Decimal,
}

/// Sums over a set of payout lines, from their rounded amounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PayoutTotals {
    pub lines: usize,
    pub payout_usd: Decimal,
    pub payout_eur: Decimal,
    /// Lines whose USD (resp. EUR) amount could not be derived and is
    /// therefore missing from `payout_usd` (resp. `payout_eur`).
    pub usd_unavailable: usize,
    pub eur_unavailable: usize,
    pub by_category: BTreeMap<Category, CategoryTotals>,
}

impl PayoutTotals {
    pub fn from_lines(lines: &[PayoutLine]) -> Self {
        let mut totals = Self::default();
        for line in lines {
            totals.lines += 1;
            let category = totals.by_category.entry(line.category).or_default();
            category.lines += 1;
            match line.amount_usd {
                Some(usd) => {
                    totals.payout_usd += usd;
                    category.payout_usd += usd;
                }
                None => totals.usd_unavailable += 1,
            }
            match line.amount_eur {
                Some(eur) => {
                    totals.payout_eur += eur;
                    category.payout_eur += eur;
                }
                None => totals.eur_unavailable += 1,
            }
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewDebug {
    pub fx_rate: Option<Decimal>,
    pub fx_origin: RateOrigin,
    pub payees_read: usize,
    pub payees_inactive: usize,
    pub entries_read: usize,
}

/// The result of `compute_preview`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub month_id: MonthId,
    pub lines: Vec<PayoutLine>,
    pub totals: PayoutTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<PreviewDebug>,
}

/// Largest hour count accepted on a single hourly entry.
pub const MAX_HOURS: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Checks every configuration invariant for the month's active payees,
/// and the limits on every figure that feeds the month's arithmetic.
///
/// All violations are collected so one response names every payee and
/// field to fix.
pub fn validate_month(inputs: &MonthInputs) -> Result<(), PayoutError> {
    let mut errors: Vec<ValidationError> = Vec::new();
    let mut active: HashSet<&str> = HashSet::new();
    let mut managers: Vec<&str> = Vec::new();

    for payee in inputs.payees.iter().filter(|p| p.is_active()) {
        let category = categorize(&payee.role, &payee.department);
        active.insert(payee.id.as_str());

        let mut issues = validate_config(&payee.compensation);
        if category == Category::Manager {
            issues.extend(validate_buckets(&payee.buckets));
            managers.push(payee.id.as_str());
        }
        errors.extend(issues.into_iter().map(|issue| issue.for_payee(&payee.id)));
    }

    if let Some(snapshot) = &inputs.agency_revenue {
        let issues = validate_snapshot(snapshot);
        for manager in &managers {
            errors.extend(issues.iter().cloned().map(|issue| issue.for_payee(manager)));
        }
    }

    for assignment in &inputs.affiliate_assignments {
        if active.contains(assignment.affiliate_id.as_str()) {
            if let Some(issue) = check_percentage(
                "affiliate.affiliator_percentage",
                assignment.affiliator_percentage,
            ) {
                errors.push(issue.for_payee(&assignment.affiliate_id));
            }
        }
    }

    // Every record is aggregated whether or not its payee is active.
    for entry in &inputs.entries {
        errors.extend(
            validate_entry(entry)
                .into_iter()
                .map(|issue| issue.for_payee(entry.payee_id())),
        );
    }
    for record in &inputs.model_revenue {
        let figures = [
            ("model_revenue.gross_revenue_usd", Some(record.gross_revenue_usd)),
            ("model_revenue.net_revenue_usd", record.net_revenue_usd),
        ];
        for (field, value) in figures {
            if let Some(issue) = value.and_then(|v| check_magnitude(field, v, MAX_AMOUNT)) {
                errors.push(issue.for_payee(&record.model_id));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        warn!(count = errors.len(), "payout configuration rejected");
        Err(PayoutError::Validation(errors))
    }
}

fn validate_entry(entry: &BasisEntry) -> Vec<FieldIssue> {
    let checks = match entry {
        BasisEntry::Sales {
            gross_usd,
            payout_pct,
            ..
        } => vec![
            check_magnitude("sales.gross_usd", *gross_usd, MAX_AMOUNT),
            check_percentage("sales.payout_pct", *payout_pct),
        ],
        BasisEntry::Bonus { amount_eur, .. } => {
            vec![check_magnitude("bonus.amount_eur", *amount_eur, MAX_AMOUNT)]
        }
        BasisEntry::Fine { amount_eur, .. } => {
            vec![check_magnitude("fine.amount_eur", *amount_eur, MAX_AMOUNT)]
        }
        BasisEntry::Hourly {
            hours, rate_eur, ..
        } => vec![
            check_magnitude("hourly.hours", *hours, MAX_HOURS),
            check_magnitude("hourly.rate_eur", *rate_eur, MAX_AMOUNT),
        ],
    };
    checks.into_iter().flatten().collect()
}

/// Recomputes the month's payout lines from the given inputs.
///
/// Lines are ordered by category, then payee name, then payee id.
pub fn compute_preview(
    month: &MonthId,
    inputs: &MonthInputs,
    fx: ResolvedRate,
    with_debug: bool,
) -> Result<Preview, PayoutError> {
    validate_month(inputs)?;
    let basis = aggregate(inputs);

    let active: Vec<&Payee> = inputs.payees.iter().filter(|p| p.is_active()).collect();
    let mut lines: Vec<PayoutLine> = active
        .par_iter()
        .map(|payee| build_line(payee, &basis, fx.rate))
        .collect::<Result<Vec<_>, ValidationError>>()
        .map_err(|err| PayoutError::Validation(vec![err]))?;

    lines.sort_by(|a, b| {
        (a.category, &a.payee_name, &a.payee_id).cmp(&(b.category, &b.payee_name, &b.payee_id))
    });

    let totals = PayoutTotals::from_lines(&lines);
    info!(
        month = %month,
        lines = totals.lines,
        total_usd = %totals.payout_usd,
        total_eur = %totals.payout_eur,
        "computed payout preview"
    );

    let debug = with_debug.then(|| PreviewDebug {
        fx_rate: fx.rate.map(|rate| rate.value()),
        fx_origin: fx.origin,
        payees_read: inputs.payees.len(),
        payees_inactive: inputs.payees.len() - active.len(),
        entries_read: inputs.entries.len(),
    });

    Ok(Preview {
        month_id: month.clone(),
        lines,
        totals,
        debug,
    })
}

/// Accumulates contributions in the line's native currency.
struct LineBuilder {
    native: Currency,
    fx: Option<FxRate>,
    components: Vec<BreakdownKind>,
    terms: Vec<String>,
    gross: Decimal,
    flags: BreakdownFlags,
}

impl LineBuilder {
    fn new(native: Currency, fx: Option<FxRate>) -> Self {
        Self {
            native,
            fx,
            components: Vec::new(),
            terms: Vec::new(),
            gross: Decimal::ZERO,
            flags: BreakdownFlags::default(),
        }
    }

    /// Converts into the native currency; a conversion without a rate is
    /// dropped and flagged.
    fn to_native(&mut self, amount: Decimal, currency: Currency) -> Decimal {
        if amount.is_zero() {
            return Decimal::ZERO;
        }
        match convert(amount, currency, self.native, self.fx) {
            Some(value) => value,
            None => {
                self.flags.currency_unavailable = true;
                Decimal::ZERO
            }
        }
    }

    fn add(&mut self, component: BreakdownKind, usd: Decimal, eur: Decimal, formula: String) {
        let native = self.to_native(usd, Currency::Usd) + self.to_native(eur, Currency::Eur);
        self.gross += native;
        self.components.push(component);
        self.terms.push(formula);
    }

    fn add_resolution(&mut self, resolution: Option<Resolution>) {
        if let Some(resolution) = resolution {
            self.flags.net_revenue_missing |= resolution.net_revenue_missing;
            self.add(
                resolution.component,
                resolution.usd,
                resolution.eur,
                resolution.formula,
            );
        }
    }
}

/// Builds the payout line for one payee.
pub fn build_line(
    payee: &Payee,
    basis: &MonthBasis,
    fx: Option<FxRate>,
) -> Result<PayoutLine, ValidationError> {
    let category = categorize(&payee.role, &payee.department);
    let native = category.native_currency();
    let own = basis.payee(&payee.id);
    let mut builder = LineBuilder::new(native, fx);
    let mut basis_webapp = own.webapp_usd;
    let basis_manual = own.manual_usd;

    let resolve_for = |config: &CompensationConfig, basis_usd: Option<Decimal>| {
        resolve(config, basis_usd).map_err(|issue| issue.for_payee(&payee.id))
    };

    match category {
        Category::Chatter => {
            let payout = own.sales_total_usd();
            builder.add(
                BreakdownKind::Sales {
                    webapp_usd: own.webapp_usd,
                    manual_usd: own.manual_usd,
                    payout_usd: payout,
                },
                payout,
                Decimal::ZERO,
                format!(
                    "sales(webapp {} + manual {}) = {}",
                    show(own.webapp_usd),
                    show(own.manual_usd),
                    show(payout)
                ),
            );
        }
        Category::Va => {
            if !own.hours.is_zero() || !own.hourly_eur.is_zero() {
                builder.add(
                    BreakdownKind::Hourly {
                        hours: own.hours,
                        payout_eur: own.hourly_eur,
                    },
                    Decimal::ZERO,
                    own.hourly_eur,
                    format!("hours({}) -> {} EUR", show(own.hours), show(own.hourly_eur)),
                );
            }
            builder.add_resolution(resolve_for(
                &payee.compensation,
                Some(own.sales_total_usd()),
            )?);
        }
        Category::Manager => {
            let allocation = allocate(&payee.buckets, payee.payout_scope, basis.agency_revenue())
                .map_err(|issues| {
                    issues
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| FieldIssue::new("buckets", "invalid configuration"))
                        .for_payee(&payee.id)
                })?;
            if !payee.buckets.is_empty() {
                builder.flags.snapshot_missing = allocation.snapshot_missing;
            }
            builder.add(
                allocation.component,
                Decimal::ZERO,
                allocation.payout_eur,
                allocation.formula,
            );
            builder.add_resolution(resolve_for(
                &payee.compensation,
                Some(own.sales_total_usd()),
            )?);
        }
        Category::Model => {
            let net = basis.model_net_revenue(&payee.id);
            if net.is_none() {
                warn!(payee = %payee.id, "net revenue missing for model");
            }
            basis_webapp = net.unwrap_or(Decimal::ZERO);
            builder.add_resolution(resolve_for(
                &payee.compensation,
                net.map(|n| n + basis_manual),
            )?);
        }
        Category::Affiliate => {
            if let Some(revenue) = basis.affiliate_revenue(&payee.id) {
                if !revenue.missing_models.is_empty() {
                    warn!(
                        payee = %payee.id,
                        models = ?revenue.missing_models,
                        "net revenue missing for assigned models"
                    );
                    builder.flags.net_revenue_missing = true;
                }
                basis_webapp = revenue.net_revenue_usd.unwrap_or(Decimal::ZERO);
                let config = CompensationConfig::Percentage {
                    pct: revenue.affiliator_percentage,
                };
                builder.add_resolution(resolve_for(
                    &config,
                    revenue.net_revenue_usd.map(|n| n + basis_manual),
                )?);
            }
        }
    }

    let bonus_native = builder.to_native(own.bonus_eur, Currency::Eur);
    let fines_native = builder.to_native(own.fine_eur, Currency::Eur);
    let gross = builder.gross;
    let payout_native = gross + bonus_native - fines_native;
    let payout_amount = round_money(payout_native);

    let dual = match native {
        Currency::Usd => normalize(Some(payout_native), None, fx),
        Currency::Eur => normalize(None, Some(payout_native), fx),
    };

    if builder.components.is_empty() {
        builder.components.push(BreakdownKind::Unconfigured);
        builder.terms.push("no compensation = 0".to_string());
    }
    let gross_terms = builder.terms.join(" + ");
    let formula = format!(
        "{gross_terms}; gross({gross}) + bonus({bonus} EUR = {bonus_n} {native}) - fines({fine} EUR = {fine_n} {native}) = {payout} {native}",
        gross = show(round_money(gross)),
        bonus = show(own.bonus_eur),
        bonus_n = show(round_money(bonus_native)),
        fine = show(own.fine_eur),
        fine_n = show(round_money(fines_native)),
        payout = show(payout_amount),
    );

    debug!(
        payee = %payee.id,
        category = %category,
        payout = %payout_amount,
        currency = %native,
        "built payout line"
    );

    Ok(PayoutLine {
        line_id: None,
        payee_id: payee.id.clone(),
        payee_name: payee.name.clone(),
        role: payee.role.clone(),
        department: payee.department.clone(),
        category,
        currency: native,
        basis_webapp_amount: round_money(basis_webapp),
        basis_manual_amount: round_money(basis_manual),
        bonus_amount: round_money(own.bonus_eur),
        adjustments_amount: Decimal::ZERO - round_money(own.fine_eur),
        basis_total: round_money(basis_webapp + basis_manual),
        payout_amount,
        amount_usd: dual.usd,
        amount_eur: dual.eur,
        breakdown: Breakdown {
            components: builder.components,
            gross_payout: gross,
            bonus_native,
            fines_native,
            fx_rate: fx.map(|rate| rate.value()),
            formula,
            flags: builder.flags,
        },
        paid_status: PaidStatus::Pending,
        paid_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::MIN_FX_RATE;
    use crate::models::{
        AffiliateAssignment, AgencyRevenueSnapshot, BucketPercentages, ModelRevenue, Money,
        PayeeStatus, PayoutScope, SalesSource,
    };
    use std::collections::BTreeSet;
    use std::str::FromStr;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn month() -> MonthId {
        MonthId::parse("2025-06").unwrap()
    }

    fn fx(rate: &str) -> ResolvedRate {
        ResolvedRate::requested(FxRate::new(d(rate)).unwrap())
    }

    fn payee(id: &str, name: &str, role: &str, department: &str) -> Payee {
        Payee {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            department: department.into(),
            status: PayeeStatus::Active,
            compensation: CompensationConfig::None,
            buckets: BucketPercentages::default(),
            payout_scope: PayoutScope::TotalNet,
        }
    }

    fn chatter_month() -> MonthInputs {
        MonthInputs {
            payees: vec![payee("c1", "Ana", "chatter", "chatting")],
            entries: vec![
                BasisEntry::Sales {
                    payee_id: "c1".into(),
                    gross_usd: d("5000"),
                    payout_pct: d("10"),
                    source: SalesSource::Webapp,
                },
                BasisEntry::Bonus {
                    payee_id: "c1".into(),
                    amount_eur: d("50"),
                },
                BasisEntry::Fine {
                    payee_id: "c1".into(),
                    amount_eur: d("20"),
                },
            ],
            ..MonthInputs::default()
        }
    }

    #[test]
    fn test_chatter_end_to_end() {
        let preview = compute_preview(&month(), &chatter_month(), fx("0.92"), false).unwrap();
        let line = &preview.lines[0];
        assert_eq!(line.category, Category::Chatter);
        assert_eq!(line.currency, Currency::Usd);
        assert_eq!(line.basis_total, d("500"));
        assert_eq!(line.bonus_amount, d("50"));
        assert_eq!(line.adjustments_amount, d("-20"));
        assert_eq!(line.fines_display(), d("20"));
        assert_eq!(line.payout_amount, d("532.61"));
        assert_eq!(line.amount_usd, Some(d("532.61")));
        assert_eq!(line.amount_eur, Some(d("490.00")));
        assert!(line.breakdown.formula.starts_with("sales(webapp 500 + manual 0) = 500;"));
        assert!(line.breakdown.formula.ends_with("= 532.61 USD"));
    }

    #[test]
    fn test_preview_is_idempotent() {
        let mut inputs = chatter_month();
        inputs.payees.push(payee("c0", "Zed", "chatter", "chatting"));
        inputs.payees.push(payee("v1", "Bo", "va", "ops"));
        let first = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap();
        let second = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap();
        assert_eq!(
            serde_json::to_string(&first.lines).unwrap(),
            serde_json::to_string(&second.lines).unwrap()
        );
        let names: Vec<_> = first.lines.iter().map(|l| l.payee_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Zed", "Bo"]);
    }

    #[test]
    fn test_inactive_payees_are_skipped() {
        let mut inputs = chatter_month();
        inputs.payees[0].status = PayeeStatus::Inactive;
        let preview = compute_preview(&month(), &inputs, fx("0.92"), true).unwrap();
        assert!(preview.lines.is_empty());
        assert_eq!(preview.debug.unwrap().payees_inactive, 1);
    }

    #[test]
    fn test_model_with_missing_net_revenue() {
        let mut model = payee("m1", "Mia", "model", "models");
        model.compensation = CompensationConfig::Percentage { pct: d("40") };
        let inputs = MonthInputs {
            payees: vec![model],
            model_revenue: vec![ModelRevenue {
                model_id: "m1".into(),
                gross_revenue_usd: d("9000"),
                net_revenue_usd: None,
            }],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.payout_amount, Decimal::ZERO);
        assert!(line.breakdown.flags.net_revenue_missing);
    }

    #[test]
    fn test_model_percentage_of_net_revenue() {
        let mut model = payee("m1", "Mia", "model", "models");
        model.compensation = CompensationConfig::Percentage { pct: d("12") };
        let inputs = MonthInputs {
            payees: vec![model],
            model_revenue: vec![ModelRevenue {
                model_id: "m1".into(),
                gross_revenue_usd: d("5000"),
                net_revenue_usd: Some(d("4200")),
            }],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.basis_webapp_amount, d("4200"));
        assert_eq!(line.payout_amount, d("504"));
        assert_eq!(line.amount_eur, Some(d("463.68")));
        assert!(line.breakdown.formula.starts_with("revenue(4200) * 0.12 = 504;"));
        assert!(!line.breakdown.flags.net_revenue_missing);
    }

    #[test]
    fn test_manager_buckets_in_eur() {
        let mut manager = payee("mg1", "Lee", "Team Manager", "chatting");
        manager.buckets.chatting_total = Some(d("5"));
        manager.compensation = CompensationConfig::FlatFee {
            amount: d("500"),
            currency: Currency::Eur,
        };
        let inputs = MonthInputs {
            payees: vec![manager],
            agency_revenue: Some(AgencyRevenueSnapshot {
                chatting_net_eur: d("20000"),
                ..AgencyRevenueSnapshot::default()
            }),
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.8"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.category, Category::Manager);
        assert_eq!(line.currency, Currency::Eur);
        assert_eq!(line.payout_amount, d("1500"));
        assert_eq!(line.amount_usd, Some(d("1875.00")));
        assert_eq!(line.breakdown.components.len(), 2);
    }

    #[test]
    fn test_manager_without_snapshot_is_flagged() {
        let mut manager = payee("mg1", "Lee", "manager", "");
        manager.buckets.gunzo_total = Some(d("5"));
        let inputs = MonthInputs {
            payees: vec![manager],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.payout_amount, Decimal::ZERO);
        assert!(line.breakdown.flags.snapshot_missing);
    }

    #[test]
    fn test_va_hourly_plus_bonus() {
        let inputs = MonthInputs {
            payees: vec![payee("v1", "Bo", "va", "ops")],
            entries: vec![
                BasisEntry::Hourly {
                    payee_id: "v1".into(),
                    hours: d("40"),
                    rate_eur: d("6.5"),
                },
                BasisEntry::Bonus {
                    payee_id: "v1".into(),
                    amount_eur: d("15"),
                },
            ],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.payout_amount, d("275"));
        assert_eq!(line.amount_eur, Some(d("275.00")));
    }

    #[test]
    fn test_affiliate_share_of_assigned_models() {
        let inputs = MonthInputs {
            payees: vec![payee("a1", "Kai", "affiliate", "affiliate")],
            model_revenue: vec![
                ModelRevenue {
                    model_id: "m1".into(),
                    gross_revenue_usd: d("0"),
                    net_revenue_usd: Some(d("3000")),
                },
                ModelRevenue {
                    model_id: "m2".into(),
                    gross_revenue_usd: d("0"),
                    net_revenue_usd: Some(d("1000")),
                },
            ],
            affiliate_assignments: vec![AffiliateAssignment {
                affiliate_id: "a1".into(),
                model_ids: BTreeSet::from(["m1".to_string(), "m2".to_string()]),
                affiliator_percentage: d("5"),
            }],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.category, Category::Affiliate);
        assert_eq!(line.basis_total, d("4000"));
        assert_eq!(line.payout_amount, d("200"));
    }

    fn affiliate_month(net_revenue: &[(&str, Option<&str>)]) -> MonthInputs {
        MonthInputs {
            payees: vec![payee("a1", "Kai", "affiliate", "affiliate")],
            model_revenue: net_revenue
                .iter()
                .map(|(model_id, net)| ModelRevenue {
                    model_id: model_id.to_string(),
                    gross_revenue_usd: d("0"),
                    net_revenue_usd: net.map(d),
                })
                .collect(),
            affiliate_assignments: vec![AffiliateAssignment {
                affiliate_id: "a1".into(),
                model_ids: net_revenue.iter().map(|(id, _)| id.to_string()).collect(),
                affiliator_percentage: d("5"),
            }],
            ..MonthInputs::default()
        }
    }

    #[test]
    fn test_affiliate_sums_present_models_and_flags_missing() {
        let inputs = affiliate_month(&[("m1", Some("3000")), ("m2", None)]);
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.basis_total, d("3000"));
        assert_eq!(line.payout_amount, d("150"));
        assert!(line.breakdown.flags.net_revenue_missing);
    }

    #[test]
    fn test_affiliate_with_every_model_missing() {
        let inputs = affiliate_month(&[("m1", None), ("m2", None)]);
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.basis_total, Decimal::ZERO);
        assert_eq!(line.payout_amount, Decimal::ZERO);
        assert!(line.breakdown.flags.net_revenue_missing);
        assert!(line.breakdown.formula.starts_with("revenue(missing)"));
    }

    #[test]
    fn test_affiliate_without_assignment_gets_zero_line() {
        let inputs = MonthInputs {
            payees: vec![payee("a1", "Kai", "affiliate", "affiliate")],
            ..MonthInputs::default()
        };
        let preview = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap();
        assert_eq!(preview.lines.len(), 1);
        let line = &preview.lines[0];
        assert_eq!(line.basis_total, Decimal::ZERO);
        assert_eq!(line.payout_amount, Decimal::ZERO);
        assert!(!line.breakdown.flags.net_revenue_missing);
        assert_eq!(line.breakdown.components, vec![BreakdownKind::Unconfigured]);
        assert!(line.breakdown.formula.starts_with("no compensation = 0;"));
    }

    #[test]
    fn test_unconfigured_model_has_unconfigured_component() {
        let inputs = MonthInputs {
            payees: vec![payee("m1", "Mia", "model", "models")],
            ..MonthInputs::default()
        };
        let line = &compute_preview(&month(), &inputs, fx("0.92"), false)
            .unwrap()
            .lines[0];
        assert_eq!(line.breakdown.components, vec![BreakdownKind::Unconfigured]);
        assert_eq!(line.payout_amount, Decimal::ZERO);
    }

    #[test]
    fn test_smallest_rate_converts_bonus_without_overflow() {
        let preview = compute_preview(
            &month(),
            &chatter_month(),
            ResolvedRate::requested(FxRate::new(MIN_FX_RATE).unwrap()),
            false,
        )
        .unwrap();
        // 500 + (50 - 20) / 0.0001
        assert_eq!(preview.lines[0].payout_amount, d("300500"));
    }

    #[test]
    fn test_oversized_sales_are_rejected_before_computing() {
        let mut inputs = chatter_month();
        inputs.entries.push(BasisEntry::Sales {
            payee_id: "c1".into(),
            gross_usd: d("70000000000000000000000000000"),
            payout_pct: d("100"),
            source: SalesSource::Manual,
        });
        let err = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap_err();
        let PayoutError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].payee_id, "c1");
        assert_eq!(errors[0].field, "sales.gross_usd");
    }

    #[test]
    fn test_inactive_payee_records_are_still_checked() {
        let mut inputs = chatter_month();
        inputs.payees[0].status = PayeeStatus::Inactive;
        inputs.entries.push(BasisEntry::Hourly {
            payee_id: "c1".into(),
            hours: d("2000000"),
            rate_eur: d("10"),
        });
        inputs.model_revenue.push(ModelRevenue {
            model_id: "m9".into(),
            gross_revenue_usd: d("0"),
            net_revenue_usd: Some(d("-5000000000000")),
        });
        let PayoutError::Validation(errors) =
            compute_preview(&month(), &inputs, fx("0.92"), false).unwrap_err()
        else {
            panic!("expected validation error");
        };
        let found: Vec<_> = errors
            .iter()
            .map(|e| (e.payee_id.as_str(), e.field.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("c1", "hourly.hours"),
                ("m9", "model_revenue.net_revenue_usd")
            ]
        );
    }

    #[test]
    fn test_oversized_snapshot_names_each_manager() {
        let mut manager = payee("mg1", "Lee", "manager", "");
        manager.buckets.chatting_total = Some(d("5"));
        let inputs = MonthInputs {
            payees: vec![manager],
            agency_revenue: Some(AgencyRevenueSnapshot {
                chatting_net_eur: d("20000000000000"),
                ..AgencyRevenueSnapshot::default()
            }),
            ..MonthInputs::default()
        };
        let PayoutError::Validation(errors) =
            compute_preview(&month(), &inputs, fx("0.92"), false).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors[0].payee_id, "mg1");
        assert_eq!(errors[0].field, "agency_revenue.chatting_net_eur");
    }

    #[test]
    fn test_missing_rate_keeps_native_amount() {
        let mut model = payee("m1", "Mia", "model", "models");
        model.compensation = CompensationConfig::Hybrid {
            pct: d("10"),
            flat_fee: Money::new(d("100"), Currency::Eur),
        };
        let inputs = MonthInputs {
            payees: vec![model],
            model_revenue: vec![ModelRevenue {
                model_id: "m1".into(),
                gross_revenue_usd: d("0"),
                net_revenue_usd: Some(d("1000")),
            }],
            ..MonthInputs::default()
        };
        let unavailable = ResolvedRate {
            rate: None,
            origin: RateOrigin::Unavailable,
        };
        let preview = compute_preview(&month(), &inputs, unavailable, false).unwrap();
        let line = &preview.lines[0];
        assert_eq!(line.payout_amount, d("100"));
        assert_eq!(line.amount_usd, Some(d("100.00")));
        assert_eq!(line.amount_eur, None);
        assert!(line.breakdown.flags.currency_unavailable);
        assert_eq!(preview.totals.eur_unavailable, 1);
    }

    #[test]
    fn test_validation_collects_every_payee() {
        let mut manager = payee("mg1", "Lee", "manager", "");
        manager.buckets = BucketPercentages {
            chatting_total: Some(d("5")),
            chatting_msgs_tips: Some(d("3")),
            ..BucketPercentages::default()
        };
        let mut model = payee("m1", "Mia", "model", "models");
        model.compensation = CompensationConfig::Percentage { pct: d("140") };
        let inputs = MonthInputs {
            payees: vec![manager, model],
            ..MonthInputs::default()
        };
        let err = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap_err();
        let PayoutError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        let found: Vec<_> = errors
            .iter()
            .map(|e| (e.payee_id.as_str(), e.field.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![("mg1", "buckets.chatting"), ("m1", "compensation.pct")]
        );
    }

    #[test]
    fn test_totals_by_category() {
        let mut inputs = chatter_month();
        inputs.payees.push(payee("v1", "Bo", "va", "ops"));
        inputs.entries.push(BasisEntry::Hourly {
            payee_id: "v1".into(),
            hours: d("10"),
            rate_eur: d("9.2"),
        });
        let preview = compute_preview(&month(), &inputs, fx("0.92"), false).unwrap();
        assert_eq!(preview.totals.lines, 2);
        assert_eq!(preview.totals.payout_usd, d("632.61"));
        assert_eq!(preview.totals.payout_eur, d("582.00"));
        assert_eq!(preview.totals.by_category[&Category::Va].lines, 1);
    }
}
