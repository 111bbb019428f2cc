//! Manager bucket allocation.
//!
//! Managers earn a percentage of the agency-wide `chatting` and `gunzo`
//! revenue buckets.  Each bucket is read either against its total net or
//! its messages+tips net, chosen by whichever percentage is non-zero; a
//! payee configuring both for one bucket is rejected, never averaged.

use crate::compensation::{check_magnitude, check_percentage, MAX_AMOUNT};
use crate::currency::show;
use crate::error::FieldIssue;
use crate::models::{
    AgencyRevenueSnapshot, BreakdownKind, Bucket, BucketPercentages, BucketShare, BucketVariant,
    PayoutScope,
};
use rust_decimal::Decimal;

impl AgencyRevenueSnapshot {
    /// Net EUR revenue for one bucket and variant.
    pub fn net_eur(&self, bucket: Bucket, variant: BucketVariant) -> Decimal {
        match (bucket, variant) {
            (Bucket::Chatting, BucketVariant::TotalNet) => self.chatting_net_eur,
            (Bucket::Chatting, BucketVariant::MessagesTipsNet) => self.chatting_msgs_tips_net_eur,
            (Bucket::Gunzo, BucketVariant::TotalNet) => self.gunzo_net_eur,
            (Bucket::Gunzo, BucketVariant::MessagesTipsNet) => self.gunzo_msgs_tips_net_eur,
        }
    }
}

impl PayoutScope {
    fn default_variant(self) -> BucketVariant {
        match self {
            Self::TotalNet => BucketVariant::TotalNet,
            Self::MessagesTipsNet => BucketVariant::MessagesTipsNet,
        }
    }
}

impl BucketPercentages {
    /// The `(total, msgs_tips)` pair for `bucket`.
    fn pair(&self, bucket: Bucket) -> (Option<Decimal>, Option<Decimal>) {
        match bucket {
            Bucket::Chatting => (self.chatting_total, self.chatting_msgs_tips),
            Bucket::Gunzo => (self.gunzo_total, self.gunzo_msgs_tips),
        }
    }

    pub fn is_empty(&self) -> bool {
        [Bucket::Chatting, Bucket::Gunzo].into_iter().all(|bucket| {
            let (total, msgs_tips) = self.pair(bucket);
            positive(total).is_none() && positive(msgs_tips).is_none()
        })
    }
}

const BUCKETS: [Bucket; 2] = [Bucket::Chatting, Bucket::Gunzo];

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

/// Returns range and mutual-exclusion violations in `pcts`.
pub fn validate_buckets(pcts: &BucketPercentages) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    for bucket in BUCKETS {
        let (total, msgs_tips) = pcts.pair(bucket);
        if let Some(value) = total {
            issues.extend(check_percentage(&format!("buckets.{bucket}_total"), value));
        }
        if let Some(value) = msgs_tips {
            issues.extend(check_percentage(&format!("buckets.{bucket}_msgs_tips"), value));
        }
        if positive(total).is_some() && positive(msgs_tips).is_some() {
            issues.push(FieldIssue::new(
                format!("buckets.{bucket}"),
                format!(
                    "{bucket}_total and {bucket}_msgs_tips are mutually exclusive; configure one"
                ),
            ));
        }
    }
    issues
}

/// Rejects snapshot figures too large to allocate from.
pub fn validate_snapshot(snapshot: &AgencyRevenueSnapshot) -> Vec<FieldIssue> {
    [
        ("agency_revenue.chatting_net_eur", snapshot.chatting_net_eur),
        ("agency_revenue.gunzo_net_eur", snapshot.gunzo_net_eur),
        (
            "agency_revenue.chatting_msgs_tips_net_eur",
            snapshot.chatting_msgs_tips_net_eur,
        ),
        (
            "agency_revenue.gunzo_msgs_tips_net_eur",
            snapshot.gunzo_msgs_tips_net_eur,
        ),
    ]
    .into_iter()
    .filter_map(|(field, value)| check_magnitude(field, value, MAX_AMOUNT))
    .collect()
}

/// A manager's payout from the revenue buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub payout_eur: Decimal,
    pub component: BreakdownKind,
    pub formula: String,
    /// No agency snapshot exists for the month; all shares are zero.
    pub snapshot_missing: bool,
}

/// Allocates bucket revenue to a manager.
///
/// Validation runs first and any violation aborts the allocation.  A bucket
/// with neither percentage set contributes zero; its share is reported
/// against the variant implied by `scope` and marked unconfigured.
pub fn allocate(
    pcts: &BucketPercentages,
    scope: PayoutScope,
    snapshot: Option<&AgencyRevenueSnapshot>,
) -> Result<Allocation, Vec<FieldIssue>> {
    let issues = validate_buckets(pcts);
    if !issues.is_empty() {
        return Err(issues);
    }

    let mut shares = Vec::with_capacity(BUCKETS.len());
    let mut terms = Vec::with_capacity(BUCKETS.len());
    let mut payout = Decimal::ZERO;

    for bucket in BUCKETS {
        let (total, msgs_tips) = pcts.pair(bucket);
        let chosen = match (positive(total), positive(msgs_tips)) {
            (Some(pct), _) => Some((BucketVariant::TotalNet, pct)),
            (None, Some(pct)) => Some((BucketVariant::MessagesTipsNet, pct)),
            (None, None) => None,
        };

        let share = match chosen {
            Some((variant, pct)) => {
                let revenue = snapshot.map_or(Decimal::ZERO, |s| s.net_eur(bucket, variant));
                let factor = pct / Decimal::ONE_HUNDRED;
                let amount = revenue * factor;
                terms.push(format!(
                    "{bucket}.{}({}) * {}",
                    variant_label(variant),
                    show(revenue),
                    show(factor)
                ));
                BucketShare {
                    bucket,
                    variant,
                    configured: true,
                    pct,
                    revenue_eur: revenue,
                    amount_eur: amount,
                }
            }
            None => {
                let variant = scope.default_variant();
                terms.push(format!("{bucket}(unconfigured)"));
                BucketShare {
                    bucket,
                    variant,
                    configured: false,
                    pct: Decimal::ZERO,
                    revenue_eur: snapshot.map_or(Decimal::ZERO, |s| s.net_eur(bucket, variant)),
                    amount_eur: Decimal::ZERO,
                }
            }
        };
        payout += share.amount_eur;
        shares.push(share);
    }

    Ok(Allocation {
        payout_eur: payout,
        component: BreakdownKind::Bucketed {
            scope,
            shares,
            payout_eur: payout,
        },
        formula: format!("{} = {}", terms.join(" + "), show(payout)),
        snapshot_missing: snapshot.is_none(),
    })
}

fn variant_label(variant: BucketVariant) -> &'static str {
    match variant {
        BucketVariant::TotalNet => "total_net",
        BucketVariant::MessagesTipsNet => "msgs_tips_net",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn snapshot() -> AgencyRevenueSnapshot {
        AgencyRevenueSnapshot {
            chatting_net_eur: d("20000"),
            chatting_msgs_tips_net_eur: d("8000"),
            gunzo_net_eur: d("10000"),
            gunzo_msgs_tips_net_eur: d("4000"),
            ..AgencyRevenueSnapshot::default()
        }
    }

    #[test]
    fn test_both_variants_of_one_bucket_rejected() {
        let pcts = BucketPercentages {
            chatting_total: Some(d("5")),
            chatting_msgs_tips: Some(d("3")),
            gunzo_total: Some(d("2")),
            ..BucketPercentages::default()
        };
        let issues = allocate(&pcts, PayoutScope::TotalNet, Some(&snapshot())).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "buckets.chatting");
    }

    #[test]
    fn test_zero_in_other_variant_is_not_a_conflict() {
        let pcts = BucketPercentages {
            gunzo_total: Some(Decimal::ZERO),
            gunzo_msgs_tips: Some(d("10")),
            ..BucketPercentages::default()
        };
        let allocation = allocate(&pcts, PayoutScope::TotalNet, Some(&snapshot())).unwrap();
        assert_eq!(allocation.payout_eur, d("400"));
    }

    #[test]
    fn test_each_bucket_selects_its_own_variant() {
        let pcts = BucketPercentages {
            chatting_total: Some(d("5")),
            gunzo_msgs_tips: Some(d("10")),
            ..BucketPercentages::default()
        };
        let allocation = allocate(&pcts, PayoutScope::TotalNet, Some(&snapshot())).unwrap();
        // 20000 * 0.05 + 4000 * 0.1
        assert_eq!(allocation.payout_eur, d("1400"));
        assert_eq!(
            allocation.formula,
            "chatting.total_net(20000) * 0.05 + gunzo.msgs_tips_net(4000) * 0.1 = 1400"
        );
    }

    #[test]
    fn test_unconfigured_bucket_contributes_zero() {
        let pcts = BucketPercentages {
            chatting_msgs_tips: Some(d("2.5")),
            ..BucketPercentages::default()
        };
        let allocation =
            allocate(&pcts, PayoutScope::MessagesTipsNet, Some(&snapshot())).unwrap();
        assert_eq!(allocation.payout_eur, d("200"));
        let BreakdownKind::Bucketed { shares, .. } = allocation.component else {
            panic!("expected bucketed component");
        };
        let gunzo = &shares[1];
        assert!(!gunzo.configured);
        assert_eq!(gunzo.variant, BucketVariant::MessagesTipsNet);
        assert_eq!(gunzo.amount_eur, Decimal::ZERO);
    }

    #[test]
    fn test_missing_snapshot_allocates_nothing() {
        let pcts = BucketPercentages {
            chatting_total: Some(d("5")),
            ..BucketPercentages::default()
        };
        let allocation = allocate(&pcts, PayoutScope::TotalNet, None).unwrap();
        assert_eq!(allocation.payout_eur, Decimal::ZERO);
        assert!(allocation.snapshot_missing);
    }

    #[test]
    fn test_out_of_range_percentage() {
        let pcts = BucketPercentages {
            gunzo_total: Some(d("120")),
            ..BucketPercentages::default()
        };
        let issues = validate_buckets(&pcts);
        assert_eq!(issues[0].field, "buckets.gunzo_total");
    }

    #[test]
    fn test_oversized_snapshot_figures() {
        let snapshot = AgencyRevenueSnapshot {
            gunzo_msgs_tips_net_eur: d("5000000000000"),
            chatting_net_usd: d("9000000000000"),
            ..AgencyRevenueSnapshot::default()
        };
        let issues = validate_snapshot(&snapshot);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "agency_revenue.gunzo_msgs_tips_net_eur");
        assert!(validate_snapshot(&AgencyRevenueSnapshot::default()).is_empty());
    }

    #[test]
    fn test_empty_percentages() {
        assert!(BucketPercentages::default().is_empty());
        let pcts = BucketPercentages {
            chatting_total: Some(Decimal::ZERO),
            ..BucketPercentages::default()
        };
        assert!(pcts.is_empty());
    }
}
