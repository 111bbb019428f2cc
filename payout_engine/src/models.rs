//! Data models for the Payout Engine.
//!
//! The `models` module defines the serialisable records the engine reads
//! (payees, basis entries, revenue figures, affiliate assignments) and the
//! records it produces (payout lines and runs).  Monetary values are
//! [`Decimal`]s throughout; they serialise as JSON strings so no precision
//! is lost in transit.

use crate::category::Category;
use crate::error::PayoutError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A calendar month in `YYYY-MM` form, the unit every computation runs over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthId(String);

impl MonthId {
    pub fn parse(value: &str) -> Result<Self, PayoutError> {
        let well_formed = value.len() == 7
            && NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok();
        if well_formed {
            Ok(Self(value.to_string()))
        } else {
            Err(PayoutError::InvalidMonth(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MonthId {
    type Error = PayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthId> for String {
    fn from(month: MonthId) -> Self {
        month.0
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usd => f.write_str("USD"),
            Self::Eur => f.write_str("EUR"),
        }
    }
}

/// An amount tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayeeStatus {
    #[default]
    Active,
    Inactive,
}

/// Which agency net figure a manager's bucket percentages are read against
/// when no variant has been chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutScope {
    #[default]
    TotalNet,
    MessagesTipsNet,
}

/// How a payee is compensated.  Percentages are in `[0, 100]`.
///
/// Tiered-deal fields are optional on the wire so that an incomplete deal
/// can be reported field by field instead of failing deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompensationConfig {
    #[default]
    None,
    Percentage {
        pct: Decimal,
    },
    FlatFee {
        amount: Decimal,
        currency: Currency,
    },
    Hybrid {
        pct: Decimal,
        flat_fee: Money,
    },
    TieredDeal {
        monthly_threshold_usd: Option<Decimal>,
        flat_under_threshold: Option<Money>,
        percent_above_threshold: Option<Decimal>,
    },
}

/// Manager percentages of the agency-wide revenue buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketPercentages {
    #[serde(default)]
    pub chatting_total: Option<Decimal>,
    #[serde(default)]
    pub chatting_msgs_tips: Option<Decimal>,
    #[serde(default)]
    pub gunzo_total: Option<Decimal>,
    #[serde(default)]
    pub gunzo_msgs_tips: Option<Decimal>,
}

/// A team member or model as held by the external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub status: PayeeStatus,
    #[serde(default)]
    pub compensation: CompensationConfig,
    #[serde(default)]
    pub buckets: BucketPercentages,
    #[serde(default)]
    pub payout_scope: PayoutScope,
}

impl Payee {
    pub fn is_active(&self) -> bool {
        self.status == PayeeStatus::Active
    }
}

/// Whether a sale was recorded by the web app or entered by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesSource {
    #[default]
    Webapp,
    Manual,
}

/// One raw input record for a payee in the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BasisEntry {
    Sales {
        payee_id: String,
        gross_usd: Decimal,
        payout_pct: Decimal,
        #[serde(default)]
        source: SalesSource,
    },
    Bonus {
        payee_id: String,
        amount_eur: Decimal,
    },
    /// Fines are magnitudes; the sign is ignored and they are always
    /// subtracted.
    Fine {
        payee_id: String,
        amount_eur: Decimal,
    },
    Hourly {
        payee_id: String,
        hours: Decimal,
        rate_eur: Decimal,
    },
}

impl BasisEntry {
    pub fn payee_id(&self) -> &str {
        match self {
            Self::Sales { payee_id, .. }
            | Self::Bonus { payee_id, .. }
            | Self::Fine { payee_id, .. }
            | Self::Hourly { payee_id, .. } => payee_id,
        }
    }
}

/// Agency-wide net revenue per bucket for one month.  At most one exists
/// per month; writes replace the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyRevenueSnapshot {
    pub chatting_net_usd: Decimal,
    pub chatting_net_eur: Decimal,
    pub gunzo_net_usd: Decimal,
    pub gunzo_net_eur: Decimal,
    pub chatting_msgs_tips_net_usd: Decimal,
    pub chatting_msgs_tips_net_eur: Decimal,
    pub gunzo_msgs_tips_net_usd: Decimal,
    pub gunzo_msgs_tips_net_eur: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRevenue {
    pub model_id: String,
    #[serde(default)]
    pub gross_revenue_usd: Decimal,
    /// `None` means the net figure has not been reported yet.
    #[serde(default)]
    pub net_revenue_usd: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateAssignment {
    pub affiliate_id: String,
    pub model_ids: BTreeSet<String>,
    pub affiliator_percentage: Decimal,
}

/// Everything the engine reads for one month.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthInputs {
    pub payees: Vec<Payee>,
    pub entries: Vec<BasisEntry>,
    pub agency_revenue: Option<AgencyRevenueSnapshot>,
    pub model_revenue: Vec<ModelRevenue>,
    pub affiliate_assignments: Vec<AffiliateAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Chatting,
    Gunzo,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chatting => f.write_str("chatting"),
            Self::Gunzo => f.write_str("gunzo"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketVariant {
    TotalNet,
    MessagesTipsNet,
}

/// One bucket's contribution to a manager's payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketShare {
    pub bucket: Bucket,
    pub variant: BucketVariant,
    /// `false` when neither variant had a non-zero percentage; the variant
    /// then comes from the payee's payout scope and the share is zero.
    pub configured: bool,
    pub pct: Decimal,
    pub revenue_eur: Decimal,
    pub amount_eur: Decimal,
}

/// One forward-computed contribution to a payee's gross payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakdownKind {
    Sales {
        webapp_usd: Decimal,
        manual_usd: Decimal,
        payout_usd: Decimal,
    },
    Hourly {
        hours: Decimal,
        payout_eur: Decimal,
    },
    Percentage {
        basis_usd: Option<Decimal>,
        pct: Decimal,
        payout_usd: Decimal,
    },
    FlatFee {
        fee: Money,
    },
    Hybrid {
        basis_usd: Option<Decimal>,
        pct: Decimal,
        percent_part_usd: Decimal,
        flat_fee: Money,
    },
    TieredDeal {
        revenue_usd: Option<Decimal>,
        threshold_usd: Decimal,
        above_threshold: bool,
        payout: Money,
    },
    Bucketed {
        scope: PayoutScope,
        shares: Vec<BucketShare>,
        payout_eur: Decimal,
    },
    /// No compensation applies to the payee.
    Unconfigured,
}

/// States a consumer must be able to tell apart from a computed zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakdownFlags {
    pub net_revenue_missing: bool,
    pub currency_unavailable: bool,
    pub snapshot_missing: bool,
}

/// Audit trail for a payout line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub components: Vec<BreakdownKind>,
    /// Gross payout in the line's native currency, before bonus and fines.
    pub gross_payout: Decimal,
    /// Bonus and fines converted into the native currency.
    pub bonus_native: Decimal,
    pub fines_native: Decimal,
    pub fx_rate: Option<Decimal>,
    pub formula: String,
    pub flags: BreakdownFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaidStatus {
    #[default]
    Pending,
    Paid,
}

/// The computed payout for one payee in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLine {
    /// Assigned when the line is saved into a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<Uuid>,
    pub payee_id: String,
    pub payee_name: String,
    pub role: String,
    pub department: String,
    pub category: Category,
    /// Currency of `payout_amount`.
    pub currency: Currency,
    pub basis_webapp_amount: Decimal,
    pub basis_manual_amount: Decimal,
    /// Bonuses in EUR.
    pub bonus_amount: Decimal,
    /// Fines in EUR, stored as a negative number.
    pub adjustments_amount: Decimal,
    pub basis_total: Decimal,
    pub payout_amount: Decimal,
    pub amount_usd: Option<Decimal>,
    pub amount_eur: Option<Decimal>,
    pub breakdown: Breakdown,
    #[serde(default)]
    pub paid_status: PaidStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl PayoutLine {
    /// Fines as the positive figure shown to users.
    pub fn fines_display(&self) -> Decimal {
        Decimal::ZERO - self.adjustments_amount
    }
}
