//! Basis aggregation and input record sources.
//!
//! The aggregator folds a month's raw [`BasisEntry`] records into per-payee
//! totals and indexes the revenue records the formulas read.  Entries of
//! the same kind for the same payee are additive.  Input records are owned
//! by external collaborators and reach the engine through a
//! [`RecordSource`].

use crate::error::SourceError;
use crate::models::{
    AffiliateAssignment, AgencyRevenueSnapshot, BasisEntry, ModelRevenue, MonthId, MonthInputs,
    SalesSource,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Summed inputs for one payee in one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayeeBasis {
    /// Σ gross × payout% over web-app sales, USD.
    pub webapp_usd: Decimal,
    /// Σ gross × payout% over manually entered sales, USD.
    pub manual_usd: Decimal,
    pub bonus_eur: Decimal,
    /// Σ |fine|, EUR.
    pub fine_eur: Decimal,
    pub hours: Decimal,
    /// Σ hours × rate, EUR.
    pub hourly_eur: Decimal,
}

impl PayeeBasis {
    pub fn sales_total_usd(&self) -> Decimal {
        self.webapp_usd + self.manual_usd
    }
}

/// Revenue attributed to an affiliate through its assigned models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliateRevenue {
    pub affiliator_percentage: Decimal,
    /// `None` when no assigned model has a net figure.
    pub net_revenue_usd: Option<Decimal>,
    /// Assigned models whose net revenue is missing.
    pub missing_models: Vec<String>,
}

/// All aggregated inputs for a month.
#[derive(Debug, Clone, Default)]
pub struct MonthBasis {
    payees: HashMap<String, PayeeBasis>,
    agency_revenue: Option<AgencyRevenueSnapshot>,
    model_revenue: HashMap<String, ModelRevenue>,
    assignments: HashMap<String, AffiliateAssignment>,
}

impl MonthBasis {
    pub fn payee(&self, payee_id: &str) -> PayeeBasis {
        self.payees.get(payee_id).copied().unwrap_or_default()
    }

    pub fn agency_revenue(&self) -> Option<&AgencyRevenueSnapshot> {
        self.agency_revenue.as_ref()
    }

    /// Net revenue for a model; `None` when unreported.
    pub fn model_net_revenue(&self, model_id: &str) -> Option<Decimal> {
        self.model_revenue
            .get(model_id)
            .and_then(|revenue| revenue.net_revenue_usd)
    }

    /// Sums the net revenue of the affiliate's assigned models.  Returns
    /// `None` when the payee has no assignment.
    pub fn affiliate_revenue(&self, affiliate_id: &str) -> Option<AffiliateRevenue> {
        let assignment = self.assignments.get(affiliate_id)?;
        let mut total: Option<Decimal> = None;
        let mut missing_models = Vec::new();
        for model_id in &assignment.model_ids {
            match self.model_net_revenue(model_id) {
                Some(net) => *total.get_or_insert(Decimal::ZERO) += net,
                None => missing_models.push(model_id.clone()),
            }
        }
        Some(AffiliateRevenue {
            affiliator_percentage: assignment.affiliator_percentage,
            net_revenue_usd: total,
            missing_models,
        })
    }
}

/// Folds a month's inputs into per-payee totals.
pub fn aggregate(inputs: &MonthInputs) -> MonthBasis {
    let mut payees: HashMap<String, PayeeBasis> = HashMap::new();
    for entry in &inputs.entries {
        let basis = payees.entry(entry.payee_id().to_string()).or_default();
        match entry {
            BasisEntry::Sales {
                gross_usd,
                payout_pct,
                source,
                ..
            } => {
                let earned = *gross_usd * *payout_pct / Decimal::ONE_HUNDRED;
                match source {
                    SalesSource::Webapp => basis.webapp_usd += earned,
                    SalesSource::Manual => basis.manual_usd += earned,
                }
            }
            BasisEntry::Bonus { amount_eur, .. } => basis.bonus_eur += *amount_eur,
            BasisEntry::Fine { amount_eur, .. } => basis.fine_eur += amount_eur.abs(),
            BasisEntry::Hourly {
                hours, rate_eur, ..
            } => {
                basis.hours += *hours;
                basis.hourly_eur += *hours * *rate_eur;
            }
        }
    }

    let mut model_revenue: HashMap<String, ModelRevenue> = HashMap::new();
    for record in &inputs.model_revenue {
        model_revenue
            .entry(record.model_id.clone())
            .and_modify(|existing| {
                existing.gross_revenue_usd += record.gross_revenue_usd;
                existing.net_revenue_usd = match (existing.net_revenue_usd, record.net_revenue_usd)
                {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            })
            .or_insert_with(|| record.clone());
    }

    let mut assignments: HashMap<String, AffiliateAssignment> = HashMap::new();
    for assignment in &inputs.affiliate_assignments {
        assignments
            .entry(assignment.affiliate_id.clone())
            .and_modify(|existing| {
                existing
                    .model_ids
                    .extend(assignment.model_ids.iter().cloned());
                existing.affiliator_percentage = assignment.affiliator_percentage;
            })
            .or_insert_with(|| assignment.clone());
    }

    debug!(
        payees = payees.len(),
        models = model_revenue.len(),
        affiliates = assignments.len(),
        "aggregated month basis"
    );

    MonthBasis {
        payees,
        agency_revenue: inputs.agency_revenue.clone(),
        model_revenue,
        assignments,
    }
}

/// Read access to the records an engine pass consumes.
///
/// Implementations must be thread-safe because previews may run
/// concurrently.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn month_inputs(&self, month: &MonthId) -> Result<MonthInputs, SourceError>;
}

/// Keeps month inputs in memory.  Useful for tests and embedding.
#[derive(Default)]
pub struct InMemorySource {
    months: RwLock<HashMap<MonthId, MonthInputs>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_month(&self, month: MonthId, inputs: MonthInputs) {
        self.write().insert(month, inputs);
    }

    pub fn push_entry(&self, month: &MonthId, entry: BasisEntry) {
        self.write()
            .entry(month.clone())
            .or_default()
            .entries
            .push(entry);
    }

    /// Creates or replaces the month's agency revenue snapshot.
    pub fn upsert_agency_snapshot(&self, month: &MonthId, snapshot: AgencyRevenueSnapshot) {
        self.write().entry(month.clone()).or_default().agency_revenue = Some(snapshot);
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<MonthId, MonthInputs>> {
        self.months.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn month_inputs(&self, month: &MonthId) -> Result<MonthInputs, SourceError> {
        let months = self
            .months
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(months.get(month).cloned().unwrap_or_default())
    }
}

/// Reads `<dir>/<YYYY-MM>.json` documents.  A month without a file is an
/// empty month.
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl RecordSource for JsonDirSource {
    async fn month_inputs(&self, month: &MonthId) -> Result<MonthInputs, SourceError> {
        let path = self.dir.join(format!("{month}.json"));
        let io_error = |source| SourceError::Io {
            path: path.clone(),
            source,
        };
        if !tokio::fs::try_exists(&path).await.map_err(io_error)? {
            debug!(?path, "no input file for month");
            return Ok(MonthInputs::default());
        }
        let data = tokio::fs::read_to_string(&path).await.map_err(io_error)?;
        serde_json::from_str(&data).map_err(|source| SourceError::Parse { path, source })
    }
}
