//! USD/EUR normalisation.
//!
//! Every payout is computed in one native currency and reported in both.
//! Conversion uses a single USD→EUR multiplier for the whole computation
//! pass.  Rates come from an [`FxRateSource`], bounded by a timeout and
//! backed by a constant fallback, so a slow or failing rate provider never
//! blocks a preview.

use crate::models::Currency;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Rate substituted when no live rate can be obtained.
pub const DEFAULT_FX_RATE: Decimal = Decimal::from_parts(92, 0, 0, false, 2);

pub const MIN_FX_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);
pub const MAX_FX_RATE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// A USD→EUR multiplier within `[MIN_FX_RATE, MAX_FX_RATE]`.
///
/// Together with the input limits checked before a computation, the bounds
/// keep every conversion inside `Decimal`'s range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FxRate(Decimal);

impl TryFrom<Decimal> for FxRate {
    type Error = String;

    fn try_from(rate: Decimal) -> Result<Self, Self::Error> {
        Self::new(rate)
            .ok_or_else(|| format!("FX rate {rate} is outside [{MIN_FX_RATE}, {MAX_FX_RATE}]"))
    }
}

impl From<FxRate> for Decimal {
    fn from(rate: FxRate) -> Self {
        rate.0
    }
}

impl FxRate {
    pub fn new(rate: Decimal) -> Option<Self> {
        (MIN_FX_RATE..=MAX_FX_RATE)
            .contains(&rate)
            .then_some(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Default for FxRate {
    fn default() -> Self {
        Self(DEFAULT_FX_RATE)
    }
}

/// Rounds to cents, halves away from zero.  The result always carries
/// exactly two decimal places.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Compact rendering for formula strings (`4200`, not `4200.00`).
pub(crate) fn show(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Converts `amount` between currencies without rounding.  Returns `None`
/// when a cross-currency conversion is needed and no rate is known.
pub fn convert(amount: Decimal, from: Currency, to: Currency, fx: Option<FxRate>) -> Option<Decimal> {
    match (from, to) {
        (Currency::Usd, Currency::Usd) | (Currency::Eur, Currency::Eur) => Some(amount),
        (Currency::Usd, Currency::Eur) => fx.map(|rate| amount * rate.value()),
        (Currency::Eur, Currency::Usd) => fx.map(|rate| amount / rate.value()),
    }
}

/// An amount reported in both currencies; `None` marks a currency that
/// could not be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DualAmount {
    pub usd: Option<Decimal>,
    pub eur: Option<Decimal>,
}

/// Produces both currency amounts, rounded to cents.
///
/// A currency that is already populated is only rounded, never re-derived
/// from the other one.
pub fn normalize(usd: Option<Decimal>, eur: Option<Decimal>, fx: Option<FxRate>) -> DualAmount {
    let usd_value = usd.or_else(|| eur.and_then(|e| convert(e, Currency::Eur, Currency::Usd, fx)));
    let eur_value = eur.or_else(|| usd.and_then(|u| convert(u, Currency::Usd, Currency::Eur, fx)));
    DualAmount {
        usd: usd_value.map(round_money),
        eur: eur_value.map(round_money),
    }
}

/// Provider of the current USD→EUR rate.
#[async_trait]
pub trait FxRateSource: Send + Sync {
    async fn usd_to_eur(&self) -> Result<Decimal>;
}

/// Always answers with the same rate.
pub struct FixedRate(pub Decimal);

#[async_trait]
impl FxRateSource for FixedRate {
    async fn usd_to_eur(&self) -> Result<Decimal> {
        Ok(self.0)
    }
}

/// A source that never has a rate; every lookup falls through to the
/// fallback.
pub struct NoRate;

#[async_trait]
impl FxRateSource for NoRate {
    async fn usd_to_eur(&self) -> Result<Decimal> {
        Err(anyhow!("no FX rate source configured"))
    }
}

/// Where the rate used for a computation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOrigin {
    Request,
    Source,
    Fallback,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: Option<FxRate>,
    pub origin: RateOrigin,
}

impl ResolvedRate {
    pub fn requested(rate: FxRate) -> Self {
        Self {
            rate: Some(rate),
            origin: RateOrigin::Request,
        }
    }
}

/// Picks the rate for one computation pass: an explicit request rate wins,
/// then the source (bounded by `timeout`), then `fallback`.
pub async fn resolve_fx_rate(
    requested: Option<FxRate>,
    source: &dyn FxRateSource,
    timeout: Duration,
    fallback: Option<FxRate>,
) -> ResolvedRate {
    if let Some(rate) = requested {
        return ResolvedRate::requested(rate);
    }

    let fetched = match tokio::time::timeout(timeout, source.usd_to_eur()).await {
        Ok(Ok(value)) => FxRate::new(value).or_else(|| {
            warn!(%value, "FX source returned an out-of-range rate");
            None
        }),
        Ok(Err(err)) => {
            warn!(error = %err, "FX source failed");
            None
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "FX source timed out");
            None
        }
    };

    match (fetched, fallback) {
        (Some(rate), _) => {
            debug!(rate = %rate.value(), "using FX rate from source");
            ResolvedRate {
                rate: Some(rate),
                origin: RateOrigin::Source,
            }
        }
        (None, Some(rate)) => {
            warn!(rate = %rate.value(), "falling back to default FX rate");
            ResolvedRate {
                rate: Some(rate),
                origin: RateOrigin::Fallback,
            }
        }
        (None, None) => ResolvedRate {
            rate: None,
            origin: RateOrigin::Unavailable,
        },
    }
}
