//! Runtime configuration.
//!
//! All settings come from `PAYOUT_*` environment variables with defaults
//! suitable for local use.  Malformed values are reported at startup.

use crate::currency::{FxRate, DEFAULT_FX_RATE, MAX_FX_RATE, MIN_FX_RATE};
use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub bind_addr: String,
    /// Directory holding one `<YYYY-MM>.json` input document per month.
    pub data_dir: PathBuf,
    /// Where runs are persisted; in-memory only when `None`.
    pub runs_file: Option<PathBuf>,
    /// Fixed USD→EUR rate served by the FX source.
    pub fx_rate: Option<FxRate>,
    pub fx_fallback: Option<FxRate>,
    pub fx_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("data"),
            runs_file: None,
            fx_rate: None,
            fx_fallback: FxRate::new(DEFAULT_FX_RATE),
            fx_timeout: Duration::from_millis(2000),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("PAYOUT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("PAYOUT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.runs_file = lookup("PAYOUT_RUNS_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        if let Some(rate) = lookup("PAYOUT_FX_RATE") {
            config.fx_rate = Some(parse_rate("PAYOUT_FX_RATE", &rate)?);
        }
        if let Some(fallback) = lookup("PAYOUT_FX_FALLBACK") {
            config.fx_fallback = if fallback.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_rate("PAYOUT_FX_FALLBACK", &fallback)?)
            };
        }
        if let Some(timeout) = lookup("PAYOUT_FX_TIMEOUT_MS") {
            let millis: u64 = timeout
                .trim()
                .parse()
                .with_context(|| format!("PAYOUT_FX_TIMEOUT_MS is not an integer: '{timeout}'"))?;
            config.fx_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }
}

fn parse_rate(key: &str, value: &str) -> Result<FxRate> {
    let rate = Decimal::from_str(value.trim())
        .with_context(|| format!("{key} is not a decimal: '{value}'"))?;
    FxRate::new(rate)
        .ok_or_else(|| anyhow!("{key} must be within [{MIN_FX_RATE}, {MAX_FX_RATE}], got {rate}"))
}
