//! Entry point for the Payout Engine binary.
//!
//! Running this binary starts an HTTP server exposing payout previews and
//! run management.  Configuration is read from `PAYOUT_*` environment
//! variables (see [`payout_engine::config::EngineConfig`]); log verbosity
//! follows `RUST_LOG` and defaults to `info`.

use payout_engine::api;
use payout_engine::config::EngineConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err:#}");
            std::process::exit(2);
        }
    };
    info!(?config, "starting payout engine");

    if let Err(err) = api::serve(config).await {
        error!("error running server: {err:#}");
        std::process::exit(1);
    }
}
