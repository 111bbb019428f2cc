//! Payout Engine library crate.
//!
//! This crate turns a month's basis records (sales, bonuses, fines,
//! hourly logs, agency and model revenue, affiliate assignments) into
//! auditable per-payee payout lines in USD and EUR, and groups them into
//! runs with a `draft → locked → paid` lifecycle.  External applications
//! may call [`engine::compute_preview`] and [`runs::PayoutRunManager`]
//! directly or embed the HTTP API via `api::build_router`.

pub mod api;
pub mod basis;
pub mod buckets;
pub mod category;
pub mod compensation;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod models;
pub mod runs;

pub use engine::{compute_preview, Preview};
pub use error::{PayoutError, ValidationError};
pub use runs::{PayoutRunManager, RunStatus};
