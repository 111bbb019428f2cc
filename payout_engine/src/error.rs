//! Error taxonomy for the payout engine.
//!
//! Configuration problems are collected as [`ValidationError`]s naming the
//! payee and field at fault, lifecycle violations surface as
//! [`PayoutError::Conflict`], and I/O at the edges (record sources and the
//! run store) is wrapped in [`SourceError`] / [`StorageError`].  Missing
//! revenue and unavailable currencies are *not* errors; they are flagged in
//! the computed lines instead.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// A single invalid field in a compensation or bucket configuration,
/// before it has been attributed to a payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field, e.g. `compensation.pct`.
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Attributes this issue to a payee.
    pub fn for_payee(self, payee_id: &str) -> ValidationError {
        ValidationError {
            payee_id: payee_id.to_string(),
            field: self.field,
            message: self.message,
        }
    }
}

/// A configuration invariant violation for one payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("payee '{payee_id}': invalid {field}: {message}")]
pub struct ValidationError {
    pub payee_id: String,
    pub field: String,
    pub message: String,
}

/// Failure reading the month's input records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure persisting or loading payout runs.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("run store I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("run store {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by the engine's public operations.
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error("invalid payout configuration ({} issue(s))", .0.len())]
    Validation(Vec<ValidationError>),
    #[error("run {run_id}: {message}")]
    Conflict { run_id: Uuid, message: String },
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },
    #[error("invalid month id '{0}', expected YYYY-MM")]
    InvalidMonth(String),
    #[error("FX rate {0} is outside the accepted range")]
    InvalidFxRate(Decimal),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PayoutError {
    /// Short machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::InvalidMonth(_) => "invalid_month",
            Self::InvalidFxRate(_) => "invalid_fx_rate",
            Self::Source(_) => "source",
            Self::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_issue_names_payee_and_field() {
        let err = FieldIssue::new("buckets.chatting", "both variants set").for_payee("m-7");
        assert_eq!(err.payee_id, "m-7");
        assert_eq!(
            err.to_string(),
            "payee 'm-7': invalid buckets.chatting: both variants set"
        );
    }

    #[test]
    fn test_validation_error_counts_issues() {
        let err = PayoutError::Validation(vec![
            FieldIssue::new("a", "x").for_payee("p1"),
            FieldIssue::new("b", "y").for_payee("p2"),
        ]);
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("2 issue(s)"));
    }
}
