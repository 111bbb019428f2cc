//! Payout runs and their lifecycle.
//!
//! A run freezes a month's preview lines at save time.  Its status only
//! moves forward, `draft → locked → paid`, and only drafts may be deleted.
//! Per-line paid flags are independent of the run status.
//!
//! The [`PayoutRunManager`] keeps runs in memory and, when given a path,
//! rewrites a JSON file after every change.  Writes are last-writer-wins.

use crate::engine::PayoutTotals;
use crate::error::{PayoutError, StorageError};
use crate::models::{MonthId, PaidStatus, PayoutLine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Draft,
    Locked,
    Paid,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Locked => "locked",
            Self::Paid => "paid",
        }
    }

    /// Valid transitions are `draft → locked` and `locked → paid`.
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Draft, Self::Locked) | (Self::Locked, Self::Paid)
        )
    }

    pub fn is_deletable(&self) -> bool {
        *self == Self::Draft
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "locked" => Ok(Self::Locked),
            "paid" => Ok(Self::Paid),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// A saved set of payout lines for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRun {
    pub id: Uuid,
    pub month_id: MonthId,
    pub status: RunStatus,
    pub lines: Vec<PayoutLine>,
    #[serde(default)]
    pub notes: Option<String>,
    pub totals: PayoutTotals,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

/// Result of toggling a line's paid flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePaidUpdate {
    pub line_id: Uuid,
    pub paid_status: PaidStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Owns every saved run.
pub struct PayoutRunManager {
    runs: RwLock<Vec<PayoutRun>>,
    path: Option<PathBuf>,
}

impl PayoutRunManager {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            runs: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Loads runs from `path` if it exists; later changes are written back.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let io_error = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        let runs = if tokio::fs::try_exists(&path).await.map_err(io_error)? {
            let data = tokio::fs::read(&path).await.map_err(io_error)?;
            serde_json::from_slice(&data).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            Vec::new()
        };
        info!(?path, runs = runs.len(), "opened payout run store");
        Ok(Self {
            runs: RwLock::new(runs),
            path: Some(path),
        })
    }

    /// Saves `lines` as a new draft run.  Never reuses an existing run for
    /// the month, so repeated saves produce distinct runs.  Every saved line
    /// starts out pending.
    pub async fn save_computed(
        &self,
        month: &MonthId,
        lines: Vec<PayoutLine>,
        notes: Option<String>,
    ) -> Result<Uuid, PayoutError> {
        let lines: Vec<PayoutLine> = lines
            .into_iter()
            .map(|line| PayoutLine {
                line_id: Some(Uuid::new_v4()),
                paid_status: PaidStatus::Pending,
                paid_at: None,
                ..line
            })
            .collect();
        let run = PayoutRun {
            id: Uuid::new_v4(),
            month_id: month.clone(),
            status: RunStatus::Draft,
            totals: PayoutTotals::from_lines(&lines),
            lines,
            notes,
            created_at: Utc::now(),
            locked_at: None,
            paid_at: None,
        };
        let run_id = run.id;
        let line_count = run.lines.len();

        let mut runs = self.runs.write().await;
        let mut next = runs.clone();
        next.push(run);
        self.persist(&next).await?;
        *runs = next;

        info!(%run_id, month = %month, lines = line_count, "saved payout run");
        Ok(run_id)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<PayoutRun, PayoutError> {
        self.runs
            .read()
            .await
            .iter()
            .find(|run| run.id == run_id)
            .cloned()
            .ok_or_else(|| not_found("run", run_id))
    }

    /// Runs in creation order, optionally restricted to one month.
    pub async fn list(&self, month: Option<&MonthId>) -> Vec<PayoutRun> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|run| month.map_or(true, |m| &run.month_id == m))
            .cloned()
            .collect()
    }

    /// Moves a run forward one step.  Same-state and backward moves are
    /// conflicts.
    pub async fn transition(
        &self,
        run_id: Uuid,
        new_status: RunStatus,
    ) -> Result<RunStatus, PayoutError> {
        let mut runs = self.runs.write().await;
        let mut next = runs.clone();
        let run = next
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or_else(|| not_found("run", run_id))?;

        let current = run.status;
        if !current.can_transition_to(new_status) {
            warn!(%run_id, from = %current, to = %new_status, "rejected run transition");
            return Err(PayoutError::Conflict {
                run_id,
                message: format!("cannot move run from {current} to {new_status}"),
            });
        }

        let now = Utc::now();
        run.status = new_status;
        match new_status {
            RunStatus::Locked => run.locked_at = Some(now),
            RunStatus::Paid => run.paid_at = Some(now),
            RunStatus::Draft => {}
        }
        self.persist(&next).await?;
        *runs = next;

        info!(%run_id, from = %current, to = %new_status, "run status changed");
        Ok(new_status)
    }

    /// Deletes a draft run.  Locked and paid runs are left untouched.
    pub async fn delete(&self, run_id: Uuid) -> Result<(), PayoutError> {
        let mut runs = self.runs.write().await;
        let index = runs
            .iter()
            .position(|run| run.id == run_id)
            .ok_or_else(|| not_found("run", run_id))?;

        let status = runs[index].status;
        if !status.is_deletable() {
            warn!(%run_id, %status, "rejected run deletion");
            return Err(PayoutError::Conflict {
                run_id,
                message: format!("run is {status}"),
            });
        }

        let mut next = runs.clone();
        next.remove(index);
        self.persist(&next).await?;
        *runs = next;

        info!(%run_id, "deleted payout run");
        Ok(())
    }

    /// Marks one line paid or pending, whatever the run's status.
    pub async fn set_paid(&self, line_id: Uuid, paid: bool) -> Result<LinePaidUpdate, PayoutError> {
        let mut runs = self.runs.write().await;
        let mut next = runs.clone();
        let line = next
            .iter_mut()
            .flat_map(|run| run.lines.iter_mut())
            .find(|line| line.line_id == Some(line_id))
            .ok_or_else(|| not_found("line", line_id))?;

        if paid {
            line.paid_status = PaidStatus::Paid;
            line.paid_at = Some(line.paid_at.unwrap_or_else(Utc::now));
        } else {
            line.paid_status = PaidStatus::Pending;
            line.paid_at = None;
        }
        let update = LinePaidUpdate {
            line_id,
            paid_status: line.paid_status,
            paid_at: line.paid_at,
        };
        self.persist(&next).await?;
        *runs = next;

        info!(%line_id, paid, "line paid status changed");
        Ok(update)
    }

    /// Rewrites the store file.  Callers hold the write guard so writes land
    /// in the order their changes were applied.
    async fn persist(&self, runs: &[PayoutRun]) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_vec_pretty(runs).map_err(|source| StorageError::Corrupt {
            path: path.clone(),
            source,
        })?;
        let io_error = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, data).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_error)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn not_found(resource: &'static str, id: Uuid) -> PayoutError {
    PayoutError::NotFound {
        resource,
        id: id.to_string(),
    }
}
