//! Durable status ledger.
//!
//! One row per tenant recording the last known deployment status, the last
//! action and when it happened. The file is loaded and saved wholesale; every
//! write goes to a temporary file in the same directory which is then renamed
//! over the original, so a reader sees either the old or the new ledger and
//! never a partial one.
//!
//! Writers are not coordinated beyond that rename. Two operator processes
//! upserting at the same moment can lose one of the updates.

use crate::error::{FleetError, Result};
use crate::observability::metrics;
use crate::types::TenantId;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Last recorded deployment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerStatus {
    Running,
    Stopped,
    Error,
    #[default]
    Unknown,
}

impl LedgerStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tenant: TenantId,
    pub label: String,
    pub status: LedgerStatus,
    pub last_action: String,
    /// Second precision, UTC.
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Row stamped with the current time.
    pub fn now(tenant: TenantId, label: &str, status: LedgerStatus, action: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant,
            label: label.to_string(),
            status,
            last_action: action.to_string(),
            timestamp: now.with_nanosecond(0).unwrap_or(now),
        }
    }
}

/// Key-value store with full scan, keyed by tenant.
///
/// Absence of a row means [`LedgerStatus::Unknown`].
pub trait LedgerStore: Send + Sync {
    /// Read every row.
    fn read(&self) -> Result<BTreeMap<TenantId, LedgerEntry>>;

    /// Replace the row for `tenant`, or append one, and persist atomically.
    fn upsert(
        &self,
        tenant: &TenantId,
        label: &str,
        status: LedgerStatus,
        action: &str,
    ) -> Result<LedgerEntry>;

    /// Status of one tenant.
    fn status_of(&self, tenant: &TenantId) -> Result<LedgerStatus> {
        Ok(self.read()?.get(tenant).map(|e| e.status).unwrap_or_default())
    }
}

/// Ledger backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_rows(&self) -> Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            FleetError::LedgerReadError { path: self.path.clone(), reason: e.to_string() }
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| FleetError::LedgerReadError {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_rows(&self, rows: &[LedgerEntry]) -> Result<()> {
        let write_error =
            |reason: String| FleetError::LedgerWriteError { path: self.path.clone(), reason };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| write_error(e.to_string()))?;

        let json = serde_json::to_vec_pretty(rows).map_err(|e| write_error(e.to_string()))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| write_error(e.to_string()))?;
        tmp.write_all(&json).map_err(|e| write_error(e.to_string()))?;
        tmp.write_all(b"\n").map_err(|e| write_error(e.to_string()))?;
        tmp.as_file().sync_all().map_err(|e| write_error(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| write_error(e.error.to_string()))?;

        Ok(())
    }
}

impl LedgerStore for FileLedger {
    fn read(&self) -> Result<BTreeMap<TenantId, LedgerEntry>> {
        Ok(self.load_rows()?.into_iter().map(|row| (row.tenant.clone(), row)).collect())
    }

    #[instrument(skip(self, label), fields(tenant = %tenant))]
    fn upsert(
        &self,
        tenant: &TenantId,
        label: &str,
        status: LedgerStatus,
        action: &str,
    ) -> Result<LedgerEntry> {
        let mut rows = self.load_rows()?;
        let entry = LedgerEntry::now(tenant.clone(), label, status, action);

        match rows.iter_mut().find(|row| &row.tenant == tenant) {
            Some(row) => *row = entry.clone(),
            None => rows.push(entry.clone()),
        }

        match self.write_rows(&rows) {
            Ok(()) => {
                metrics::record_ledger_write("ok");
                debug!(status = %status, action, "Ledger row updated");
                Ok(entry)
            }
            Err(e) => {
                metrics::record_ledger_write("error");
                warn!(error = %e, "Ledger write failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> TenantId {
        TenantId::parse(s).unwrap()
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path().join("status.json"));
        assert!(ledger.read().unwrap().is_empty());
        assert_eq!(ledger.status_of(&id("acme")).unwrap(), LedgerStatus::Unknown);
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path().join("status.json"));

        ledger.upsert(&id("acme"), "acme.example.com", LedgerStatus::Running, "Deployed").unwrap();
        ledger.upsert(&id("beta"), "beta", LedgerStatus::Error, "Missing deploy entry point").unwrap();
        ledger.upsert(&id("acme"), "acme.example.com", LedgerStatus::Stopped, "Stopped").unwrap();

        let rows = ledger.read().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[&id("acme")].status, LedgerStatus::Stopped);
        assert_eq!(rows[&id("acme")].last_action, "Stopped");
        assert_eq!(rows[&id("beta")].status, LedgerStatus::Error);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path().join("status.json"));

        for _ in 0..2 {
            ledger.upsert(&id("acme"), "acme", LedgerStatus::Running, "Deployment successful").unwrap();
        }

        let rows = ledger.read().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&id("acme")].status, LedgerStatus::Running);
    }

    #[test]
    fn test_survives_reopen_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.json");
        FileLedger::new(&path).upsert(&id("acme"), "acme", LedgerStatus::Running, "ok").unwrap();

        let reopened = FileLedger::new(&path);
        assert_eq!(reopened.status_of(&id("acme")).unwrap(), LedgerStatus::Running);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_timestamp_has_second_precision() {
        let entry = LedgerEntry::now(id("acme"), "acme", LedgerStatus::Running, "ok");
        assert_eq!(entry.timestamp.nanosecond(), 0);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"status\":\"Running\""));
    }

    #[test]
    fn test_unwritable_location_is_ledger_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let ledger = FileLedger::new(blocker.join("status.json"));
        let err = ledger.upsert(&id("acme"), "acme", LedgerStatus::Running, "ok").unwrap_err();
        assert!(matches!(err, FleetError::LedgerWriteError { .. }));
    }

    #[test]
    fn test_corrupt_ledger_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "[{ broken").unwrap();
        assert!(matches!(FileLedger::new(&path).read(), Err(FleetError::LedgerReadError { .. })));
    }
}
