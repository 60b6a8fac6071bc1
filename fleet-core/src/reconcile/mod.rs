//! Health reconciliation.
//!
//! Merges the status ledger with live runtime queries into one view per
//! tenant. Purely a read path: nothing here writes to the ledger or the
//! runtime. Drift between the two is reported for an operator, never
//! corrected.

use crate::error::{FleetError, Result};
use crate::ledger::{LedgerEntry, LedgerStatus, LedgerStore};
use crate::naming;
use crate::runtime::{ContainerHealth, RuntimeAdapter};
use crate::types::{Tenant, TenantId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Live state of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveHealth {
    /// Running and its health probe passes.
    Healthy,
    /// Running, with no passing probe result (none configured, starting or failing).
    Running,
    /// Not running, or absent.
    Stopped,
    /// The runtime could not be asked.
    Unknown,
}

impl LiveHealth {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Healthy | Self::Running)
    }
}

impl std::fmt::Display for LiveHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger and live view of one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantHealth {
    pub tenant: TenantId,
    pub label: String,
    pub ledger: Option<LedgerEntry>,
    pub web: LiveHealth,
    pub db: LiveHealth,
}

impl TenantHealth {
    /// Recorded status; a missing row reads as `Unknown`.
    pub fn ledger_status(&self) -> LedgerStatus {
        self.ledger.as_ref().map(|e| e.status).unwrap_or_default()
    }

    /// Whether the recorded status disagrees with the web container.
    ///
    /// An unknown live state never counts as drift.
    pub fn drift(&self) -> bool {
        match (self.ledger_status(), self.web) {
            (_, LiveHealth::Unknown) => false,
            (LedgerStatus::Running, live) => !live.is_up(),
            (LedgerStatus::Stopped | LedgerStatus::Error, live) => live.is_up(),
            (LedgerStatus::Unknown, _) => false,
        }
    }
}

/// Read-only view over ledger and runtime.
pub struct HealthReconciler {
    runtime: Arc<dyn RuntimeAdapter>,
    ledger: Arc<dyn LedgerStore>,
}

impl HealthReconciler {
    pub fn new(runtime: Arc<dyn RuntimeAdapter>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { runtime, ledger }
    }

    /// Ledger status plus live web and database health of one tenant.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn status(&self, tenant: &Tenant) -> Result<TenantHealth> {
        let ledger = self.ledger.read()?.remove(&tenant.id);
        Ok(self.probe(tenant, ledger).await)
    }

    /// Status of every tenant, reading the ledger once.
    #[instrument(skip(self, tenants), fields(count = tenants.len()))]
    pub async fn status_all(&self, tenants: &[Tenant]) -> Result<Vec<TenantHealth>> {
        let mut rows: BTreeMap<TenantId, LedgerEntry> = self.ledger.read()?;
        let mut view = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            view.push(self.probe(tenant, rows.remove(&tenant.id)).await);
        }
        Ok(view)
    }

    /// Tenants whose ledger status disagrees with live state.
    pub async fn drift(&self, tenants: &[Tenant]) -> Result<Vec<TenantHealth>> {
        let view = self.status_all(tenants).await?;
        Ok(view.into_iter().filter(TenantHealth::drift).collect())
    }

    async fn probe(&self, tenant: &Tenant, ledger: Option<LedgerEntry>) -> TenantHealth {
        let web = self.live(&naming::web_container(&tenant.id)).await;
        let db = self.live(&naming::db_container(&tenant.id)).await;
        debug!(web = %web, db = %db, "Probed tenant containers");

        TenantHealth {
            tenant: tenant.id.clone(),
            label: tenant.label().to_string(),
            ledger,
            web,
            db,
        }
    }

    async fn live(&self, container: &str) -> LiveHealth {
        match self.runtime.is_running(container).await {
            Ok(false) | Err(FleetError::NotFound { .. }) => return LiveHealth::Stopped,
            Ok(true) => {}
            Err(e) => {
                warn!(container, error = %e, "Live state unavailable");
                return LiveHealth::Unknown;
            }
        }

        match self.runtime.health_status(container).await {
            Ok(ContainerHealth::Healthy) => LiveHealth::Healthy,
            Ok(_) => LiveHealth::Running,
            Err(e) => {
                debug!(container, error = %e, "Health probe unavailable");
                LiveHealth::Running
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FileLedger;
    use crate::runtime::MemoryRuntime;
    use crate::types::TenantLayout;
    use tempfile::TempDir;

    fn tenant(name: &str) -> Tenant {
        Tenant::new(TenantId::parse(name).unwrap(), format!("/srv/tenants/{}", name), &TenantLayout::default())
    }

    fn setup() -> (TempDir, Arc<MemoryRuntime>, Arc<FileLedger>) {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(FileLedger::new(dir.path().join("status.json")));
        (dir, Arc::new(MemoryRuntime::new()), ledger)
    }

    #[tokio::test]
    async fn test_live_health_mapping() {
        let (_dir, runtime, ledger) = setup();
        runtime.set_container("acme-web", true, ContainerHealth::Healthy);
        runtime.set_container("acme-db", true, ContainerHealth::Starting);
        runtime.set_container("beta-web", true, ContainerHealth::None);
        runtime.set_container("beta-db", false, ContainerHealth::Healthy);

        let reconciler = HealthReconciler::new(runtime, ledger);
        let acme = reconciler.status(&tenant("acme")).await.unwrap();
        assert_eq!((acme.web, acme.db), (LiveHealth::Healthy, LiveHealth::Running));

        let beta = reconciler.status(&tenant("beta")).await.unwrap();
        assert_eq!((beta.web, beta.db), (LiveHealth::Running, LiveHealth::Stopped));

        let ghost = reconciler.status(&tenant("ghost")).await.unwrap();
        assert_eq!((ghost.web, ghost.db), (LiveHealth::Stopped, LiveHealth::Stopped));
        assert_eq!(ghost.ledger_status(), LedgerStatus::Unknown);
    }

    #[tokio::test]
    async fn test_unavailable_runtime_is_unknown_not_stopped() {
        let (_dir, runtime, ledger) = setup();
        runtime.set_container("acme-web", true, ContainerHealth::Healthy);
        runtime.set_unavailable(true);
        ledger.upsert(&TenantId::parse("acme").unwrap(), "acme", LedgerStatus::Running, "ok").unwrap();

        let reconciler = HealthReconciler::new(runtime, ledger);
        let acme = reconciler.status(&tenant("acme")).await.unwrap();
        assert_eq!(acme.web, LiveHealth::Unknown);
        assert!(!acme.drift());
    }

    #[tokio::test]
    async fn test_drift_detection_does_not_touch_ledger() {
        let (dir, runtime, ledger) = setup();
        runtime.set_container("acme-web", false, ContainerHealth::None);
        runtime.set_container("beta-web", true, ContainerHealth::None);
        runtime.set_container("gamma-web", true, ContainerHealth::Healthy);
        for (name, status) in [
            ("acme", LedgerStatus::Running),
            ("beta", LedgerStatus::Stopped),
            ("gamma", LedgerStatus::Running),
        ] {
            ledger.upsert(&TenantId::parse(name).unwrap(), name, status, "seed").unwrap();
        }
        let before = std::fs::read(dir.path().join("status.json")).unwrap();

        let reconciler = HealthReconciler::new(runtime.clone(), ledger);
        let drifted = reconciler
            .drift(&[tenant("acme"), tenant("beta"), tenant("gamma")])
            .await
            .unwrap();

        let names: Vec<&str> = drifted.iter().map(|h| h.tenant.as_str()).collect();
        assert_eq!(names, vec!["acme", "beta"]);
        assert_eq!(std::fs::read(dir.path().join("status.json")).unwrap(), before);
        assert!(runtime.calls().is_empty());
    }
}
