//! Integration tests for tenant lifecycle operations.
//!
//! These tests drive the full path from discovery to ledger:
//! - Discover tenants on disk
//! - Deploy / stop them in bulk
//! - Reconcile the ledger against live container state
//!
//! Tests use a temporary tenant root and the in-memory runtime.

use fleet_core::{
    ContainerHealth, FileLedger, FleetError, HealthReconciler, LedgerStatus, LedgerStore,
    LifecycleController, LiveHealth, MemoryRuntime, TenantId, TenantLayout, TenantRegistry,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_tenant(root: &Path, name: &str, deploy_entry: bool) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(".env"), format!("TENANT_ID={name}\nDOMAIN={name}.example.com\n")).unwrap();
    std::fs::write(dir.join("docker-compose.yml"), "services:\n  web: {}\n  db: {}\n").unwrap();
    if deploy_entry {
        std::fs::write(dir.join("deploy.sh"), "#!/bin/sh\n").unwrap();
    }
}

struct Harness {
    _dir: TempDir,
    registry: TenantRegistry,
    runtime: Arc<MemoryRuntime>,
    ledger: Arc<FileLedger>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tenants = dir.path().join("tenants");
        std::fs::create_dir_all(&tenants).unwrap();
        let registry = TenantRegistry::new(&tenants, TenantLayout::default());
        let ledger = Arc::new(FileLedger::new(dir.path().join("state/status.json")));
        Self { _dir: dir, registry, runtime: Arc::new(MemoryRuntime::new()), ledger }
    }

    fn add(&self, name: &str, deploy_entry: bool) {
        write_tenant(self.registry.root(), name, deploy_entry);
        for role in ["web", "db"] {
            self.runtime.set_container(&format!("{name}-{role}"), false, ContainerHealth::Healthy);
        }
    }

    fn controller(&self) -> LifecycleController {
        LifecycleController::new(self.runtime.clone(), self.ledger.clone())
    }

    fn status(&self, name: &str) -> (LedgerStatus, String) {
        let rows = self.ledger.read().unwrap();
        let row = &rows[&TenantId::parse(name).unwrap()];
        (row.status, row.last_action.clone())
    }
}

#[tokio::test]
async fn test_deploy_all_with_one_incomplete_tenant() {
    let h = Harness::new();
    h.add("acme", true);
    h.add("beta", false);

    let report = h.controller().deploy_all(&h.registry).await.unwrap();

    assert_eq!(report.counts(), (1, 1));
    assert!(!report.is_full_success());
    assert_eq!(h.status("acme").0, LedgerStatus::Running);
    let (beta_status, beta_action) = h.status("beta");
    assert_eq!(beta_status, LedgerStatus::Error);
    assert!(beta_action.to_lowercase().contains("missing"), "{beta_action}");

    let rows = h.ledger.read().unwrap();
    assert_eq!(rows[&TenantId::parse("acme").unwrap()].label, "acme.example.com");
}

#[tokio::test]
async fn test_unreadable_root_aborts_before_any_work() {
    let dir = TempDir::new().unwrap();
    let registry = TenantRegistry::new(dir.path().join("missing"), TenantLayout::default());
    let runtime = Arc::new(MemoryRuntime::new());
    let ledger = Arc::new(FileLedger::new(dir.path().join("status.json")));

    let err = LifecycleController::new(runtime.clone(), ledger.clone())
        .deploy_all(&registry)
        .await
        .unwrap_err();

    assert!(matches!(err, FleetError::RegistryUnreadable { .. }));
    assert!(runtime.calls().is_empty());
    assert!(ledger.read().unwrap().is_empty());
}

#[tokio::test]
async fn test_discovery_is_stable_and_skips_partial_units() {
    let h = Harness::new();
    h.add("zeta", true);
    h.add("alpha", true);
    let root = h.registry.root();
    std::fs::create_dir_all(root.join("half")).unwrap();
    std::fs::write(root.join("half/.env"), "DOMAIN=half\n").unwrap();
    std::fs::create_dir_all(root.join(".template")).unwrap();
    std::fs::write(root.join(".template/.env"), "").unwrap();
    std::fs::write(root.join(".template/docker-compose.yml"), "").unwrap();

    let first: Vec<String> = h.registry.discover().unwrap().iter().map(|t| t.id.to_string()).collect();
    let second: Vec<String> = h.registry.discover().unwrap().iter().map(|t| t.id.to_string()).collect();

    assert_eq!(first, vec!["alpha", "zeta"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_stop_all_then_reconcile() {
    let h = Harness::new();
    h.add("acme", true);
    h.add("beta", true);
    let controller = h.controller();

    let deployed = controller.deploy_all(&h.registry).await.unwrap();
    assert_eq!(deployed.counts(), (2, 0));

    let stopped = controller.stop_all(&h.registry).await.unwrap();
    assert_eq!(stopped.counts(), (2, 0));
    assert_eq!(h.status("beta"), (LedgerStatus::Stopped, "Stopped".to_string()));

    let tenants = h.registry.discover().unwrap();
    let reconciler = HealthReconciler::new(h.runtime.clone(), h.ledger.clone());
    let view = reconciler.status_all(&tenants).await.unwrap();
    assert!(view.iter().all(|t| t.web == LiveHealth::Stopped && t.db == LiveHealth::Stopped));
    assert!(reconciler.drift(&tenants).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_band_crash_shows_as_drift() {
    let h = Harness::new();
    h.add("acme", true);
    let acme = h.registry.find("acme").unwrap();
    h.controller().deploy_one(&acme).await.unwrap();

    h.runtime.set_container("acme-web", false, ContainerHealth::None);

    let reconciler = HealthReconciler::new(h.runtime.clone(), h.ledger.clone());
    let health = reconciler.status(&acme).await.unwrap();
    assert_eq!(health.ledger_status(), LedgerStatus::Running);
    assert_eq!(health.web, LiveHealth::Stopped);
    assert_eq!(health.db, LiveHealth::Healthy);
    assert!(health.drift());
    assert_eq!(h.status("acme").0, LedgerStatus::Running);
}
