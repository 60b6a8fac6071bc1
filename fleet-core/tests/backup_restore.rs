//! Integration tests for backups, restores and retention.
//!
//! Every test runs against a temporary data directory with the in-memory
//! runtime standing in for the container daemon.

use chrono::{Duration, Local};
use fleet_core::{
    ArchiveSubject, AutoConfirm, BackupManager, Config, ContainerHealth, FleetError, MemoryRuntime,
    TenantId, TenantLayout, TenantRegistry,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn config(root: &Path) -> Config {
    Config {
        tenants_dir: root.join("tenants"),
        ledger_path: root.join("status.json"),
        backup_dir: root.join("backups"),
        cert_store_dir: root.join("traefik/acme"),
        edge_proxy_dir: root.join("traefik"),
        ..Config::default()
    }
}

/// Every file under `root` with its content.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.insert(path.clone(), std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[tokio::test]
async fn test_unknown_archive_type_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    std::fs::create_dir_all(&config.cert_store_dir).unwrap();
    std::fs::write(config.cert_store_dir.join("acme.json"), b"{}").unwrap();
    std::fs::create_dir_all(&config.backup_dir).unwrap();
    let stray = config.backup_dir.join("acme_dump_latest.sql.gz");
    std::fs::write(&stray, b"whatever").unwrap();
    let before = snapshot(dir.path());

    let runtime = Arc::new(MemoryRuntime::new());
    let confirm = Arc::new(AutoConfirm::yes());
    let manager = BackupManager::new(runtime.clone(), &config, confirm.clone());
    let err = manager.restore(&stray).await.unwrap_err();

    assert!(matches!(err, FleetError::UnknownArchiveType { .. }));
    assert_eq!(snapshot(dir.path()), before);
    assert!(runtime.calls().is_empty());
    assert!(confirm.prompts().is_empty());
}

#[tokio::test]
async fn test_failed_extraction_recovers_original_store() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let store = &config.cert_store_dir;
    std::fs::create_dir_all(store.join("certs")).unwrap();
    std::fs::write(store.join("acme.json"), b"{\"original\":true}").unwrap();
    std::fs::write(store.join("certs/site.pem"), b"ORIGINAL PEM").unwrap();
    let original = snapshot(store);

    std::fs::create_dir_all(&config.backup_dir).unwrap();
    let corrupt = config.backup_dir.join("traefik_acme_20240101_120000.tar.gz");
    std::fs::write(&corrupt, b"\x1f\x8b truncated gzip header").unwrap();

    let runtime = Arc::new(MemoryRuntime::new());
    let manager = BackupManager::new(runtime.clone(), &config, Arc::new(AutoConfirm::yes()));
    assert!(manager.restore(&corrupt).await.is_err());

    assert_eq!(snapshot(store), original);
    let mut sidecar = store.as_os_str().to_owned();
    sidecar.push(".old");
    assert!(!Path::new(&sidecar).exists());
    let calls = runtime.calls();
    assert_eq!(calls.len(), 2, "proxy stopped then started again: {calls:?}");
}

#[tokio::test]
async fn test_stopped_database_is_not_backed_up() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let tenant_root = config.tenants_dir.join("acme");
    std::fs::create_dir_all(&tenant_root).unwrap();
    std::fs::write(tenant_root.join(".env"), "DB_USER=app\nDB_NAME=app\n").unwrap();
    std::fs::write(tenant_root.join("docker-compose.yml"), "services: {}\n").unwrap();

    let runtime = Arc::new(MemoryRuntime::new());
    runtime.set_container("acme-db", false, ContainerHealth::None);
    let registry = TenantRegistry::new(&config.tenants_dir, TenantLayout::default());
    let tenant = registry.find("acme").unwrap();

    let manager = BackupManager::new(runtime, &config, Arc::new(AutoConfirm::yes()));
    let err = manager.backup_tenant_data(&tenant).await.unwrap_err();

    assert!(matches!(err, FleetError::ContainerNotRunning { .. }));
    assert!(manager.list().unwrap().is_empty());
    let leftovers = std::fs::read_dir(&config.backup_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn test_cleanup_removes_only_expired_archives() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    std::fs::create_dir_all(&config.backup_dir).unwrap();

    let now = Local::now().naive_local();
    let acme = ArchiveSubject::TenantData(TenantId::parse("acme").unwrap());
    let old = config.backup_dir.join(acme.file_name(now - Duration::days(45)));
    let recent = config.backup_dir.join(acme.file_name(now - Duration::days(10)));
    std::fs::write(&old, b"old").unwrap();
    std::fs::write(&recent, b"recent").unwrap();

    let confirm = Arc::new(AutoConfirm::yes());
    let manager = BackupManager::new(Arc::new(MemoryRuntime::new()), &config, confirm.clone());
    let removed = manager.cleanup_at(30, now).unwrap();

    assert_eq!(removed, 1);
    assert!(!old.exists());
    assert!(recent.exists());
    let prompts = confirm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Delete 1 archive"), "{}", prompts[0]);
}

#[test]
fn test_declined_cleanup_keeps_everything() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    std::fs::create_dir_all(&config.backup_dir).unwrap();
    let now = Local::now().naive_local();
    let old = config.backup_dir.join(ArchiveSubject::EdgeCertStore.file_name(now - Duration::days(90)));
    std::fs::write(&old, b"old").unwrap();

    let manager =
        BackupManager::new(Arc::new(MemoryRuntime::new()), &config, Arc::new(AutoConfirm::no()));
    assert_eq!(manager.cleanup_at(30, now).unwrap(), 0);
    assert!(old.exists());
}
