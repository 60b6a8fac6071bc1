//! Backup and restore of the edge certificate store and tenant databases.
//!
//! Archives land in one directory, named so that subject and creation time
//! can be read back from the file name (see [`archive`]). Every archive is
//! written to a temporary file in that directory and renamed into place once
//! complete and restricted to its owner, so a failed backup leaves nothing
//! behind.
//!
//! Restore and cleanup are destructive and go through a [`Confirm`] gate.
//! A certificate store restore never deletes the live tree first: it is moved
//! to a `.old` sidecar which is only removed after the proxy came back up.

pub mod archive;
pub mod confirm;

pub use archive::{Archive, ArchiveSubject};
pub use confirm::{AutoConfirm, Confirm};

use crate::config::Config;
use crate::error::{FleetError, Result};
use crate::naming;
use crate::observability::metrics;
use crate::registry::{TenantEnv, TenantRegistry};
use crate::runtime::{with_deadline, RuntimeAdapter};
use crate::types::{Action, BulkReport, Outcome, Tenant, TenantId};
use chrono::{Local, NaiveDateTime};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

const SECRET_DB_USER: &str = "db_user";
const SECRET_DB_PASSWORD: &str = "db_password";

/// Result of a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The operator declined; nothing was changed.
    Aborted,
}

/// Database access for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DbCredentials {
    user: String,
    password: Option<String>,
    database: String,
}

impl DbCredentials {
    /// Secret files take precedence over descriptor values.
    fn resolve(tenant: &Tenant, env: &TenantEnv) -> Result<Self> {
        let user = read_secret(&tenant.secret_path(SECRET_DB_USER))
            .or_else(|| env.db_user().map(str::to_string))
            .ok_or_else(|| FleetError::EnvMissing {
                tenant: tenant.id.to_string(),
                path: tenant.env_file.clone(),
                reason: "no database user in secrets or descriptor".to_string(),
            })?;
        let password = read_secret(&tenant.secret_path(SECRET_DB_PASSWORD))
            .or_else(|| env.db_password().map(str::to_string));
        let database = env.db_name().map(str::to_string).unwrap_or_else(|| user.clone());
        Ok(Self { user, password, database })
    }

    fn dump_args(&self) -> Vec<String> {
        vec![
            "pg_dump".to_string(),
            "-U".to_string(),
            self.user.clone(),
            "-d".to_string(),
            self.database.clone(),
            "--clean".to_string(),
            "--if-exists".to_string(),
        ]
    }

    fn restore_args(&self) -> Vec<String> {
        vec![
            "psql".to_string(),
            "-q".to_string(),
            "-U".to_string(),
            self.user.clone(),
            "-d".to_string(),
            self.database.clone(),
        ]
    }

    /// Password travels in the environment, never on the command line.
    fn env(&self) -> Vec<(String, String)> {
        self.password
            .iter()
            .map(|p| ("PGPASSWORD".to_string(), p.clone()))
            .collect()
    }
}

fn read_secret(path: &Path) -> Option<String> {
    let value = std::fs::read_to_string(path).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn sidecar_path(live: &Path) -> PathBuf {
    let mut name = OsString::from(live.as_os_str());
    name.push(".old");
    PathBuf::from(name)
}

/// Produces, lists, prunes and restores archives.
pub struct BackupManager {
    runtime: Arc<dyn RuntimeAdapter>,
    registry: TenantRegistry,
    confirm: Arc<dyn Confirm>,
    backup_dir: PathBuf,
    cert_store_dir: PathBuf,
    edge_proxy_stack: PathBuf,
    edge_proxy_project: String,
    deadline: Option<Duration>,
}

impl BackupManager {
    pub fn new(runtime: Arc<dyn RuntimeAdapter>, config: &Config, confirm: Arc<dyn Confirm>) -> Self {
        Self {
            runtime,
            registry: TenantRegistry::from_config(config),
            confirm,
            backup_dir: config.backup_dir.clone(),
            cert_store_dir: config.cert_store_dir.clone(),
            edge_proxy_stack: config.edge_proxy_dir.join(&config.stack_file),
            edge_proxy_project: config.edge_proxy_project.clone(),
            deadline: None,
        }
    }

    /// Bound runtime calls and archive streams by `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Archive the whole certificate store tree.
    #[instrument(skip(self), fields(store = %self.cert_store_dir.display()))]
    pub async fn backup_edge_cert_store(&self) -> Result<Archive> {
        let result = self.archive_cert_store().await;
        observe_backup(&ArchiveSubject::EdgeCertStore, &result);
        result
    }

    /// Dump one tenant's database into a compressed archive.
    ///
    /// Refuses when the descriptor cannot be loaded or the database container
    /// is not running; no file is produced in either case.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn backup_tenant_data(&self, tenant: &Tenant) -> Result<Archive> {
        let result = self.dump_tenant(tenant).await;
        observe_backup(&ArchiveSubject::TenantData(tenant.id.clone()), &result);
        result
    }

    /// Back up every tenant of one registry scan, counting outcomes.
    pub async fn backup_all_tenants(&self) -> Result<BulkReport> {
        let tenants = self.registry.discover()?;
        let mut report = BulkReport::default();

        for tenant in &tenants {
            let outcome = match self.backup_tenant_data(tenant).await {
                Ok(_) => Outcome::Succeeded,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            report.record(tenant.id.clone(), Action::Backup, outcome);
        }

        info!(succeeded = report.succeeded, failed = report.failed, "Tenant backups complete");
        Ok(report)
    }

    /// Restore from an archive, dispatching on its file name.
    ///
    /// An unrecognised name fails before anything is touched.
    #[instrument(skip(self), fields(archive = %path.display()))]
    pub async fn restore(&self, path: &Path) -> Result<RestoreOutcome> {
        let (subject, _) = archive::classify(path)?;
        if !path.is_file() {
            return Err(FleetError::ArchiveMissing { path: path.to_path_buf() });
        }

        let result = match &subject {
            ArchiveSubject::EdgeCertStore => self.restore_cert_store(path).await,
            ArchiveSubject::TenantData(id) => self.restore_tenant_data(id, path).await,
        };

        match &result {
            Ok(RestoreOutcome::Restored) => {
                metrics::record_restore(subject.kind(), "ok");
                info!(subject = %subject, "Restore complete");
            }
            Ok(RestoreOutcome::Aborted) => {
                metrics::record_restore(subject.kind(), "aborted");
                info!(subject = %subject, "Restore aborted by operator");
            }
            Err(e) => {
                metrics::record_restore(subject.kind(), e.kind());
                warn!(subject = %subject, error = %e, "Restore failed");
            }
        }
        result
    }

    /// Delete archives older than `retention_days`, after confirmation.
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        self.cleanup_at(retention_days, Local::now().naive_local())
    }

    /// [`Self::cleanup`] measured against `now`.
    ///
    /// Age comes from the timestamp in each file name. Returns the number of
    /// files removed; nothing to remove, or a declined prompt, yields zero.
    /// Any confirmed deletion that fails turns the whole call into an error
    /// naming the first path that could not be removed.
    pub fn cleanup_at(&self, retention_days: u32, now: NaiveDateTime) -> Result<usize> {
        let cutoff = now - chrono::Duration::days(i64::from(retention_days));
        let expired: Vec<Archive> =
            self.scan()?.into_iter().filter(|a| a.created_at < cutoff).collect();

        if expired.is_empty() {
            debug!(retention_days, "No archives past retention");
            return Ok(0);
        }

        let prompt = format!(
            "Delete {} archive(s) older than {} days from {}?",
            expired.len(),
            retention_days,
            self.backup_dir.display()
        );
        if !self.confirm.confirm(&prompt) {
            info!("Cleanup declined");
            return Ok(0);
        }

        let mut removed = 0;
        let mut first_failure = None;
        for archive in &expired {
            match std::fs::remove_file(&archive.path) {
                Ok(()) => {
                    removed += 1;
                    debug!(file = %archive.path.display(), "Removed expired archive");
                }
                Err(e) => {
                    warn!(file = %archive.path.display(), error = %e, "Failed to remove archive");
                    first_failure.get_or_insert_with(|| FleetError::io(&archive.path, e));
                }
            }
        }

        if let Some(err) = first_failure {
            error!(removed, failed = expired.len() - removed, "Archive cleanup incomplete");
            return Err(err);
        }
        info!(removed, retention_days, "Archive cleanup complete");
        Ok(removed)
    }

    /// Archives grouped by subject, newest first.
    pub fn list(&self) -> Result<BTreeMap<ArchiveSubject, Vec<Archive>>> {
        let mut grouped: BTreeMap<ArchiveSubject, Vec<Archive>> = BTreeMap::new();
        for archive in self.scan()? {
            grouped.entry(archive.subject.clone()).or_default().push(archive);
        }
        for archives in grouped.values_mut() {
            archives.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Ok(grouped)
    }

    /// Decode an archive end to end.
    pub async fn verify(&self, path: &Path) -> Result<Archive> {
        let (subject, _) = archive::classify(path)?;
        if !path.is_file() {
            return Err(FleetError::ArchiveMissing { path: path.to_path_buf() });
        }

        let owned = path.to_path_buf();
        let decoded =
            tokio::task::spawn_blocking(move || archive::verify_stream(&owned, &subject))
                .await
                .map_err(FleetError::internal)?
                .map_err(|e| FleetError::io(path, e))?;
        debug!(bytes = decoded, "Archive decoded");

        Archive::inspect(path)
            .ok_or_else(|| FleetError::UnknownArchiveType { file: path.display().to_string() })
    }

    fn scan(&self) -> Result<Vec<Archive>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(&self.backup_dir).map_err(|e| FleetError::io(&self.backup_dir, e))?;
        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| Archive::inspect(&path))
            .collect())
    }

    fn ensure_backup_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.backup_dir).map_err(|e| FleetError::io(&self.backup_dir, e))?;
        archive::restrict(&self.backup_dir, 0o700).map_err(|e| FleetError::io(&self.backup_dir, e))
    }

    async fn require_running(&self, container: &str) -> Result<()> {
        match with_deadline(self.deadline, self.runtime.is_running(container)).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(FleetError::NotFound { .. }) => {
                Err(FleetError::ContainerNotRunning { container: container.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    fn seal(&self, tmp: NamedTempFile, subject: ArchiveSubject, created_at: NaiveDateTime) -> Result<Archive> {
        let path = self.backup_dir.join(subject.file_name(created_at));
        tmp.as_file().sync_all().map_err(|e| FleetError::io(tmp.path(), e))?;
        archive::restrict(tmp.path(), 0o600).map_err(|e| FleetError::io(tmp.path(), e))?;
        let file = tmp.persist(&path).map_err(|e| FleetError::io(&path, e.error))?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Archive { subject, created_at, path, size, readable: true })
    }

    async fn archive_cert_store(&self) -> Result<Archive> {
        if !self.cert_store_dir.is_dir() {
            return Err(FleetError::CertStoreMissing { path: self.cert_store_dir.clone() });
        }
        self.ensure_backup_dir()?;
        let created_at = Local::now().naive_local();

        let src = self.cert_store_dir.clone();
        let dir = self.backup_dir.clone();
        let task = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            archive::pack_dir(&src, tmp.as_file_mut())?;
            Ok(tmp)
        });
        let tmp = with_deadline(self.deadline, async {
            task.await
                .map_err(FleetError::internal)?
                .map_err(|e| FleetError::io(&self.cert_store_dir, e))
        })
        .await?;

        self.seal(tmp, ArchiveSubject::EdgeCertStore, created_at)
    }

    async fn dump_tenant(&self, tenant: &Tenant) -> Result<Archive> {
        let env = load_env(tenant)?;
        let container = naming::db_container(&tenant.id);
        self.require_running(&container).await?;
        let creds = DbCredentials::resolve(tenant, &env)?;

        self.ensure_backup_dir()?;
        let created_at = Local::now().naive_local();
        let mut tmp =
            NamedTempFile::new_in(&self.backup_dir).map_err(|e| FleetError::io(&self.backup_dir, e))?;
        let tmp_path = tmp.path().to_path_buf();

        let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
        let written = with_deadline(
            self.deadline,
            self.runtime.exec_piped_out(&container, &creds.dump_args(), &creds.env(), &mut encoder),
        )
        .await?;
        encoder.finish().map_err(|e| FleetError::io(&tmp_path, e))?;
        debug!(bytes = written, "Database dump streamed");

        self.seal(tmp, ArchiveSubject::TenantData(tenant.id.clone()), created_at)
    }

    async fn restore_cert_store(&self, path: &Path) -> Result<RestoreOutcome> {
        let live = self.cert_store_dir.clone();
        let sidecar = sidecar_path(&live);
        if sidecar.exists() {
            return Err(FleetError::SidecarExists { path: sidecar });
        }

        let prompt = format!(
            "Restore the edge certificate store from {}? The edge proxy will be restarted.",
            path.display()
        );
        if !self.confirm.confirm(&prompt) {
            return Ok(RestoreOutcome::Aborted);
        }

        with_deadline(
            self.deadline,
            self.runtime.stop_stack(&self.edge_proxy_stack, false, &self.edge_proxy_project),
        )
        .await?;

        let had_live = live.exists();
        if had_live {
            if let Err(e) = std::fs::rename(&live, &sidecar) {
                self.start_proxy_best_effort().await;
                return Err(FleetError::io(&live, e));
            }
        }

        let archive_path = path.to_path_buf();
        let dest = live.clone();
        let extracted = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dest)?;
            archive::unpack_into(&archive_path, &dest)?;
            archive::restrict_tree(&dest)
        })
        .await
        .map_err(FleetError::internal)
        .and_then(|r| r.map_err(|e| FleetError::io(path, e)));

        if let Err(e) = extracted {
            return Err(self.roll_back(&live, &sidecar, had_live, e).await);
        }

        let started = with_deadline(
            self.deadline,
            self.runtime.start_stack(&self.edge_proxy_stack, &self.edge_proxy_project),
        )
        .await;
        if let Err(e) = started {
            return Err(self.roll_back(&live, &sidecar, had_live, e).await);
        }

        if had_live {
            if let Err(e) = std::fs::remove_dir_all(&sidecar) {
                warn!(sidecar = %sidecar.display(), error = %e, "Restored, but the previous store could not be removed");
            }
        }
        Ok(RestoreOutcome::Restored)
    }

    /// Put the previous store back and bring the proxy up again.
    ///
    /// Returns the error to surface: `cause`, unless the previous store could
    /// not be reinstated, in which case the error names the sidecar.
    async fn roll_back(&self, live: &Path, sidecar: &Path, had_live: bool, cause: FleetError) -> FleetError {
        warn!(error = %cause, "Rolling back certificate store restore");
        if live.exists() {
            if let Err(e) = std::fs::remove_dir_all(live) {
                error!(path = %live.display(), error = %e, "Failed to remove partially restored store");
            }
        }
        let mut result = cause;
        if had_live {
            if let Err(e) = std::fs::rename(sidecar, live) {
                error!(sidecar = %sidecar.display(), error = %e, "Failed to reinstate previous store");
                result = FleetError::RollbackFailed {
                    sidecar: sidecar.to_path_buf(),
                    cause: result.to_string(),
                    source: e,
                };
            }
        }
        self.start_proxy_best_effort().await;
        result
    }

    async fn start_proxy_best_effort(&self) {
        let started = with_deadline(
            self.deadline,
            self.runtime.start_stack(&self.edge_proxy_stack, &self.edge_proxy_project),
        )
        .await;
        if let Err(e) = started {
            error!(error = %e, "Failed to restart edge proxy");
        }
    }

    async fn restore_tenant_data(&self, id: &TenantId, path: &Path) -> Result<RestoreOutcome> {
        let tenant = self.registry.find(id.as_str())?;
        let env = load_env(&tenant)?;
        let container = naming::db_container(&tenant.id);
        self.require_running(&container).await?;
        let creds = DbCredentials::resolve(&tenant, &env)?;

        let prompt = format!(
            "Restore the database of tenant {} from {}? Existing data will be overwritten.",
            tenant.id,
            path.display()
        );
        if !self.confirm.confirm(&prompt) {
            return Ok(RestoreOutcome::Aborted);
        }

        let file = File::open(path).map_err(|e| FleetError::io(path, e))?;
        let mut source = GzDecoder::new(file);
        let fed = with_deadline(
            self.deadline,
            self.runtime.exec_piped_in(&container, &creds.restore_args(), &creds.env(), &mut source),
        )
        .await?;
        debug!(bytes = fed, "Database dump replayed");
        Ok(RestoreOutcome::Restored)
    }
}

fn load_env(tenant: &Tenant) -> Result<TenantEnv> {
    TenantEnv::load(&tenant.env_file).map_err(|e| FleetError::EnvMissing {
        tenant: tenant.id.to_string(),
        path: tenant.env_file.clone(),
        reason: e.to_string(),
    })
}

fn observe_backup(subject: &ArchiveSubject, result: &Result<Archive>) {
    match result {
        Ok(archive) => {
            metrics::record_backup(subject.kind(), "ok");
            info!(file = %archive.path.display(), size = archive.size, "Backup created");
        }
        Err(e) => {
            metrics::record_backup(subject.kind(), e.kind());
            warn!(subject = %subject, error = %e, "Backup failed");
        }
    }
}
