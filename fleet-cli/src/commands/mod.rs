//! CLI command implementations

pub mod backup;
pub mod confirm;
pub mod images;
pub mod lifecycle;
pub mod logs;
pub mod status;
pub mod ui;

use confirm::StdinConfirm;
use fleet_core::{
    BackupManager, Config, DockerCli, FileLedger, HealthReconciler, LifecycleController,
    RuntimeAdapter, TenantRegistry,
};
use std::sync::Arc;

/// Components shared by every command, built once from the configuration.
pub struct Context {
    pub config: Config,
    pub runtime: Arc<dyn RuntimeAdapter>,
    pub ledger: Arc<FileLedger>,
    pub registry: TenantRegistry,
    assume_yes: bool,
}

impl Context {
    pub fn new(config: Config, assume_yes: bool) -> Self {
        Self {
            runtime: Arc::new(DockerCli::new(config.docker_binary.clone())),
            ledger: Arc::new(FileLedger::new(config.ledger_path.clone())),
            registry: TenantRegistry::from_config(&config),
            config,
            assume_yes,
        }
    }

    pub fn controller(&self) -> LifecycleController {
        LifecycleController::new(self.runtime.clone(), self.ledger.clone())
            .with_deadline(self.config.operation_timeout())
    }

    pub fn reconciler(&self) -> HealthReconciler {
        HealthReconciler::new(self.runtime.clone(), self.ledger.clone())
    }

    pub fn backups(&self) -> BackupManager {
        BackupManager::new(
            self.runtime.clone(),
            &self.config,
            Arc::new(StdinConfirm::new(self.assume_yes)),
        )
        .with_deadline(self.config.operation_timeout())
    }
}
