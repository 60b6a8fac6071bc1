//! fleet core library
//!
//! Tenant discovery, lifecycle orchestration, status ledger, health
//! reconciliation and backups for a fleet of single-host tenant stacks.

pub mod backup;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod naming;
pub mod observability;
pub mod paths;
pub mod reconcile;
pub mod registry;
pub mod runtime;
pub mod types;

// Re-export commonly used items
pub use backup::{Archive, ArchiveSubject, AutoConfirm, BackupManager, Confirm, RestoreOutcome};
pub use config::Config;
pub use error::{FleetError, Result};
pub use ledger::{FileLedger, LedgerEntry, LedgerStatus, LedgerStore};
pub use lifecycle::{LifecycleController, StackAction};
pub use observability::init as init_observability;
pub use reconcile::{HealthReconciler, LiveHealth, TenantHealth};
pub use registry::{TenantEnv, TenantRegistry};
pub use runtime::{ContainerHealth, DockerCli, ImageSummary, MemoryRuntime, RuntimeAdapter};
pub use types::{Action, BulkReport, Outcome, Tenant, TenantId, TenantLayout, TenantOutcome};
