//! Tenant lifecycle orchestration.
//!
//! Drives deploy, stop and restart for one tenant or for every tenant of a
//! registry snapshot, and records each outcome in the status ledger.
//!
//! Bulk operations run tenants strictly one after another. A failing tenant
//! is counted and the loop moves on; only a precondition violation before any
//! work starts (an unreadable tenant root) aborts the batch.
//!
//! A successful start is recorded as `Running` straight away, without waiting
//! for the containers to report healthy. The health reconciler shows any
//! drift afterwards.

use crate::error::{FleetError, Result};
use crate::ledger::{LedgerStatus, LedgerStore};
use crate::naming;
use crate::observability::metrics;
use crate::registry::TenantRegistry;
use crate::runtime::{with_deadline, RuntimeAdapter};
use crate::types::{Action, BulkReport, Outcome, Tenant};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Stack action that can be applied across a set of tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    Deploy,
    Stop,
    Restart,
}

impl From<StackAction> for Action {
    fn from(action: StackAction) -> Self {
        match action {
            StackAction::Deploy => Action::Deploy,
            StackAction::Stop => Action::Stop,
            StackAction::Restart => Action::Restart,
        }
    }
}

/// Drives tenant stacks through the runtime adapter.
pub struct LifecycleController {
    runtime: Arc<dyn RuntimeAdapter>,
    ledger: Arc<dyn LedgerStore>,
    deadline: Option<Duration>,
}

impl LifecycleController {
    /// Create a new lifecycle controller.
    pub fn new(runtime: Arc<dyn RuntimeAdapter>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { runtime, ledger, deadline: None }
    }

    /// Bound every runtime call by `deadline`; expiry fails the operation as cancelled.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Deploy one tenant.
    ///
    /// Requires the stack descriptor and the deploy entry point. When either
    /// is missing the runtime is never called and the ledger records `Error`.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn deploy_one(&self, tenant: &Tenant) -> Result<()> {
        let precondition = require(tenant, &tenant.stack_file, "stack descriptor")
            .and_then(|_| require(tenant, &tenant.deploy_entry, "deploy entry point"));
        if let Err(e) = precondition {
            return self.fail(tenant, Action::Deploy, e);
        }

        let project = naming::project_name(&tenant.id);
        info!(project = %project, "Deploying tenant stack");
        let result =
            with_deadline(self.deadline, self.runtime.start_stack(&tenant.stack_file, &project)).await;
        self.settle(tenant, Action::Deploy, result, LedgerStatus::Running, "Deployment successful")
    }

    /// Stop one tenant. Requires only the stack descriptor; volumes are kept.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn stop_one(&self, tenant: &Tenant) -> Result<()> {
        if let Err(e) = require(tenant, &tenant.stack_file, "stack descriptor") {
            return self.fail(tenant, Action::Stop, e);
        }

        let project = naming::project_name(&tenant.id);
        info!(project = %project, "Stopping tenant stack");
        let result = with_deadline(
            self.deadline,
            self.runtime.stop_stack(&tenant.stack_file, false, &project),
        )
        .await;
        self.settle(tenant, Action::Stop, result, LedgerStatus::Stopped, "Stopped")
    }

    /// Restart one tenant in place.
    ///
    /// The ledger never passes through `Stopped`: it records `Running` on
    /// success and `Error` otherwise.
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn restart(&self, tenant: &Tenant) -> Result<()> {
        if let Err(e) = require(tenant, &tenant.stack_file, "stack descriptor") {
            return self.fail(tenant, Action::Restart, e);
        }

        let project = naming::project_name(&tenant.id);
        info!(project = %project, "Restarting tenant stack");
        let result =
            with_deadline(self.deadline, self.runtime.restart_stack(&tenant.stack_file, &project))
                .await;
        self.settle(tenant, Action::Restart, result, LedgerStatus::Running, "Restarted")
    }

    /// Deploy every tenant of one fresh registry scan.
    pub async fn deploy_all(&self, registry: &TenantRegistry) -> Result<BulkReport> {
        let tenants = registry.discover()?;
        Ok(self.run_bulk(&tenants, StackAction::Deploy).await)
    }

    /// Stop every tenant of one fresh registry scan.
    pub async fn stop_all(&self, registry: &TenantRegistry) -> Result<BulkReport> {
        let tenants = registry.discover()?;
        Ok(self.run_bulk(&tenants, StackAction::Stop).await)
    }

    /// Apply `action` to each tenant in order, counting outcomes.
    #[instrument(skip(self, tenants), fields(count = tenants.len()))]
    pub async fn run_bulk(&self, tenants: &[Tenant], action: StackAction) -> BulkReport {
        let mut report = BulkReport::default();

        for tenant in tenants {
            let result = match action {
                StackAction::Deploy => self.deploy_one(tenant).await,
                StackAction::Stop => self.stop_one(tenant).await,
                StackAction::Restart => self.restart(tenant).await,
            };
            let outcome = match result {
                Ok(()) => Outcome::Succeeded,
                Err(e) => Outcome::Failed(e.to_string()),
            };
            report.record(tenant.id.clone(), action.into(), outcome);
        }

        info!(
            action = %Action::from(action),
            succeeded = report.succeeded,
            failed = report.failed,
            "Bulk operation complete"
        );
        report
    }

    /// Record the result of a runtime call.
    ///
    /// A ledger write failure after a successful runtime call still fails the
    /// operation, since its state could not be recorded.
    fn settle(
        &self,
        tenant: &Tenant,
        action: Action,
        result: Result<()>,
        status: LedgerStatus,
        message: &str,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                if let Err(e) = self.ledger.upsert(&tenant.id, tenant.label(), status, message) {
                    error!(error = %e, "Runtime action succeeded but ledger could not record it");
                    metrics::record_lifecycle(action.as_str(), "ledger_error");
                    return Err(e);
                }
                metrics::record_lifecycle(action.as_str(), "ok");
                info!(action = %action, status = %status, "{}", message);
                Ok(())
            }
            Err(e) => self.fail(tenant, action, e),
        }
    }

    fn fail(&self, tenant: &Tenant, action: Action, err: FleetError) -> Result<()> {
        warn!(action = %action, error = %err, "Tenant operation failed");
        metrics::record_lifecycle(action.as_str(), err.kind());
        if let Err(ledger_err) =
            self.ledger.upsert(&tenant.id, tenant.label(), LedgerStatus::Error, &err.reason())
        {
            error!(error = %ledger_err, "Failed to record tenant error in ledger");
        }
        Err(err)
    }
}

fn require(tenant: &Tenant, path: &Path, artifact: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(FleetError::MissingArtifact {
            tenant: tenant.id.to_string(),
            artifact: artifact.to_string(),
            path: path.to_path_buf(),
        })
    }
}
