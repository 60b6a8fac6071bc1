//! Deployment operation types and bulk accounting.

use crate::types::TenantId;

/// Lifecycle action applied to a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Deploy,
    Stop,
    Restart,
    Backup,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Backup => "backup",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one per-tenant operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Outcome attributed to a single tenant within a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantOutcome {
    pub tenant: TenantId,
    pub action: Action,
    pub outcome: Outcome,
}

/// Accumulator for bulk operations.
///
/// Discarded after reporting; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<TenantOutcome>,
}

impl BulkReport {
    pub fn record(&mut self, tenant: TenantId, action: Action, outcome: Outcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(TenantOutcome { tenant, action, outcome });
    }

    /// `(succeeded, failed)` pair.
    pub fn counts(&self) -> (usize, usize) {
        (self.succeeded, self.failed)
    }

    pub fn is_full_success(&self) -> bool {
        self.failed == 0
    }
}
