//! Core domain types for fleet.

pub mod operation;
pub mod tenant;

// Re-exports
pub use operation::{Action, BulkReport, Outcome, TenantOutcome};
pub use tenant::{Tenant, TenantId, TenantLayout};
