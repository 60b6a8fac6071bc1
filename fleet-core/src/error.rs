//! Error types for fleet.
//!
//! Variants are grouped by the component that raises them. Precondition
//! variants are returned before any side effect is attempted.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Main error type for fleet.
#[derive(Error, Debug)]
pub enum FleetError {
    // Precondition errors (fail fast, no side effect attempted)
    #[error("Missing {artifact} for tenant {tenant}: {path:?}")]
    MissingArtifact { tenant: String, artifact: String, path: PathBuf },

    #[error("Environment descriptor for tenant {tenant} could not be loaded from {path:?}: {reason}")]
    EnvMissing { tenant: String, path: PathBuf, reason: String },

    #[error("Invalid tenant identifier: {id:?}")]
    InvalidTenantId { id: String },

    #[error("Tenant root {path:?} is unreadable: {source}")]
    RegistryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Runtime adapter errors
    #[error("Container runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    #[error("Not found: {name}")]
    NotFound { name: String },

    #[error("{operation} failed: {reason}")]
    RuntimeFailed { operation: String, reason: String },

    // Ledger errors
    #[error("Failed to write status ledger {path:?}: {reason}")]
    LedgerWriteError { path: PathBuf, reason: String },

    #[error("Failed to read status ledger {path:?}: {reason}")]
    LedgerReadError { path: PathBuf, reason: String },

    // Backup errors
    #[error("Unknown archive type: {file}")]
    UnknownArchiveType { file: String },

    #[error("Certificate store not found at {path:?}")]
    CertStoreMissing { path: PathBuf },

    #[error("Container {container} is not running")]
    ContainerNotRunning { container: String },

    #[error("Archive not found: {path:?}")]
    ArchiveMissing { path: PathBuf },

    #[error("Rollback sidecar already exists at {path:?}; resolve it before restoring")]
    SidecarExists { path: PathBuf },

    #[error("{cause}; previous store could not be reinstated and remains at {sidecar:?}: {source}")]
    RollbackFailed {
        sidecar: PathBuf,
        cause: String,
        #[source]
        source: std::io::Error,
    },

    // Caller-initiated abort or deadline expiry
    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FleetError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError { path: path.into(), source }
    }

    /// Short reason recorded in the ledger's last-action column.
    pub fn reason(&self) -> String {
        match self {
            Self::MissingArtifact { artifact, .. } => format!("Missing {}", artifact),
            Self::RuntimeUnavailable { reason } => format!("Runtime unavailable: {}", reason),
            Self::NotFound { name } => format!("Not found: {}", name),
            Self::RuntimeFailed { reason, .. } => reason.clone(),
            Self::Cancelled => "Cancelled".to_string(),
            other => other.to_string(),
        }
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingArtifact { .. } | Self::EnvMissing { .. } => "precondition",
            Self::InvalidTenantId { .. } | Self::RegistryUnreadable { .. } => "registry",
            Self::RuntimeUnavailable { .. } => "runtime_unavailable",
            Self::NotFound { .. } => "not_found",
            Self::RuntimeFailed { .. } => "runtime_failed",
            Self::LedgerWriteError { .. } | Self::LedgerReadError { .. } => "ledger",
            Self::UnknownArchiveType { .. } => "unknown_archive_type",
            Self::CertStoreMissing { .. } => "cert_store_missing",
            Self::ContainerNotRunning { .. } => "container_not_running",
            Self::ArchiveMissing { .. } | Self::SidecarExists { .. } => "archive",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::Cancelled => "cancelled",
            Self::InvalidConfig { .. } => "config",
            Self::IoError { .. } => "io",
            Self::Internal(_) | Self::Other(_) => "internal",
        }
    }
}
