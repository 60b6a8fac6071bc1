//! Tenant domain types.

use crate::error::{FleetError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static TENANT_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9_-]{0,62}[a-zA-Z0-9])?$").expect("valid tenant id regex")
});

/// Validated tenant identifier.
///
/// 1-64 characters after trimming surrounding whitespace; alphanumeric at both
/// ends with `_` and `-` allowed in between.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse and normalize an identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim();
        if TENANT_ID_RE.is_match(normalized) {
            Ok(Self(normalized.to_string()))
        } else {
            Err(FleetError::InvalidTenantId { id: raw.to_string() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = FleetError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// File names that make up a tenant unit on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantLayout {
    pub env_file: String,
    pub stack_file: String,
    pub deploy_entry: String,
    pub secrets_dir: String,
    pub template_name: String,
}

impl Default for TenantLayout {
    fn default() -> Self {
        Self {
            env_file: ".env".to_string(),
            stack_file: "docker-compose.yml".to_string(),
            deploy_entry: "deploy.sh".to_string(),
            secrets_dir: "secrets".to_string(),
            template_name: ".template".to_string(),
        }
    }
}

/// A named unit of deployment discovered under the tenant root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    pub root: PathBuf,
    pub env_file: PathBuf,
    pub stack_file: PathBuf,
    pub deploy_entry: PathBuf,
    pub secrets_dir: PathBuf,

    /// Declared in the environment descriptor, when it could be read.
    pub domain: Option<String>,
    pub app_port: Option<u16>,
    pub app_image: Option<String>,
}

impl Tenant {
    /// Build a tenant rooted at `root` with paths resolved from `layout`.
    pub fn new(id: TenantId, root: impl Into<PathBuf>, layout: &TenantLayout) -> Self {
        let root = root.into();
        Self {
            env_file: root.join(&layout.env_file),
            stack_file: root.join(&layout.stack_file),
            deploy_entry: root.join(&layout.deploy_entry),
            secrets_dir: root.join(&layout.secrets_dir),
            id,
            root,
            domain: None,
            app_port: None,
            app_image: None,
        }
    }

    /// Human-friendly label: the declared domain, else the identifier.
    pub fn label(&self) -> &str {
        self.domain.as_deref().unwrap_or(self.id.as_str())
    }

    /// Path of a per-tenant secret file.
    pub fn secret_path(&self, name: &str) -> PathBuf {
        self.secrets_dir.join(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
