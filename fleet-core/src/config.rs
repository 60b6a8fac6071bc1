//! Configuration management.

use crate::error::{FleetError, Result};
use crate::paths;
use crate::types::TenantLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent configuration for fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for tenant units (one subdirectory per tenant).
    pub tenants_dir: PathBuf,
    /// Status ledger file.
    pub ledger_path: PathBuf,
    /// Directory archives are written to and listed from.
    pub backup_dir: PathBuf,
    /// Edge proxy certificate store.
    pub cert_store_dir: PathBuf,
    /// Edge proxy stack directory (holds its stack descriptor).
    pub edge_proxy_dir: PathBuf,
    /// Compose project name of the edge proxy.
    pub edge_proxy_project: String,
    /// Environment descriptor file name inside a tenant root.
    pub env_file: String,
    /// Stack descriptor file name inside a tenant root.
    pub stack_file: String,
    /// Deploy entry point file name inside a tenant root.
    pub deploy_entry: String,
    /// Secrets directory name inside a tenant root.
    pub secrets_dir: String,
    /// Reserved directory name that is never a tenant.
    pub template_name: String,
    /// Archives older than this many days are pruned by cleanup.
    pub retention_days: u32,
    /// Deadline applied to each runtime call and archive stream.
    pub operation_timeout_secs: Option<u64>,
    /// Container runtime CLI.
    pub docker_binary: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenants_dir: paths::tenants_dir(),
            ledger_path: paths::ledger_path(),
            backup_dir: paths::backup_dir(),
            cert_store_dir: paths::cert_store_dir(),
            edge_proxy_dir: paths::edge_proxy_dir(),
            edge_proxy_project: "traefik".to_string(),
            env_file: ".env".to_string(),
            stack_file: "docker-compose.yml".to_string(),
            deploy_entry: "deploy.sh".to_string(),
            secrets_dir: "secrets".to_string(),
            template_name: ".template".to_string(),
            retention_days: 30,
            operation_timeout_secs: None,
            docker_binary: "docker".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(paths::config_path())
    }

    /// Load configuration from disk. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| FleetError::InvalidConfig {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| FleetError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FleetError::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| FleetError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| FleetError::io(path, e))
    }

    /// Reject settings that would make every operation fail later.
    pub fn validate(&self) -> Result<()> {
        if self.retention_days == 0 {
            return Err(FleetError::InvalidConfig {
                reason: "retention_days must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("env_file", &self.env_file),
            ("stack_file", &self.stack_file),
            ("deploy_entry", &self.deploy_entry),
            ("edge_proxy_project", &self.edge_proxy_project),
            ("docker_binary", &self.docker_binary),
        ] {
            if value.trim().is_empty() {
                return Err(FleetError::InvalidConfig { reason: format!("{} must not be empty", field) });
            }
        }
        if self.operation_timeout_secs == Some(0) {
            return Err(FleetError::InvalidConfig {
                reason: "operation_timeout_secs must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// File names that make up a tenant unit.
    pub fn layout(&self) -> TenantLayout {
        TenantLayout {
            env_file: self.env_file.clone(),
            stack_file: self.stack_file.clone(),
            deploy_entry: self.deploy_entry.clone(),
            secrets_dir: self.secrets_dir.clone(),
            template_name: self.template_name.clone(),
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.template_name, ".template");
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "retention_days": 14, "deploy_entry": "up.sh" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.layout().deploy_entry, "up.sh");
        assert_eq!(config.stack_file, "docker-compose.yml");

        config.save(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.retention_days, 14);
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let config = Config { retention_days: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(FleetError::InvalidConfig { .. })));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(FleetError::InvalidConfig { .. })));
    }
}
