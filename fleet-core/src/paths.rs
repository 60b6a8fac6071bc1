//! Centralized path configuration for fleet.
//!
//! All default data paths go through this module so the CLI resolves the same
//! locations whether it runs as an operator account or as root.

use std::path::PathBuf;

/// Get the fleet data directory.
///
/// Resolution order:
/// 1. `FLEET_DATA_DIR` environment variable
/// 2. `/var/lib/fleet` if it exists (system install)
/// 3. `~/.fleet` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLEET_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/fleet");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".fleet")).unwrap_or(system_dir)
}

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLEET_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir().map(|c| c.join("fleet")).unwrap_or_else(data_dir)
}

/// Get the default configuration file path.
///
/// `FLEET_CONFIG` points at a specific file and wins over the directory.
pub fn config_path() -> PathBuf {
    if let Ok(file) = std::env::var("FLEET_CONFIG") {
        return PathBuf::from(file);
    }
    config_dir().join("config.json")
}

/// Get the default tenant root directory.
pub fn tenants_dir() -> PathBuf {
    data_dir().join("tenants")
}

/// Get the status ledger path.
pub fn ledger_path() -> PathBuf {
    data_dir().join("status.json")
}

/// Get the archive directory.
pub fn backup_dir() -> PathBuf {
    data_dir().join("backups")
}

/// Get the edge proxy stack directory.
pub fn edge_proxy_dir() -> PathBuf {
    data_dir().join("traefik")
}

/// Get the edge proxy certificate store.
pub fn cert_store_dir() -> PathBuf {
    edge_proxy_dir().join("acme")
}
