//! Tenant discovery.
//!
//! A directory directly under the tenant root qualifies as a tenant when its
//! name is a valid identifier, it is not the reserved template directory, and
//! it holds both an environment descriptor and a stack descriptor. Anything
//! else is skipped without error.
//!
//! The registry keeps no cache: every [`TenantRegistry::discover`] call scans
//! the disk again. Results are ordered by identifier, so two scans of an
//! unchanged root yield the same order and numbered menu selections stay put.
//!
//! Project names are lowercase, so identifiers that differ only in case would
//! share one runtime stack. All members of such a group are skipped.

pub mod descriptor;

pub use descriptor::TenantEnv;

use crate::config::Config;
use crate::error::{FleetError, Result};
use crate::naming;
use crate::types::{Tenant, TenantId, TenantLayout};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Discovers tenant units on disk.
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    root: PathBuf,
    layout: TenantLayout,
}

impl TenantRegistry {
    /// Create a registry over `root` using the given file layout.
    pub fn new(root: impl Into<PathBuf>, layout: TenantLayout) -> Self {
        Self { root: root.into(), layout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tenants_dir.clone(), config.layout())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &TenantLayout {
        &self.layout
    }

    /// Scan the tenant root one level deep.
    ///
    /// Fails only when the root itself cannot be read.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn discover(&self) -> Result<Vec<Tenant>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| FleetError::RegistryUnreadable { path: self.root.clone(), source: e })?;

        let mut tenants = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under tenant root: {}", e);
                    continue;
                }
            };
            if let Some(tenant) = self.qualify(&entry.path()) {
                tenants.push(tenant);
            }
        }

        let mut projects: HashMap<String, usize> = HashMap::new();
        for tenant in &tenants {
            *projects.entry(naming::project_name(&tenant.id)).or_default() += 1;
        }
        tenants.retain(|tenant| {
            let project = naming::project_name(&tenant.id);
            let unique = projects.get(&project).copied().unwrap_or(0) == 1;
            if !unique {
                warn!(tenant = %tenant.id, project = %project, "Skipping tenant whose project name collides with another tenant");
            }
            unique
        });

        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(count = tenants.len(), "Tenant discovery complete");
        Ok(tenants)
    }

    /// Resolve one tenant by identifier from a fresh scan.
    pub fn find(&self, id: &str) -> Result<Tenant> {
        let id = TenantId::parse(id)?;
        self.discover()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| FleetError::NotFound { name: format!("tenant {}", id) })
    }

    fn qualify(&self, path: &Path) -> Option<Tenant> {
        if !path.is_dir() {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        if name == self.layout.template_name {
            return None;
        }
        let id = match TenantId::parse(name) {
            Ok(id) => id,
            Err(_) => {
                debug!(dir = %path.display(), "Skipping directory with invalid tenant name");
                return None;
            }
        };

        let mut tenant = Tenant::new(id, path, &self.layout);
        if !tenant.env_file.is_file() || !tenant.stack_file.is_file() {
            debug!(tenant = %tenant.id, "Skipping directory without both descriptors");
            return None;
        }

        match TenantEnv::load(&tenant.env_file) {
            Ok(env) => {
                tenant.domain = env.domain().map(str::to_string);
                tenant.app_port = env.app_port();
                tenant.app_image = env.app_image().map(str::to_string);
            }
            Err(e) => warn!(tenant = %tenant.id, "Environment descriptor unreadable: {}", e),
        }

        Some(tenant)
    }
}
