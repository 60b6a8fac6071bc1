//! Environment descriptor (`.env`) parsing.
//!
//! Accepts `KEY=VALUE` lines, `#` comments, an optional `export ` prefix and
//! single- or double-quoted values.

use crate::error::{FleetError, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub const KEY_TENANT_ID: &str = "TENANT_ID";
pub const KEY_DOMAIN: &str = "DOMAIN";
pub const KEY_APP_IMAGE: &str = "APP_IMAGE";
pub const KEY_APP_PORT: &str = "APP_PORT";
pub const KEY_DB_NAME: &str = "DB_NAME";
pub const KEY_DB_USER: &str = "DB_USER";
pub const KEY_DB_PASSWORD: &str = "DB_PASSWORD";

/// Parsed environment descriptor of a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantEnv {
    values: BTreeMap<String, String>,
}

impl TenantEnv {
    /// Load and parse a descriptor file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| FleetError::io(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Parse descriptor content. Malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut values = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                continue;
            }
            values.insert(key.to_string(), unquote(value.trim()));
        }

        Self { values }
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.get(KEY_TENANT_ID)
    }

    pub fn domain(&self) -> Option<&str> {
        self.get(KEY_DOMAIN)
    }

    pub fn app_image(&self) -> Option<&str> {
        self.get(KEY_APP_IMAGE)
    }

    pub fn app_port(&self) -> Option<u16> {
        self.get(KEY_APP_PORT).and_then(|p| p.parse().ok())
    }

    pub fn db_name(&self) -> Option<&str> {
        self.get(KEY_DB_NAME)
    }

    pub fn db_user(&self) -> Option<&str> {
        self.get(KEY_DB_USER)
    }

    pub fn db_password(&self) -> Option<&str> {
        self.get(KEY_DB_PASSWORD)
    }
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        let Some(rest) = value.strip_prefix(quote) else {
            continue;
        };
        if let Some(end) = rest.find(quote) {
            let trailing = rest[end + 1..].trim_start();
            if trailing.is_empty() || trailing.starts_with('#') {
                return rest[..end].to_string();
            }
        }
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}
