//! Container and project naming convention.
//!
//! Every component resolves runtime names through here; nothing else
//! interpolates `{tenant}-web` or `{tenant}-db` by hand.

use crate::types::TenantId;

/// Application container of a tenant stack.
pub fn web_container(id: &TenantId) -> String {
    format!("{}-web", id)
}

/// Database container of a tenant stack.
pub fn db_container(id: &TenantId) -> String {
    format!("{}-db", id)
}

/// Compose project name of a tenant stack.
pub fn project_name(id: &TenantId) -> String {
    id.as_str().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_convention() {
        let id = TenantId::parse("Acme").unwrap();
        assert_eq!(web_container(&id), "Acme-web");
        assert_eq!(db_container(&id), "Acme-db");
        assert_eq!(project_name(&id), "acme");
    }
}
