use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::UserId;

/// Scope used for hierarchy permission grants in the host's role store.
pub const HIERARCHY_ROLE_SCOPE: &str = "hierarchy";

/// Global scope id that applies across all districts for the hierarchy scope.
pub const HIERARCHY_ROLE_SCOPE_ID_GLOBAL: &str = "global";

/// Full administrative control over role mutations.
pub const HIERARCHY_ROLE_ADMIN: &str = "hierarchy_admin";
/// District supervisors may mutate roles within their district grants.
pub const HIERARCHY_ROLE_DISTRICT_SUPERVISOR: &str = "hierarchy_district_supervisor";
/// Can read hierarchy listings and history.
pub const HIERARCHY_ROLE_READ: &str = "hierarchy_read";

pub const ALL_HIERARCHY_PERMISSION_ROLES: &[&str] = &[
    HIERARCHY_ROLE_ADMIN,
    HIERARCHY_ROLE_DISTRICT_SUPERVISOR,
    HIERARCHY_ROLE_READ,
];

/// Roles accepted for the mutation endpoints (promote/demote/replace/remove/
/// transfer).
pub const ROLE_MUTATION_ACCESS_ROLES: &[&str] = &[
    HIERARCHY_ROLE_ADMIN,
    HIERARCHY_ROLE_DISTRICT_SUPERVISOR,
];

pub const fn hierarchy_role_scope() -> &'static str {
    HIERARCHY_ROLE_SCOPE
}

pub const fn role_mutation_access_roles() -> &'static [&'static str] {
    ROLE_MUTATION_ACCESS_ROLES
}

/// District-scoped grants are stored with `scope_id = district_code`.
pub fn hierarchy_role_scope_id_for_district(district_code: &str) -> String {
    district_code.to_string()
}

pub fn is_hierarchy_permission_role(role_name: &str) -> bool {
    ALL_HIERARCHY_PERMISSION_ROLES
        .iter()
        .any(|known| *known == role_name)
}

/// Validated acting user, built by the host's auth middleware and injected
/// into request extensions. Never constructed from request bodies.
#[derive(Debug, Clone)]
pub struct ActingUser {
    id: UserId,
    granted_roles: Vec<String>,
}

impl ActingUser {
    pub fn new(id: UserId, granted_roles: Vec<String>) -> Self {
        Self { id, granted_roles }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn granted_roles(&self) -> &[String] {
        &self.granted_roles
    }

    pub fn holds_any(&self, roles: &[&str]) -> bool {
        self.granted_roles
            .iter()
            .any(|granted| roles.iter().any(|role| role == granted))
    }

    pub fn can_mutate_roles(&self) -> bool {
        self.holds_any(ROLE_MUTATION_ACCESS_ROLES)
    }
}

pub fn ensure_can_mutate_roles(actor: &ActingUser) -> Result<()> {
    if actor.can_mutate_roles() {
        Ok(())
    } else {
        Err(LibError::forbidden(
            "You do not have permission to manage leadership roles",
            anyhow!(
                "user {} holds none of {:?}",
                actor.id(),
                ROLE_MUTATION_ACCESS_ROLES
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn mutation_requires_an_elevated_grant() {
        let reader = ActingUser::new(
            UserId(Uuid::new_v4()),
            vec![HIERARCHY_ROLE_READ.to_string()],
        );
        assert!(!reader.can_mutate_roles());
        assert!(ensure_can_mutate_roles(&reader).is_err());

        let supervisor = ActingUser::new(
            UserId(Uuid::new_v4()),
            vec![HIERARCHY_ROLE_DISTRICT_SUPERVISOR.to_string()],
        );
        assert!(supervisor.can_mutate_roles());
        assert!(ensure_can_mutate_roles(&supervisor).is_ok());
    }

    #[test]
    fn known_roles_are_recognized() {
        for role in ALL_HIERARCHY_PERMISSION_ROLES {
            assert!(is_hierarchy_permission_role(role));
        }
        assert!(!is_hierarchy_permission_role("hierarchy_superuser"));
    }
}
