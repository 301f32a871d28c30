//! Authenticated principal and owner-or-admin authorization.
//!
//! The request gate attaches a `Principal` after validating a bearer token;
//! handlers consult `authorize_owner_or_admin` before mutating owned
//! resources.

use crate::api::error::ApiError;

/// Permission level, ranked `User < Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Role name as stored in the `roles` table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// Authenticated caller context derived from a bearer token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

impl Principal {
    /// Returns `true` when any held role satisfies `required`.
    #[must_use]
    pub fn satisfies(&self, required: Role) -> bool {
        self.roles.iter().any(|role| *role >= required)
    }

    /// Returns `true` when the caller holds ADMIN or higher.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.satisfies(Role::Admin)
    }
}

/// Passes iff the caller owns the resource or holds an elevated role.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` for a non-owner without ADMIN.
pub fn authorize_owner_or_admin(owner_id: i64, caller: &Principal) -> Result<(), ApiError> {
    if caller.id == owner_id || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: i64, roles: Vec<Role>) -> Principal {
        Principal {
            id,
            username: format!("user-{id}"),
            roles,
        }
    }

    #[test]
    fn owner_passes() {
        let caller = principal(7, vec![Role::User]);
        assert!(authorize_owner_or_admin(7, &caller).is_ok());
    }

    #[test]
    fn non_owner_without_admin_is_forbidden() {
        let caller = principal(7, vec![Role::User]);
        let result = authorize_owner_or_admin(8, &caller);
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[test]
    fn non_owner_admin_passes() {
        let caller = principal(7, vec![Role::User, Role::Admin]);
        assert!(authorize_owner_or_admin(8, &caller).is_ok());
    }

    #[test]
    fn super_admin_outranks_admin() {
        let caller = principal(7, vec![Role::SuperAdmin]);
        assert!(caller.satisfies(Role::Admin));
        assert!(caller.satisfies(Role::User));
        assert!(authorize_owner_or_admin(8, &caller).is_ok());
    }

    #[test]
    fn user_does_not_satisfy_admin() {
        let caller = principal(7, vec![Role::User]);
        assert!(caller.satisfies(Role::User));
        assert!(!caller.satisfies(Role::Admin));
        assert!(!caller.satisfies(Role::SuperAdmin));
    }

    #[test]
    fn role_names_round_trip() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::from_name(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_name("OPERATOR"), None);
    }
}
