use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::PrincipalId;

/// Permission suffix granting every level below a permission base
pub const FULL_ACCESS: &str = "full";

/// Answers authorization questions for the current request
pub trait Authorizer {
    /// Whether the current principal holds `permission`
    fn is_granted(&self, permission: &str) -> bool;

    /// The authenticated principal, if any
    fn current_principal(&self) -> Option<PrincipalId>;
}

/// Security context containing the subject and the permissions it was granted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Subject ID for authorization (if authenticated)
    pub subject_id: Option<PrincipalId>,
    /// Granted permissions, e.g. `notification:notifications:viewother`
    pub permissions: AHashSet<String>,
    /// Administrators are granted everything
    pub admin: bool,
}

impl SecurityContext {
    /// Create a new security context without authentication (anonymous)
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create a security context with a subject ID and no permissions
    pub fn with_subject(subject_id: PrincipalId) -> Self {
        Self {
            subject_id: Some(subject_id),
            ..Self::default()
        }
    }

    /// Create an administrator context
    pub fn admin(subject_id: PrincipalId) -> Self {
        Self {
            subject_id: Some(subject_id),
            admin: true,
            ..Self::default()
        }
    }

    pub fn grant(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }
}

impl Authorizer for SecurityContext {
    fn is_granted(&self, permission: &str) -> bool {
        if self.admin {
            return true;
        }
        if self.permissions.contains(permission) {
            return true;
        }

        // `base:level` is also satisfied by `base:full`
        match permission.rsplit_once(':') {
            Some((base, _)) => self.permissions.contains(&format!("{}:{}", base, FULL_ACCESS)),
            None => false,
        }
    }

    fn current_principal(&self) -> Option<PrincipalId> {
        self.subject_id
    }
}
