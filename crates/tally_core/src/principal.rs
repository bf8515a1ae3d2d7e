use crate::error::TallyError;
use crate::policy::{self, Capability};
use crate::types::{Role, Scope, ScopeGrant, User, ROOT_USERNAME};

/// The caller of a core operation, rebuilt from the durable user row on every request.
///
/// There is no cached or thread-local identity anywhere in the core; every
/// service method takes `&Principal` explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
}

impl Principal {
    /// Root and admin accounts always resolve to admin with an `All` grant.
    pub fn from_user(user: &User) -> Self {
        if user.is_root() || user.role == Role::Admin {
            return Self {
                username: user.username.clone(),
                role: Role::Admin,
                scope_grant: ScopeGrant::All,
            };
        }
        Self {
            username: user.username.clone(),
            role: user.role,
            scope_grant: user.scope_grant,
        }
    }

    /// Construct explicitly for in-process callers and tests.
    pub fn in_process(username: impl Into<String>, role: Role, scope_grant: ScopeGrant) -> Self {
        Self {
            username: username.into(),
            role,
            scope_grant,
        }
    }

    pub fn is_root(&self) -> bool {
        self.username == ROOT_USERNAME && self.role == Role::Admin
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), TallyError> {
        if self.can(capability) {
            Ok(())
        } else {
            tracing::warn!(
                user = %self.username,
                role = %self.role,
                ?capability,
                "capability check failed"
            );
            Err(TallyError::PermissionDenied(format!(
                "{} ({}) may not {:?}",
                self.username, self.role, capability
            )))
        }
    }

    pub fn require_root(&self) -> Result<(), TallyError> {
        if self.is_root() {
            Ok(())
        } else {
            Err(TallyError::PermissionDenied(
                "only the root admin may wipe data".into(),
            ))
        }
    }

    pub fn effective_scope(&self, requested: Option<Scope>, prior: Option<Scope>) -> Scope {
        policy::resolve_scope(self.role, self.scope_grant, requested, prior)
    }

    pub fn read_filter(&self, requested: Option<Scope>) -> Option<Scope> {
        policy::resolve_read_filter(self.role, self.scope_grant, requested)
    }
}
