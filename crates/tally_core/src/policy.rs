//! Authorization policy: role × capability matrix and effective-scope resolution.
//!
//! | Capability          | admin | editor | viewer |
//! |---------------------|-------|--------|--------|
//! | ViewStatistics      | yes   | yes    | yes    |
//! | ViewRecords         | yes   | yes    | no     |
//! | EditRecords         | yes   | yes    | no     |
//! | ViewAuditLog        | yes   | no     | no     |
//! | Administer          | yes   | no     | no     |

use serde::Serialize;

use crate::types::{Role, Scope, ScopeGrant};

/// The default unit when neither the request nor the session names one.
pub const DEFAULT_SCOPE: Scope = Scope::UnitA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Leaderboard and monthly statistics.
    ViewStatistics,
    /// The editable record table.
    ViewRecords,
    /// Create, inline-edit, delete and scope-wide score resets.
    EditRecords,
    ViewAuditLog,
    /// Users, settings and data wipes.
    Administer,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ViewStatistics,
        Capability::ViewRecords,
        Capability::EditRecords,
        Capability::ViewAuditLog,
        Capability::Administer,
    ];
}

impl Role {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewStatistics => true,
            Capability::ViewRecords | Capability::EditRecords => {
                matches!(self, Role::Admin | Role::Editor)
            }
            Capability::ViewAuditLog | Capability::Administer => *self == Role::Admin,
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }
}

/// Reconcile a requested scope with what the caller is allowed to see.
///
/// Admins and holders of an `All` grant get the requested scope, falling back
/// to the prior session scope and then [`DEFAULT_SCOPE`]. Everyone else is
/// pinned to their granted unit; a differing request is overridden, not
/// rejected.
pub fn resolve_scope(
    role: Role,
    grant: ScopeGrant,
    requested: Option<Scope>,
    prior: Option<Scope>,
) -> Scope {
    if role == Role::Admin || grant == ScopeGrant::All {
        return requested.or(prior).unwrap_or(DEFAULT_SCOPE);
    }
    grant.fixed_scope().unwrap_or(DEFAULT_SCOPE)
}

/// Scope filter for cross-unit reads (statistics, leaderboard).
///
/// `None` means both units and is only ever returned to callers that see all.
pub fn resolve_read_filter(role: Role, grant: ScopeGrant, requested: Option<Scope>) -> Option<Scope> {
    if role == Role::Admin || grant == ScopeGrant::All {
        return requested;
    }
    Some(grant.fixed_scope().unwrap_or(DEFAULT_SCOPE))
}
