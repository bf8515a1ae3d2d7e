//! Domain vocabulary shared by every layer: units, roles, positions, users and records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Username of the distinguished root account.
pub const ROOT_USERNAME: &str = "admin";

// ── Scope ──────────────────────────────────────────────────────

/// Organisational unit a record belongs to. "All" is a grant, never a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    UnitA,
    UnitB,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::UnitA, Scope::UnitB];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::UnitA => "UnitA",
            Scope::UnitB => "UnitB",
        }
    }

    /// Lenient parse used at request boundaries.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNITA" => Some(Scope::UnitA),
            "UNITB" => Some(Scope::UnitB),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::parse(s).ok_or_else(|| TallyError::InvalidValue(format!("unknown scope '{s}'")))
    }
}

/// Which units a user may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeGrant {
    UnitA,
    UnitB,
    All,
}

impl ScopeGrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeGrant::UnitA => "UnitA",
            ScopeGrant::UnitB => "UnitB",
            ScopeGrant::All => "All",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNITA" => Some(ScopeGrant::UnitA),
            "UNITB" => Some(ScopeGrant::UnitB),
            "ALL" => Some(ScopeGrant::All),
            _ => None,
        }
    }

    /// The single unit this grant pins a user to, if any.
    pub fn fixed_scope(&self) -> Option<Scope> {
        match self {
            ScopeGrant::UnitA => Some(Scope::UnitA),
            ScopeGrant::UnitB => Some(Scope::UnitB),
            ScopeGrant::All => None,
        }
    }
}

impl From<Scope> for ScopeGrant {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::UnitA => ScopeGrant::UnitA,
            Scope::UnitB => ScopeGrant::UnitB,
        }
    }
}

impl fmt::Display for ScopeGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Role ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Accepts the legacy alias "user" for viewers.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "viewer" | "user" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| {
            TallyError::InvalidValue(format!("unknown role '{s}' (admin, editor, viewer)"))
        })
    }
}

// ── Position ───────────────────────────────────────────────────

/// Personnel category; decides which counters are active on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Intern,
    Officer,
    ReserveOfficer,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Intern => "Intern",
            Position::Officer => "Officer",
            Position::ReserveOfficer => "ReserveOfficer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Intern" => Some(Position::Intern),
            "Officer" => Some(Position::Officer),
            "ReserveOfficer" => Some(Position::ReserveOfficer),
            _ => None,
        }
    }

    /// Table ordering: officers first, interns last.
    pub fn display_rank(&self) -> u8 {
        match self {
            Position::Officer => 1,
            Position::ReserveOfficer => 2,
            Position::Intern => 3,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Users ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Opaque credential, compared by exact match.
    pub password: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
}

impl User {
    pub fn is_root(&self) -> bool {
        self.username == ROOT_USERNAME
    }
}

/// Account row to insert; role/grant already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
}

/// What the admin screen shows for an account. Credentials never leave the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        let scope_grant = if user.role == Role::Admin {
            ScopeGrant::All
        } else {
            user.scope_grant
        };
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            scope_grant,
        }
    }
}

// ── Records ────────────────────────────────────────────────────

/// Raw numeric inputs of a record. All values are non-negative after sanitisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub traffic_count: i64,
    pub sentence_1to5: i64,
    pub sentence_6plus: i64,
    pub supervision_1to5: i64,
    pub supervision_6plus: i64,
    pub error_count: i64,
}

/// Values recomputed on every mutation; never written directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub supervision_total: i64,
    pub case_total: i64,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: i64,
    pub scope: Scope,
    pub position: Position,
    pub name: String,
    #[serde(flatten)]
    pub counters: Counters,
    #[serde(flatten)]
    pub derived: DerivedFields,
    pub created_at: DateTime<Utc>,
}

/// A record that has been sanitised and derived but not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub scope: Scope,
    pub position: Position,
    pub name: String,
    pub counters: Counters,
    pub derived: DerivedFields,
    pub created_at: DateTime<Utc>,
}
