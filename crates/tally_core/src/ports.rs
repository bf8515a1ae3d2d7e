//! Storage port traits.
//! Implemented by tally_postgres and by [`crate::memory::MemoryStores`]; the
//! service depends only on these traits.
//!
//! Every mutating method takes the [`AuditDraft`] that accompanies the change
//! and must commit both or neither.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::audit::{AuditDraft, LogPage};
use crate::error::TallyError;
use crate::stats::LeaderboardEntry;
use crate::types::{NewRecord, NewUser, Record, Role, Scope, ScopeGrant, User};

pub type Result<T> = std::result::Result<T, TallyError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    /// All accounts ordered by id.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fails with `Conflict` when the username is taken.
    async fn insert_user(&self, user: &NewUser, audit: AuditDraft) -> Result<User>;

    /// Fails with `NotFound` when the account is gone.
    async fn update_user_access(
        &self,
        user_id: i64,
        role: Role,
        scope_grant: ScopeGrant,
        audit: AuditDraft,
    ) -> Result<()>;

    async fn delete_user(&self, user_id: i64, audit: AuditDraft) -> Result<()>;

    /// Create the root account if missing and force it back to admin / All.
    async fn ensure_root(&self, username: &str, password: &str) -> Result<()>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert and return the stored row. The audit entry is linked to the new id.
    async fn insert_record(&self, record: &NewRecord, audit: AuditDraft) -> Result<Record>;

    async fn get_record(&self, record_id: i64) -> Result<Option<Record>>;

    /// Officer, ReserveOfficer, Intern, then score descending, then id.
    async fn list_records(&self, scope: Scope) -> Result<Vec<Record>>;

    /// Overwrite position, name, counters and derived fields where id and scope
    /// both match. `NotFound` when no row matched.
    async fn update_record(&self, record: &Record, audit: AuditDraft) -> Result<()>;

    async fn delete_record(&self, record_id: i64, scope: Scope, audit: AuditDraft) -> Result<()>;

    /// Zero counters and derived fields for every record in `scope`. Returns the row count.
    async fn reset_scores(&self, scope: Scope, audit: AuditDraft) -> Result<u64>;

    /// Delete every record in `scopes` and the log entries that reference them,
    /// then append `audit`. Returns the number of records removed.
    async fn purge_records(&self, scopes: &[Scope], audit: AuditDraft) -> Result<u64>;

    /// Sparse `(month, sum of case_total)` pairs for `year`.
    async fn monthly_case_totals(&self, year: i32, scope: Option<Scope>) -> Result<Vec<(u32, i64)>>;

    async fn top_scorers(&self, scope: Option<Scope>, limit: u32) -> Result<Vec<LeaderboardEntry>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Newest first. `page` is already clamped to at least 1.
    async fn log_page(&self, page: u32, page_size: u32) -> Result<LogPage>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, keys: &[String]) -> Result<HashMap<String, String>>;

    /// Upsert every pair.
    async fn put_settings(&self, entries: &[(String, String)], audit: AuditDraft) -> Result<()>;

    /// Insert pairs whose key is absent; existing values are left alone.
    async fn seed_settings(&self, entries: &[(String, String)]) -> Result<()>;
}
