//! In-memory implementation of every storage port.
//!
//! Backs the server when no database is configured and drives the service
//! tests. One `RwLock` guards all tables, so each method is trivially atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Datelike;

use crate::audit::{page_offset, total_pages, AuditDraft, LogEntry, LogPage};
use crate::error::TallyError;
use crate::ports::{AuditStore, RecordStore, Result, SettingsStore, UserStore};
use crate::stats::{rank_scorers, LeaderboardEntry};
use crate::types::{
    Counters, DerivedFields, NewRecord, NewUser, Record, Role, Scope, ScopeGrant, User,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    records: BTreeMap<i64, Record>,
    logs: Vec<LogEntry>,
    settings: HashMap<String, String>,
    next_user_id: i64,
    next_record_id: i64,
    next_log_id: i64,
}

impl MemoryState {
    fn append_log(&mut self, draft: AuditDraft) {
        self.next_log_id += 1;
        let time = draft.time_text();
        self.logs.push(LogEntry {
            id: self.next_log_id,
            action: draft.action.as_str().to_string(),
            record_id: draft.record_id,
            actor: draft.actor,
            time,
            details: draft.details,
        });
    }

    fn insert_user(&mut self, user: &NewUser) -> User {
        self.next_user_id += 1;
        let row = User {
            id: self.next_user_id,
            username: user.username.clone(),
            password: user.password.clone(),
            role: user.role,
            scope_grant: user.scope_grant,
        };
        self.users.insert(row.id, row.clone());
        row
    }
}

#[derive(Debug, Default)]
pub struct MemoryStores {
    inner: RwLock<MemoryState>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every log entry, oldest first. For assertions in tests.
    pub fn all_logs(&self) -> Result<Vec<LogEntry>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(state.logs.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStores {
    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(state.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: &NewUser, audit: AuditDraft) -> Result<User> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(TallyError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        let row = state.insert_user(user);
        state.append_log(audit);
        Ok(row)
    }

    async fn update_user_access(
        &self,
        user_id: i64,
        role: Role,
        scope_grant: ScopeGrant,
        audit: AuditDraft,
    ) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| TallyError::NotFound(format!("user {user_id}")))?;
        user.role = role;
        user.scope_grant = scope_grant;
        state.append_log(audit);
        Ok(())
    }

    async fn delete_user(&self, user_id: i64, audit: AuditDraft) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        if state.users.remove(&user_id).is_none() {
            return Err(TallyError::NotFound(format!("user {user_id}")));
        }
        state.append_log(audit);
        Ok(())
    }

    async fn ensure_root(&self, username: &str, password: &str) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        if let Some(root) = state.users.values_mut().find(|u| u.username == username) {
            root.role = Role::Admin;
            root.scope_grant = ScopeGrant::All;
            return Ok(());
        }
        state.insert_user(&NewUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            scope_grant: ScopeGrant::All,
        });
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStores {
    async fn insert_record(&self, record: &NewRecord, audit: AuditDraft) -> Result<Record> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        state.next_record_id += 1;
        let row = Record {
            id: state.next_record_id,
            scope: record.scope,
            position: record.position,
            name: record.name.clone(),
            counters: record.counters,
            derived: record.derived,
            created_at: record.created_at,
        };
        state.records.insert(row.id, row.clone());
        state.append_log(audit.for_record(row.id));
        Ok(row)
    }

    async fn get_record(&self, record_id: i64) -> Result<Option<Record>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(state.records.get(&record_id).cloned())
    }

    async fn list_records(&self, scope: Scope) -> Result<Vec<Record>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut rows: Vec<Record> = state
            .records
            .values()
            .filter(|r| r.scope == scope)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.position
                .display_rank()
                .cmp(&b.position.display_rank())
                .then_with(|| b.derived.score.cmp(&a.derived.score))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn update_record(&self, record: &Record, audit: AuditDraft) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let row = state
            .records
            .get_mut(&record.id)
            .filter(|r| r.scope == record.scope)
            .ok_or_else(|| TallyError::NotFound(format!("record {}", record.id)))?;
        row.position = record.position;
        row.name = record.name.clone();
        row.counters = record.counters;
        row.derived = record.derived;
        state.append_log(audit);
        Ok(())
    }

    async fn delete_record(&self, record_id: i64, scope: Scope, audit: AuditDraft) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        match state.records.get(&record_id) {
            Some(r) if r.scope == scope => {}
            _ => return Err(TallyError::NotFound(format!("record {record_id}"))),
        }
        state.records.remove(&record_id);
        state.append_log(audit);
        Ok(())
    }

    async fn reset_scores(&self, scope: Scope, audit: AuditDraft) -> Result<u64> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut affected = 0u64;
        for row in state.records.values_mut().filter(|r| r.scope == scope) {
            row.counters = Counters::default();
            row.derived = DerivedFields::default();
            affected += 1;
        }
        state.append_log(audit.with_affected(affected));
        Ok(affected)
    }

    async fn purge_records(&self, scopes: &[Scope], audit: AuditDraft) -> Result<u64> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let doomed: Vec<i64> = state
            .records
            .values()
            .filter(|r| scopes.contains(&r.scope))
            .map(|r| r.id)
            .collect();
        for id in &doomed {
            state.records.remove(id);
        }
        state
            .logs
            .retain(|entry| entry.record_id.map_or(true, |id| !doomed.contains(&id)));
        let affected = doomed.len() as u64;
        state.append_log(audit.with_affected(affected));
        Ok(affected)
    }

    async fn monthly_case_totals(&self, year: i32, scope: Option<Scope>) -> Result<Vec<(u32, i64)>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let mut sums: BTreeMap<u32, i64> = BTreeMap::new();
        for r in state.records.values() {
            if r.created_at.year() != year || scope.is_some_and(|s| s != r.scope) {
                continue;
            }
            *sums.entry(r.created_at.month()).or_default() += r.derived.case_total;
        }
        Ok(sums.into_iter().collect())
    }

    async fn top_scorers(&self, scope: Option<Scope>, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let rows = state
            .records
            .values()
            .filter(|r| scope.map_or(true, |s| s == r.scope))
            .map(|r| (r.name.as_str(), r.derived.score));
        Ok(rank_scorers(rows, limit))
    }
}

#[async_trait]
impl AuditStore for MemoryStores {
    async fn log_page(&self, page: u32, page_size: u32) -> Result<LogPage> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        let total = state.logs.len() as u64;
        let entries = state
            .logs
            .iter()
            .rev()
            .skip(page_offset(page, page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(LogPage {
            entries,
            page,
            page_size,
            total,
            total_pages: total_pages(total, page_size),
        })
    }
}

#[async_trait]
impl SettingsStore for MemoryStores {
    async fn get_settings(&self, keys: &[String]) -> Result<HashMap<String, String>> {
        let state = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(keys
            .iter()
            .filter_map(|k| state.settings.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn put_settings(&self, entries: &[(String, String)], audit: AuditDraft) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        for (key, value) in entries {
            state.settings.insert(key.clone(), value.clone());
        }
        state.append_log(audit);
        Ok(())
    }

    async fn seed_settings(&self, entries: &[(String, String)]) -> Result<()> {
        let mut state = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        for (key, value) in entries {
            state
                .settings
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(())
    }
}
