//! LedgerService: record lifecycle, accounts, settings and statistics.
//!
//! Takes port traits via `Arc<dyn PortTrait>` so the same logic runs against
//! Postgres or the in-memory store. Every method takes `&Principal`
//! explicitly and enforces the role × scope policy itself; callers never
//! pre-filter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::Deserialize;

use crate::audit::{clamp_page, AuditAction, AuditDraft, LogPage, LOG_PAGE_SIZE};
use crate::derivation::{derive, CounterInputs};
use crate::edit::{FieldEdit, InlineUpdateOutcome};
use crate::error::TallyError;
use crate::policy::Capability;
use crate::ports::{AuditStore, RecordStore, SettingsStore, UserStore};
use crate::principal::Principal;
use crate::settings::{
    default_stats_title, monthly_title_key, stats_label_key, stats_title_key, ScopeLabels,
    DEFAULT_MONTHLY_TITLE, DEFAULT_STATS_LABEL,
};
use crate::stats::{clamp_limit, fill_months, LeaderboardEntry, MonthlyTotal};
use crate::types::{
    NewRecord, NewUser, Position, Record, Role, Scope, ScopeGrant, UserSummary, ROOT_USERNAME,
};

pub type Result<T> = std::result::Result<T, TallyError>;

/// Password given to the root account the first time it is seeded.
pub const DEFAULT_ROOT_PASSWORD: &str = "admin";

// ── Request shapes ────────────────────────────────────────────

/// A new record as submitted. Position text outside the enum falls back to Intern;
/// the name is trimmed and may be blank.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub counters: CounterInputs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Target of a root-only data wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    Scope(Scope),
    All,
}

impl ResetTarget {
    pub fn scopes(&self) -> Vec<Scope> {
        match self {
            ResetTarget::Scope(s) => vec![*s],
            ResetTarget::All => Scope::ALL.to_vec(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResetTarget::Scope(s) => s.as_str(),
            ResetTarget::All => "ALL",
        }
    }
}

// ── LedgerService trait ───────────────────────────────────────

#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Seed the root account and default labels. Idempotent.
    async fn bootstrap(&self) -> Result<()>;

    /// Exact-match credential check.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Principal>;

    /// Rebuild a principal from the durable user row. `None` when the account is gone.
    async fn load_principal(&self, username: &str) -> Result<Option<Principal>>;

    // records

    async fn list_records(&self, principal: &Principal, scope: Scope) -> Result<Vec<Record>>;

    async fn create_record(
        &self,
        principal: &Principal,
        scope: Scope,
        input: RecordInput,
    ) -> Result<Record>;

    async fn inline_update(
        &self,
        principal: &Principal,
        scope: Scope,
        record_id: i64,
        field: &str,
        value: &str,
    ) -> Result<InlineUpdateOutcome>;

    async fn delete_record(&self, principal: &Principal, scope: Scope, record_id: i64)
        -> Result<()>;

    /// Returns the number of records zeroed.
    async fn reset_scores(&self, principal: &Principal, scope: Scope) -> Result<u64>;

    /// Returns the number of records removed.
    async fn reset_all(&self, principal: &Principal, scope: Scope) -> Result<u64>;

    /// Root only.
    async fn admin_reset_data(&self, principal: &Principal, target: ResetTarget) -> Result<u64>;

    // audit log

    async fn audit_log(&self, principal: &Principal, page: i64) -> Result<LogPage>;

    // statistics

    async fn monthly_totals(
        &self,
        principal: &Principal,
        year: i32,
        scope: Option<Scope>,
    ) -> Result<Vec<MonthlyTotal>>;

    async fn top_scorers(
        &self,
        principal: &Principal,
        limit: Option<i64>,
        scope: Option<Scope>,
    ) -> Result<Vec<LeaderboardEntry>>;

    // accounts

    async fn create_account(
        &self,
        principal: &Principal,
        request: AccountRequest,
    ) -> Result<UserSummary>;

    async fn list_users(&self, principal: &Principal) -> Result<Vec<UserSummary>>;

    async fn update_user_role(
        &self,
        principal: &Principal,
        user_id: i64,
        role: &str,
    ) -> Result<UserSummary>;

    async fn update_user_scope(
        &self,
        principal: &Principal,
        user_id: i64,
        grant: &str,
    ) -> Result<UserSummary>;

    async fn delete_user(&self, principal: &Principal, user_id: i64) -> Result<()>;

    // settings

    async fn scope_labels(&self, principal: &Principal, scope: Scope) -> Result<ScopeLabels>;

    async fn update_monthly_title(
        &self,
        principal: &Principal,
        scope: Scope,
        title: &str,
    ) -> Result<ScopeLabels>;

    async fn update_stats_labels(
        &self,
        principal: &Principal,
        scope: Scope,
        title: &str,
        label: &str,
    ) -> Result<ScopeLabels>;
}

// ── LedgerServiceImpl ─────────────────────────────────────────

/// Concrete implementation holding port trait references.
///
/// Constructed in `tally_server/src/main.rs` over either `PgStores` or
/// [`crate::memory::MemoryStores`].
pub struct LedgerServiceImpl {
    pub users: Arc<dyn UserStore>,
    pub records: Arc<dyn RecordStore>,
    pub audit: Arc<dyn AuditStore>,
    pub settings: Arc<dyn SettingsStore>,
}

impl LedgerServiceImpl {
    pub fn new(
        users: Arc<dyn UserStore>,
        records: Arc<dyn RecordStore>,
        audit: Arc<dyn AuditStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            users,
            records,
            audit,
            settings,
        }
    }

    /// Wire all four ports to one backend.
    pub fn from_stores<S>(stores: Arc<S>) -> Self
    where
        S: UserStore + RecordStore + AuditStore + SettingsStore + 'static,
    {
        Self::new(stores.clone(), stores.clone(), stores.clone(), stores)
    }

    /// Load a record and check it lives in the caller's effective scope.
    async fn owned_record(&self, principal: &Principal, scope: Scope, record_id: i64) -> Result<Record> {
        let effective = principal.effective_scope(Some(scope), None);
        let record = self
            .records
            .get_record(record_id)
            .await?
            .ok_or_else(|| TallyError::NotFound(format!("record {record_id}")))?;
        if record.scope != effective {
            tracing::warn!(
                user = %principal.username,
                record_id,
                record_scope = %record.scope,
                effective_scope = %effective,
                "cross-scope mutation rejected"
            );
            return Err(TallyError::PermissionDenied(format!(
                "record {record_id} belongs to {}, not {effective}",
                record.scope
            )));
        }
        Ok(record)
    }

    async fn labels_for(&self, scope: Scope) -> Result<ScopeLabels> {
        let keys = ScopeLabels::keys(scope);
        let stored = self.settings.get_settings(&keys).await?;
        Ok(ScopeLabels::resolve(scope, |k| stored.get(k).cloned()))
    }

    async fn user_summary(&self, user_id: i64) -> Result<UserSummary> {
        self.users
            .get_user(user_id)
            .await?
            .map(|u| UserSummary::from(&u))
            .ok_or_else(|| TallyError::NotFound(format!("user {user_id}")))
    }
}

fn non_empty(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TallyError::InvalidValue(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl LedgerService for LedgerServiceImpl {
    async fn bootstrap(&self) -> Result<()> {
        self.users
            .ensure_root(ROOT_USERNAME, DEFAULT_ROOT_PASSWORD)
            .await?;
        let mut defaults = Vec::new();
        for scope in Scope::ALL {
            defaults.push((monthly_title_key(scope), DEFAULT_MONTHLY_TITLE.to_string()));
            defaults.push((stats_title_key(scope), default_stats_title(scope)));
            defaults.push((stats_label_key(scope), DEFAULT_STATS_LABEL.to_string()));
        }
        self.settings.seed_settings(&defaults).await?;
        tracing::info!(root = ROOT_USERNAME, "bootstrap complete");
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Principal> {
        let username = username.trim();
        let password = password.trim();
        if username.is_empty() || password.is_empty() {
            return Err(TallyError::InvalidValue(
                "username and password are required".into(),
            ));
        }
        match self.users.find_user_by_name(username).await? {
            Some(user) if user.password == password => {
                let principal = Principal::from_user(&user);
                tracing::info!(user = %principal.username, role = %principal.role, "login");
                Ok(principal)
            }
            _ => {
                tracing::warn!(user = %username, "login rejected");
                Err(TallyError::Unauthenticated(
                    "wrong username or password".into(),
                ))
            }
        }
    }

    async fn load_principal(&self, username: &str) -> Result<Option<Principal>> {
        Ok(self
            .users
            .find_user_by_name(username)
            .await?
            .map(|u| Principal::from_user(&u)))
    }

    async fn list_records(&self, principal: &Principal, scope: Scope) -> Result<Vec<Record>> {
        principal.require(Capability::ViewRecords)?;
        let scope = principal.effective_scope(Some(scope), None);
        self.records.list_records(scope).await
    }

    async fn create_record(
        &self,
        principal: &Principal,
        scope: Scope,
        input: RecordInput,
    ) -> Result<Record> {
        principal.require(Capability::EditRecords)?;
        let scope = principal.effective_scope(Some(scope), None);
        let name = input.name.trim().to_string();
        let position = Position::parse(&input.position).unwrap_or(Position::Intern);
        let d = derive(position, input.counters.sanitize());

        let new = NewRecord {
            scope,
            position,
            name,
            counters: d.counters,
            derived: d.derived,
            created_at: Utc::now(),
        };
        let audit = AuditDraft::new(
            AuditAction::Add,
            &principal.username,
            format!(
                "name={} position={} score={} scope={}",
                new.name, new.position, new.derived.score, scope
            ),
        );
        let record = self.records.insert_record(&new, audit).await?;
        tracing::info!(
            record_id = record.id,
            scope = %scope,
            actor = %principal.username,
            score = record.derived.score,
            "record created"
        );
        Ok(record)
    }

    async fn inline_update(
        &self,
        principal: &Principal,
        scope: Scope,
        record_id: i64,
        field: &str,
        value: &str,
    ) -> Result<InlineUpdateOutcome> {
        principal.require(Capability::EditRecords)?;
        let edit = FieldEdit::parse(field, value)?;
        let mut record = self.owned_record(principal, scope, record_id).await?;
        edit.apply(&mut record);

        let audit = AuditDraft::new(
            AuditAction::InlineEdit,
            &principal.username,
            format!("{} (scope={})", edit.describe(), record.scope),
        )
        .for_record(record_id);
        self.records.update_record(&record, audit).await?;
        tracing::info!(
            record_id,
            scope = %record.scope,
            actor = %principal.username,
            field = edit.field_name(),
            "record updated"
        );
        Ok(InlineUpdateOutcome::from_record(&record, edit.saved_value()))
    }

    async fn delete_record(
        &self,
        principal: &Principal,
        scope: Scope,
        record_id: i64,
    ) -> Result<()> {
        principal.require(Capability::EditRecords)?;
        let record = self.owned_record(principal, scope, record_id).await?;
        let audit = AuditDraft::new(
            AuditAction::Delete,
            &principal.username,
            format!("name={} scope={}", record.name, record.scope),
        )
        .for_record(record_id);
        self.records
            .delete_record(record_id, record.scope, audit)
            .await?;
        tracing::info!(record_id, scope = %record.scope, actor = %principal.username, "record deleted");
        Ok(())
    }

    async fn reset_scores(&self, principal: &Principal, scope: Scope) -> Result<u64> {
        principal.require(Capability::EditRecords)?;
        let scope = principal.effective_scope(Some(scope), None);
        let audit = AuditDraft::new(
            AuditAction::ResetScores,
            &principal.username,
            format!("reset scores scope={scope}"),
        );
        let affected = self.records.reset_scores(scope, audit).await?;
        tracing::info!(scope = %scope, actor = %principal.username, affected, "scores reset");
        Ok(affected)
    }

    async fn reset_all(&self, principal: &Principal, scope: Scope) -> Result<u64> {
        principal.require(Capability::EditRecords)?;
        let scope = principal.effective_scope(Some(scope), None);
        let audit = AuditDraft::new(
            AuditAction::ResetAll,
            &principal.username,
            format!("reset all scope={scope}"),
        );
        let affected = self.records.purge_records(&[scope], audit).await?;
        tracing::info!(scope = %scope, actor = %principal.username, affected, "records purged");
        Ok(affected)
    }

    async fn admin_reset_data(&self, principal: &Principal, target: ResetTarget) -> Result<u64> {
        principal.require_root()?;
        let audit = AuditDraft::new(
            AuditAction::ResetData,
            &principal.username,
            format!("reset data scope={}", target.label()),
        );
        let affected = self
            .records
            .purge_records(&target.scopes(), audit)
            .await?;
        tracing::warn!(reset = target.label(), affected, "data wiped by root");
        Ok(affected)
    }

    async fn audit_log(&self, principal: &Principal, page: i64) -> Result<LogPage> {
        principal.require(Capability::ViewAuditLog)?;
        self.audit.log_page(clamp_page(page), LOG_PAGE_SIZE).await
    }

    async fn monthly_totals(
        &self,
        principal: &Principal,
        year: i32,
        scope: Option<Scope>,
    ) -> Result<Vec<MonthlyTotal>> {
        principal.require(Capability::ViewStatistics)?;
        let filter = principal.read_filter(scope);
        let sums = self.records.monthly_case_totals(year, filter).await?;
        let now = Utc::now();
        Ok(fill_months(year, (now.year(), now.month()), &sums))
    }

    async fn top_scorers(
        &self,
        principal: &Principal,
        limit: Option<i64>,
        scope: Option<Scope>,
    ) -> Result<Vec<LeaderboardEntry>> {
        principal.require(Capability::ViewStatistics)?;
        let filter = principal.read_filter(scope);
        self.records.top_scorers(filter, clamp_limit(limit)).await
    }

    async fn create_account(
        &self,
        principal: &Principal,
        request: AccountRequest,
    ) -> Result<UserSummary> {
        principal.require(Capability::Administer)?;
        let username = non_empty(&request.username, "username")?;
        let password = non_empty(&request.password, "password")?;
        let role = match request.role.as_deref() {
            None => Role::Viewer,
            Some(raw) => raw.parse::<Role>()?,
        };
        let scope_grant = if role == Role::Admin {
            ScopeGrant::All
        } else {
            match request.scope.as_deref().and_then(ScopeGrant::parse) {
                Some(ScopeGrant::All) => {
                    return Err(TallyError::InvalidValue(
                        "only admins may hold the All grant".into(),
                    ))
                }
                Some(grant) => grant,
                None => ScopeGrant::UnitA,
            }
        };

        let audit = AuditDraft::new(
            AuditAction::CreateAccount,
            &principal.username,
            format!("created {username} role={role} scope={scope_grant}"),
        );
        let user = self
            .users
            .insert_user(
                &NewUser {
                    username,
                    password,
                    role,
                    scope_grant,
                },
                audit,
            )
            .await?;
        tracing::info!(user = %user.username, role = %role, actor = %principal.username, "account created");
        Ok(UserSummary::from(&user))
    }

    async fn list_users(&self, principal: &Principal) -> Result<Vec<UserSummary>> {
        principal.require(Capability::Administer)?;
        let users = self.users.list_users().await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    async fn update_user_role(
        &self,
        principal: &Principal,
        user_id: i64,
        role: &str,
    ) -> Result<UserSummary> {
        principal.require(Capability::Administer)?;
        let role: Role = role.parse()?;
        let target = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| TallyError::NotFound(format!("user {user_id}")))?;
        if target.is_root() {
            return Err(TallyError::PermissionDenied(
                "the root account cannot be modified".into(),
            ));
        }
        if target.role == Role::Admin {
            return Err(TallyError::InvalidValue(format!(
                "{} is an admin; admin roles cannot be changed",
                target.username
            )));
        }
        let grant = if role == Role::Admin {
            ScopeGrant::All
        } else {
            target.scope_grant
        };
        let audit = AuditDraft::new(
            AuditAction::EditRole,
            &principal.username,
            format!("{}: {} -> {}", target.username, target.role, role),
        );
        self.users
            .update_user_access(user_id, role, grant, audit)
            .await?;
        tracing::info!(user = %target.username, role = %role, actor = %principal.username, "role changed");
        self.user_summary(user_id).await
    }

    async fn update_user_scope(
        &self,
        principal: &Principal,
        user_id: i64,
        grant: &str,
    ) -> Result<UserSummary> {
        principal.require(Capability::Administer)?;
        let grant = ScopeGrant::parse(grant).ok_or_else(|| {
            TallyError::InvalidValue(format!("unknown scope '{grant}' (UnitA, UnitB, All)"))
        })?;
        let target = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| TallyError::NotFound(format!("user {user_id}")))?;
        if target.is_root() {
            return Err(TallyError::PermissionDenied(
                "the root account cannot be modified".into(),
            ));
        }
        let grant = if target.role == Role::Admin {
            ScopeGrant::All
        } else if grant == ScopeGrant::All {
            return Err(TallyError::InvalidValue(
                "only admins may hold the All grant".into(),
            ));
        } else {
            grant
        };
        let audit = AuditDraft::new(
            AuditAction::EditScope,
            &principal.username,
            format!("{}: {} -> {}", target.username, target.scope_grant, grant),
        );
        self.users
            .update_user_access(user_id, target.role, grant, audit)
            .await?;
        tracing::info!(user = %target.username, grant = %grant, actor = %principal.username, "scope changed");
        self.user_summary(user_id).await
    }

    async fn delete_user(&self, principal: &Principal, user_id: i64) -> Result<()> {
        principal.require(Capability::Administer)?;
        let target = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| TallyError::NotFound(format!("user {user_id}")))?;
        if target.is_root() {
            return Err(TallyError::PermissionDenied(
                "the root account cannot be deleted".into(),
            ));
        }
        let audit = AuditDraft::new(
            AuditAction::DeleteUser,
            &principal.username,
            format!("deleted {}", target.username),
        );
        self.users.delete_user(user_id, audit).await?;
        tracing::info!(user = %target.username, actor = %principal.username, "account deleted");
        Ok(())
    }

    async fn scope_labels(&self, principal: &Principal, scope: Scope) -> Result<ScopeLabels> {
        principal.require(Capability::ViewStatistics)?;
        self.labels_for(principal.effective_scope(Some(scope), None))
            .await
    }

    async fn update_monthly_title(
        &self,
        principal: &Principal,
        scope: Scope,
        title: &str,
    ) -> Result<ScopeLabels> {
        principal.require(Capability::Administer)?;
        let title = non_empty(title, "title")?;
        let audit = AuditDraft::new(
            AuditAction::EditSettings,
            &principal.username,
            format!("monthly title {scope} = {title}"),
        );
        self.settings
            .put_settings(&[(monthly_title_key(scope), title)], audit)
            .await?;
        self.labels_for(scope).await
    }

    async fn update_stats_labels(
        &self,
        principal: &Principal,
        scope: Scope,
        title: &str,
        label: &str,
    ) -> Result<ScopeLabels> {
        principal.require(Capability::Administer)?;
        let title = non_empty(title, "title")?;
        let label = non_empty(label, "label")?;
        let audit = AuditDraft::new(
            AuditAction::EditSettings,
            &principal.username,
            format!("stats labels {scope} = {title} / {label}"),
        );
        self.settings
            .put_settings(
                &[(stats_title_key(scope), title), (stats_label_key(scope), label)],
                audit,
            )
            .await?;
        self.labels_for(scope).await
    }
}
