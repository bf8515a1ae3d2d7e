//! Postgres implementations of all tally_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid compile-time DB requirement.
//! Mutations and their audit entries share one transaction.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use tally_core::audit::{page_offset, total_pages, AuditDraft, LogEntry, LogPage};
use tally_core::error::TallyError;
use tally_core::ports::{AuditStore, RecordStore, Result, SettingsStore, UserStore};
use tally_core::stats::LeaderboardEntry;
use tally_core::types::{NewRecord, NewUser, Record, Role, Scope, ScopeGrant, User};

use crate::sqlx_types::{PgLogRow, PgRecordRow, PgUserRow};

const RECORD_COLUMNS: &str = "id, scope, position, name, traffic_count, sentence_1to5, \
     sentence_6plus, supervision_total, supervision_1to5, supervision_6plus, error_count, \
     case_total, score, created_at";

async fn append_log(conn: &mut PgConnection, draft: &AuditDraft) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO logs (action, record_id, actor, time_text, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(draft.action.as_str())
    .bind(draft.record_id)
    .bind(&draft.actor)
    .bind(draft.time_text())
    .bind(&draft.details)
    .execute(conn)
    .await
    .map_err(|e| anyhow!(e))?;
    Ok(())
}

fn record_from_row(row: PgRecordRow) -> Result<Record> {
    row.try_into()
        .map_err(|e: String| TallyError::Persistence(anyhow!(e)))
}

fn scope_names(scopes: &[Scope]) -> Vec<String> {
    scopes.iter().map(|s| s.as_str().to_string()).collect()
}

// ── PgUserStore ───────────────────────────────────────────────

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, PgUserRow>(
            "SELECT id, username, password, role, scope_grant FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(User::from))
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, PgUserRow>(
            "SELECT id, username, password, role, scope_grant FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, PgUserRow>(
            "SELECT id, username, password, role, scope_grant FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: &NewUser, audit: AuditDraft) -> Result<User> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let row = sqlx::query_as::<_, PgUserRow>(
            r#"
            INSERT INTO users (username, password, role, scope_grant)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password, role, scope_grant
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.as_str())
        .bind(user.scope_grant.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => TallyError::Conflict(
                format!("username '{}' already exists", user.username),
            ),
            other => TallyError::Persistence(anyhow!(other)),
        })?;
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(row.into())
    }

    async fn update_user_access(
        &self,
        user_id: i64,
        role: Role,
        scope_grant: ScopeGrant,
        audit: AuditDraft,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let result = sqlx::query("UPDATE users SET role = $1, scope_grant = $2 WHERE id = $3")
            .bind(role.as_str())
            .bind(scope_grant.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(TallyError::NotFound(format!("user {user_id}")));
        }
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn delete_user(&self, user_id: i64, audit: AuditDraft) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(TallyError::NotFound(format!("user {user_id}")));
        }
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn ensure_root(&self, username: &str, password: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password, role, scope_grant)
            VALUES ($1, $2, 'admin', 'All')
            ON CONFLICT (username) DO UPDATE SET role = 'admin', scope_grant = 'All'
            "#,
        )
        .bind(username)
        .bind(password)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgRecordStore ─────────────────────────────────────────────

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_record(&self, record: &NewRecord, audit: AuditDraft) -> Result<Record> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let query = format!(
            r#"
            INSERT INTO records (
                scope, position, name,
                traffic_count, sentence_1to5, sentence_6plus,
                supervision_total, supervision_1to5, supervision_6plus,
                error_count, case_total, score, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {RECORD_COLUMNS}
            "#
        );
        let c = &record.counters;
        let d = &record.derived;
        let row = sqlx::query_as::<_, PgRecordRow>(&query)
            .bind(record.scope.as_str())
            .bind(record.position.as_str())
            .bind(&record.name)
            .bind(c.traffic_count)
            .bind(c.sentence_1to5)
            .bind(c.sentence_6plus)
            .bind(d.supervision_total)
            .bind(c.supervision_1to5)
            .bind(c.supervision_6plus)
            .bind(c.error_count)
            .bind(d.case_total)
            .bind(d.score)
            .bind(record.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        let stored = record_from_row(row)?;
        append_log(&mut tx, &audit.for_record(stored.id)).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(stored)
    }

    async fn get_record(&self, record_id: i64) -> Result<Option<Record>> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = $1");
        let row = sqlx::query_as::<_, PgRecordRow>(&query)
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(record_from_row).transpose()
    }

    async fn list_records(&self, scope: Scope) -> Result<Vec<Record>> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM records
            WHERE scope = $1
            ORDER BY CASE position
                         WHEN 'Officer' THEN 1
                         WHEN 'ReserveOfficer' THEN 2
                         ELSE 3
                     END,
                     score DESC,
                     id
            "#
        );
        let rows = sqlx::query_as::<_, PgRecordRow>(&query)
            .bind(scope.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(record_from_row).collect()
    }

    async fn update_record(&self, record: &Record, audit: AuditDraft) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let c = &record.counters;
        let d = &record.derived;
        let result = sqlx::query(
            r#"
            UPDATE records
            SET position = $1, name = $2,
                traffic_count = $3, sentence_1to5 = $4, sentence_6plus = $5,
                supervision_1to5 = $6, supervision_6plus = $7, error_count = $8,
                supervision_total = $9, case_total = $10, score = $11
            WHERE id = $12 AND scope = $13
            "#,
        )
        .bind(record.position.as_str())
        .bind(&record.name)
        .bind(c.traffic_count)
        .bind(c.sentence_1to5)
        .bind(c.sentence_6plus)
        .bind(c.supervision_1to5)
        .bind(c.supervision_6plus)
        .bind(c.error_count)
        .bind(d.supervision_total)
        .bind(d.case_total)
        .bind(d.score)
        .bind(record.id)
        .bind(record.scope.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(TallyError::NotFound(format!("record {}", record.id)));
        }
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn delete_record(&self, record_id: i64, scope: Scope, audit: AuditDraft) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let result = sqlx::query("DELETE FROM records WHERE id = $1 AND scope = $2")
            .bind(record_id)
            .bind(scope.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(TallyError::NotFound(format!("record {record_id}")));
        }
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn reset_scores(&self, scope: Scope, audit: AuditDraft) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let result = sqlx::query(
            r#"
            UPDATE records
            SET traffic_count = 0, sentence_1to5 = 0, sentence_6plus = 0,
                supervision_1to5 = 0, supervision_6plus = 0, error_count = 0,
                supervision_total = 0, case_total = 0, score = 0
            WHERE scope = $1
            "#,
        )
        .bind(scope.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        let affected = result.rows_affected();
        append_log(&mut tx, &audit.with_affected(affected)).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(affected)
    }

    async fn purge_records(&self, scopes: &[Scope], audit: AuditDraft) -> Result<u64> {
        let names = scope_names(scopes);
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        sqlx::query(
            r#"
            DELETE FROM logs
            WHERE record_id IN (SELECT id FROM records WHERE scope = ANY($1))
            "#,
        )
        .bind(&names)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        let result = sqlx::query("DELETE FROM records WHERE scope = ANY($1)")
            .bind(&names)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        let affected = result.rows_affected();
        append_log(&mut tx, &audit.with_affected(affected)).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(affected)
    }

    async fn monthly_case_totals(&self, year: i32, scope: Option<Scope>) -> Result<Vec<(u32, i64)>> {
        let rows = sqlx::query_as::<_, (i32, i64)>(
            r#"
            SELECT EXTRACT(MONTH FROM created_at)::INT AS month,
                   COALESCE(SUM(case_total), 0)::BIGINT AS total
            FROM records
            WHERE EXTRACT(YEAR FROM created_at)::INT = $1
              AND ($2::TEXT IS NULL OR scope = $2)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(year)
        .bind(scope.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(month, total)| (month as u32, total))
            .collect())
    }

    async fn top_scorers(&self, scope: Option<Scope>, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT name, COALESCE(SUM(score), 0)::BIGINT AS total_score
            FROM records
            WHERE ($1::TEXT IS NULL OR scope = $1)
            GROUP BY name
            ORDER BY total_score DESC, name
            LIMIT $2
            "#,
        )
        .bind(scope.map(|s| s.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(name, total_score)| LeaderboardEntry { name, total_score })
            .collect())
    }
}

// ── PgAuditStore ──────────────────────────────────────────────

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn log_page(&self, page: u32, page_size: u32) -> Result<LogPage> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        let rows = sqlx::query_as::<_, PgLogRow>(
            r#"
            SELECT id, action, record_id, actor, time_text, details
            FROM logs
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page_size as i64)
        .bind(page_offset(page, page_size) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        let total = total.max(0) as u64;
        Ok(LogPage {
            entries: rows.into_iter().map(LogEntry::from).collect(),
            page,
            page_size,
            total,
            total_pages: total_pages(total, page_size),
        })
    }
}

// ── PgSettingsStore ───────────────────────────────────────────

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get_settings(&self, keys: &[String]) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM settings WHERE key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().collect())
    }

    async fn put_settings(&self, entries: &[(String, String)], audit: AuditDraft) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES ($1, $2)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        append_log(&mut tx, &audit).await?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn seed_settings(&self, entries: &[(String, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
