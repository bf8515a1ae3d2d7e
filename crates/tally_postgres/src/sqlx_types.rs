//! Row shapes as Postgres returns them, converted into core types.

use chrono::{DateTime, Utc};

use tally_core::audit::LogEntry;
use tally_core::types::{Counters, DerivedFields, Position, Record, Role, Scope, ScopeGrant, User};

#[derive(Debug, sqlx::FromRow)]
pub struct PgUserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub scope_grant: String,
}

impl From<PgUserRow> for User {
    /// Legacy role text ("user") and unparsable grants are tolerated.
    fn from(row: PgUserRow) -> Self {
        Self {
            id: row.id,
            role: Role::parse(&row.role).unwrap_or(Role::Viewer),
            scope_grant: ScopeGrant::parse(&row.scope_grant).unwrap_or(ScopeGrant::UnitA),
            username: row.username,
            password: row.password,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgRecordRow {
    pub id: i64,
    pub scope: String,
    pub position: String,
    pub name: String,
    pub traffic_count: i64,
    pub sentence_1to5: i64,
    pub sentence_6plus: i64,
    pub supervision_total: i64,
    pub supervision_1to5: i64,
    pub supervision_6plus: i64,
    pub error_count: i64,
    pub case_total: i64,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PgRecordRow> for Record {
    type Error = String;

    fn try_from(row: PgRecordRow) -> Result<Self, Self::Error> {
        let scope = Scope::parse(&row.scope)
            .ok_or_else(|| format!("record {}: unknown scope '{}'", row.id, row.scope))?;
        let position = Position::parse(&row.position)
            .ok_or_else(|| format!("record {}: unknown position '{}'", row.id, row.position))?;
        Ok(Record {
            id: row.id,
            scope,
            position,
            name: row.name,
            counters: Counters {
                traffic_count: row.traffic_count,
                sentence_1to5: row.sentence_1to5,
                sentence_6plus: row.sentence_6plus,
                supervision_1to5: row.supervision_1to5,
                supervision_6plus: row.supervision_6plus,
                error_count: row.error_count,
            },
            derived: DerivedFields {
                supervision_total: row.supervision_total,
                case_total: row.case_total,
                score: row.score,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgLogRow {
    pub id: i64,
    pub action: String,
    pub record_id: Option<i64>,
    pub actor: String,
    pub time_text: String,
    pub details: String,
}

impl From<PgLogRow> for LogEntry {
    fn from(row: PgLogRow) -> Self {
        Self {
            id: row.id,
            action: row.action,
            record_id: row.record_id,
            actor: row.actor,
            time: row.time_text,
            details: row.details,
        }
    }
}
