//! Idempotent schema bootstrap.

use anyhow::anyhow;
use sqlx::PgPool;

use tally_core::ports::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BIGSERIAL PRIMARY KEY,
        username    TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        role        TEXT NOT NULL DEFAULT 'user',
        scope_grant TEXT NOT NULL DEFAULT 'UnitA'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS records (
        id                BIGSERIAL PRIMARY KEY,
        scope             TEXT NOT NULL DEFAULT 'UnitA',
        position          TEXT NOT NULL,
        name              TEXT NOT NULL,
        traffic_count     BIGINT NOT NULL DEFAULT 0,
        sentence_1to5     BIGINT NOT NULL DEFAULT 0,
        sentence_6plus    BIGINT NOT NULL DEFAULT 0,
        supervision_total BIGINT NOT NULL DEFAULT 0,
        supervision_1to5  BIGINT NOT NULL DEFAULT 0,
        supervision_6plus BIGINT NOT NULL DEFAULT 0,
        error_count       BIGINT NOT NULL DEFAULT 0,
        case_total        BIGINT NOT NULL DEFAULT 0,
        score             BIGINT NOT NULL DEFAULT 0,
        created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS records_scope_idx ON records (scope)",
    r#"
    CREATE TABLE IF NOT EXISTS logs (
        id        BIGSERIAL PRIMARY KEY,
        action    TEXT NOT NULL,
        record_id BIGINT,
        actor     TEXT NOT NULL,
        time_text TEXT NOT NULL,
        details   TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS logs_record_id_idx ON logs (record_id)",
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Create any missing table or index. Safe to run on every start.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| anyhow!(e))?;
    }
    tracing::info!(statements = SCHEMA.len(), "schema ensured");
    Ok(())
}
