//! Postgres adapter for the tally_core port traits.

pub mod schema;
pub mod sqlx_types;
pub mod store;

pub use schema::ensure_schema;
pub use store::{PgAuditStore, PgRecordStore, PgSettingsStore, PgUserStore};

use sqlx::PgPool;

/// One adapter per port, all sharing a pool.
pub struct PgStores {
    pub users: PgUserStore,
    pub records: PgRecordStore,
    pub audit: PgAuditStore,
    pub settings: PgSettingsStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: PgUserStore::new(pool.clone()),
            records: PgRecordStore::new(pool.clone()),
            audit: PgAuditStore::new(pool.clone()),
            settings: PgSettingsStore::new(pool),
        }
    }
}
