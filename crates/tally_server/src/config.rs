//! Server configuration from environment variables, plus the maintenance file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_MAINTENANCE_FILE: &str = "update.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `None` runs the server on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub bind_addr: String,
    pub session_timeout: Duration,
    pub maintenance_file: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        Self {
            database_url: lookup("DATABASE_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            max_connections: number("TALLY_DB_POOL_SIZE", DEFAULT_POOL_SIZE as u64) as u32,
            connect_timeout: Duration::from_secs(number(
                "TALLY_DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            bind_addr: lookup("TALLY_BIND_ADDR")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_timeout: Duration::from_secs(number(
                "TALLY_SESSION_TIMEOUT_SECS",
                DEFAULT_SESSION_TIMEOUT_SECS,
            )),
            maintenance_file: lookup("TALLY_MAINTENANCE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MAINTENANCE_FILE)),
        }
    }
}

/// Hide the password part of a connection URL before logging it.
pub fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "***".to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}

// ── Maintenance mode ───────────────────────────────────────────

/// Contents of the maintenance file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub update_mode: bool,
    pub update_until: String,
    pub update_message_enabled: bool,
    pub update_message: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            update_mode: false,
            update_until: String::new(),
            update_message_enabled: true,
            update_message: String::new(),
        }
    }
}

/// What unauthenticated clients are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceBanner {
    pub active: bool,
    pub until: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MaintenanceConfig {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "malformed maintenance file, using defaults");
                Self::default()
            }
        }
    }

    pub fn banner(&self) -> MaintenanceBanner {
        MaintenanceBanner {
            active: self.update_mode,
            until: self.update_until.clone(),
            message: (self.update_message_enabled && !self.update_message.is_empty())
                .then(|| self.update_message.clone()),
        }
    }
}

/// Re-reads the maintenance file on every call so operators can flip it live.
#[derive(Debug, Clone)]
pub struct MaintenanceSource {
    path: PathBuf,
}

impl MaintenanceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn current(&self) -> MaintenanceConfig {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => MaintenanceConfig::parse(&text),
            Err(_) => MaintenanceConfig::default(),
        }
    }
}
