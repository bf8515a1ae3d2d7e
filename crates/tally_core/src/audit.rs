//! Audit log vocabulary and paging.
//!
//! Entries are append-only. The only removal path is a scope wipe, which
//! cascades to entries whose `record_id` points into the wiped scope.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const LOG_PAGE_SIZE: u32 = 12;

/// Timestamp layout of `logs.time_text`.
pub const LOG_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Add,
    InlineEdit,
    Delete,
    ResetScores,
    ResetAll,
    ResetData,
    CreateAccount,
    EditRole,
    EditScope,
    DeleteUser,
    EditSettings,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Add => "ADD",
            AuditAction::InlineEdit => "INLINE_EDIT",
            AuditAction::Delete => "DELETE",
            AuditAction::ResetScores => "RESET_SCORES",
            AuditAction::ResetAll => "RESET_ALL",
            AuditAction::ResetData => "RESET_DATA",
            AuditAction::CreateAccount => "CREATE_ACCOUNT",
            AuditAction::EditRole => "EDIT_ROLE",
            AuditAction::EditScope => "EDIT_SCOPE",
            AuditAction::DeleteUser => "DELETE_USER",
            AuditAction::EditSettings => "EDIT_SETTINGS",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry waiting to be written in the same transaction as its mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub action: AuditAction,
    pub record_id: Option<i64>,
    pub actor: String,
    pub details: String,
    pub at: DateTime<Utc>,
}

impl AuditDraft {
    pub fn new(action: AuditAction, actor: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            action,
            record_id: None,
            actor: actor.into(),
            details: details.into(),
            at: Utc::now(),
        }
    }

    pub fn for_record(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Bulk operations only learn their row count inside the store transaction.
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.details = format!("{} (affected={affected})", self.details);
        self
    }

    pub fn time_text(&self) -> String {
        self.at.format(LOG_TIME_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    /// Stored as text so historical tags survive vocabulary changes.
    pub action: String,
    /// Weak reference; the record may no longer exist.
    pub record_id: Option<i64>,
    pub actor: String,
    pub time: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// Page numbers below 1 clamp to 1.
pub fn clamp_page(page: i64) -> u32 {
    page.clamp(1, u32::MAX as i64) as u32
}

pub fn page_offset(page: u32, page_size: u32) -> u64 {
    (page.max(1) as u64 - 1) * page_size as u64
}

/// At least one page, even when the log is empty.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if total == 0 {
        return 1;
    }
    total.div_ceil(page_size as u64) as u32
}
