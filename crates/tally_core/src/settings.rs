//! Per-unit display labels stored in the `settings` key/value table.

use serde::Serialize;

use crate::types::Scope;

pub const MONTHLY_TITLE_FALLBACK_KEY: &str = "monthly_title";
pub const DEFAULT_MONTHLY_TITLE: &str = "MONTHLY SCORE STATISTICS";
pub const DEFAULT_STATS_LABEL: &str = "Total cases";

pub fn monthly_title_key(scope: Scope) -> String {
    format!("monthly_title_{scope}")
}

pub fn stats_title_key(scope: Scope) -> String {
    format!("stats_title_{scope}")
}

pub fn stats_label_key(scope: Scope) -> String {
    format!("stats_label_{scope}")
}

pub fn default_stats_title(scope: Scope) -> String {
    format!("Score statistics {scope}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeLabels {
    pub scope: Scope,
    pub monthly_title: String,
    pub stats_title: String,
    pub stats_label: String,
}

impl ScopeLabels {
    /// Resolve labels from whatever keys are set. `lookup` returns the stored value, if any.
    pub fn resolve(scope: Scope, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            scope,
            monthly_title: non_empty(&monthly_title_key(scope))
                .or_else(|| non_empty(MONTHLY_TITLE_FALLBACK_KEY))
                .unwrap_or_else(|| DEFAULT_MONTHLY_TITLE.to_string()),
            stats_title: non_empty(&stats_title_key(scope))
                .unwrap_or_else(|| default_stats_title(scope)),
            stats_label: non_empty(&stats_label_key(scope))
                .unwrap_or_else(|| DEFAULT_STATS_LABEL.to_string()),
        }
    }

    /// Every key read by [`ScopeLabels::resolve`] for this scope.
    pub fn keys(scope: Scope) -> [String; 4] {
        [
            monthly_title_key(scope),
            MONTHLY_TITLE_FALLBACK_KEY.to_string(),
            stats_title_key(scope),
            stats_label_key(scope),
        ]
    }
}
