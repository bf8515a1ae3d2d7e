//! Per-unit display labels, admin only. `scope` defaults to the session scope.
//!
//! POST /api/settings/monthly_title  { title, scope? }
//! POST /api/settings/stats          { title, label, scope? }

use std::sync::Arc;

use axum::{Extension, Json};
use serde::Deserialize;
use tally_core::settings::ScopeLabels;
use tally_core::types::Scope;
use tally_core::LedgerService;

use super::{ok, ApiResponse};
use crate::error::AppError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct MonthlyTitleRequest {
    pub title: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsLabelsRequest {
    pub title: String,
    pub label: String,
    #[serde(default)]
    pub scope: Option<String>,
}

fn target_scope(current: &CurrentUser, requested: Option<&str>) -> Scope {
    requested.and_then(Scope::parse).unwrap_or(current.scope)
}

pub async fn update_monthly_title(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<MonthlyTitleRequest>,
) -> Result<Json<ApiResponse<ScopeLabels>>, AppError> {
    let scope = target_scope(&current, req.scope.as_deref());
    let labels = service
        .update_monthly_title(&current.principal, scope, &req.title)
        .await?;
    Ok(ok(labels))
}

pub async fn update_stats_labels(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<StatsLabelsRequest>,
) -> Result<Json<ApiResponse<ScopeLabels>>, AppError> {
    let scope = target_scope(&current, req.scope.as_deref());
    let labels = service
        .update_stats_labels(&current.principal, scope, &req.title, &req.label)
        .await?;
    Ok(ok(labels))
}
