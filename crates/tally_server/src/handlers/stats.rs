//! Statistics for every role.
//!
//! GET /api/stats/monthly?year=&scope=
//! GET /api/stats/top?limit=&scope=
//!
//! Without `scope` (or with `scope=ALL`) callers that see every unit get both;
//! restricted callers always get their own unit.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tally_core::stats::{LeaderboardEntry, MonthlyTotal};
use tally_core::types::Scope;
use tally_core::LedgerService;

use super::{ok, ApiResponse};
use crate::error::AppError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyResponse {
    pub year: i32,
    pub months: Vec<MonthlyTotal>,
}

pub async fn monthly(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<ApiResponse<MonthlyResponse>>, AppError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let scope = query.scope.as_deref().and_then(Scope::parse);
    let months = service
        .monthly_totals(&current.principal, year, scope)
        .await?;
    Ok(ok(MonthlyResponse { year, months }))
}

pub async fn top(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<TopQuery>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntry>>>, AppError> {
    let scope = query.scope.as_deref().and_then(Scope::parse);
    let entries = service
        .top_scorers(&current.principal, query.limit, scope)
        .await?;
    Ok(ok(entries))
}
