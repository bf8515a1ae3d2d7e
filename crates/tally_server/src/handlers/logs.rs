//! GET /api/logs?page=: audit log, newest first, admin only.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;
use tally_core::audit::LogPage;
use tally_core::LedgerService;

use super::{ok, ApiResponse};
use crate::error::AppError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

pub async fn list_logs(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<LogPage>>, AppError> {
    let page = service
        .audit_log(&current.principal, query.page.unwrap_or(1))
        .await?;
    Ok(ok(page))
}
