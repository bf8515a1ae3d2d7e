//! Account management, admin only.
//!
//! GET    /api/users
//! POST   /api/users            (also /api/addaccount for the bot client)
//! POST   /api/users/:id/role
//! POST   /api/users/:id/scope
//! DELETE /api/users/:id

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use tally_core::service::AccountRequest;
use tally_core::types::UserSummary;
use tally_core::LedgerService;

use super::{ok, ApiResponse};
use crate::error::AppError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ScopeRequest {
    pub scope: String,
}

pub async fn list_users(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<UserSummary>>>, AppError> {
    Ok(ok(service.list_users(&current.principal).await?))
}

pub async fn create_account(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<AccountRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, AppError> {
    Ok(ok(service.create_account(&current.principal, req).await?))
}

pub async fn update_role(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, AppError> {
    let user = service
        .update_user_role(&current.principal, id, &req.role)
        .await?;
    Ok(ok(user))
}

pub async fn update_scope(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ScopeRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, AppError> {
    let user = service
        .update_user_scope(&current.principal, id, &req.scope)
        .await?;
    Ok(ok(user))
}

pub async fn delete_user(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<i64>>, AppError> {
    service.delete_user(&current.principal, id).await?;
    Ok(ok(id))
}
