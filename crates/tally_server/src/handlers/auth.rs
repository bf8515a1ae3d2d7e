//! Login, logout, session introspection and the public maintenance banner.
//!
//! POST /api/login       : exchange credentials for a bearer token
//! POST /api/logout      : drop the caller's session
//! GET  /api/session     : caller identity, effective scope and labels
//! GET  /api/maintenance : maintenance banner (public)

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tally_core::policy::Capability;
use tally_core::settings::ScopeLabels;
use tally_core::types::{Role, Scope, ScopeGrant};
use tally_core::LedgerService;
use uuid::Uuid;

use super::{ok, ApiResponse};
use crate::config::{MaintenanceBanner, MaintenanceSource};
use crate::error::AppError;
use crate::session::{bearer_token, CurrentUser, SessionStore};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub username: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
    pub scope: Scope,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub username: String,
    pub role: Role,
    pub scope_grant: ScopeGrant,
    pub scope: Scope,
    pub is_root: bool,
    pub capabilities: Vec<Capability>,
    pub labels: ScopeLabels,
}

pub async fn maintenance(
    Extension(maintenance): Extension<MaintenanceSource>,
) -> Json<ApiResponse<MaintenanceBanner>> {
    ok(maintenance.current().await.banner())
}

pub async fn login(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(sessions): Extension<Arc<SessionStore>>,
    Extension(maintenance): Extension<MaintenanceSource>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let window = maintenance.current().await;
    if window.update_mode {
        return Err(AppError::LoginSuspended(window.update_until));
    }

    let principal = service.authenticate(&req.username, &req.password).await?;
    let requested = req.scope.as_deref().and_then(Scope::parse);
    let scope = principal.effective_scope(requested, None);
    let token = sessions.create(&principal.username, scope).await;

    Ok(ok(LoginResponse {
        token,
        username: principal.username,
        role: principal.role,
        scope_grant: principal.scope_grant,
        scope,
    }))
}

/// Always succeeds; an unknown or missing token is already logged out.
pub async fn logout(
    Extension(sessions): Extension<Arc<SessionStore>>,
    headers: HeaderMap,
) -> Json<ApiResponse<bool>> {
    let removed = match bearer_token(&headers) {
        Some(token) => sessions.remove(&token).await,
        None => false,
    };
    ok(removed)
}

pub async fn session(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<SessionInfo>>, AppError> {
    let labels = service
        .scope_labels(&current.principal, current.scope)
        .await?;
    let p = current.principal;
    Ok(ok(SessionInfo {
        is_root: p.is_root(),
        capabilities: p.role.capabilities(),
        username: p.username,
        role: p.role,
        scope_grant: p.scope_grant,
        scope: current.scope,
        labels,
    }))
}
