//! Record handlers. All of them act in the caller's effective scope.
//!
//! GET    /api/records
//! POST   /api/records
//! POST   /api/records/inline_edit
//! DELETE /api/records/:id
//! POST   /api/records/reset_scores
//! POST   /api/records/reset_all
//! POST   /api/admin/reset_data

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use tally_core::edit::InlineUpdateOutcome;
use tally_core::service::{RecordInput, ResetTarget};
use tally_core::types::{Record, Scope};
use tally_core::{LedgerService, TallyError};

use super::{ok, Affected, ApiResponse};
use crate::error::AppError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct InlineEditRequest {
    pub id: i64,
    pub field: String,
    /// Text or a JSON number.
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ResetDataRequest {
    /// CURRENT, UnitA, UnitB or ALL.
    pub scope: String,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub async fn list_records(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<Record>>>, AppError> {
    let records = service
        .list_records(&current.principal, current.scope)
        .await?;
    Ok(ok(records))
}

pub async fn create_record(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<RecordInput>,
) -> Result<Json<ApiResponse<Record>>, AppError> {
    let record = service
        .create_record(&current.principal, current.scope, input)
        .await?;
    Ok(ok(record))
}

pub async fn inline_edit(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<InlineEditRequest>,
) -> Result<Json<ApiResponse<InlineUpdateOutcome>>, AppError> {
    let outcome = service
        .inline_update(
            &current.principal,
            current.scope,
            req.id,
            &req.field,
            &value_text(&req.value),
        )
        .await?;
    Ok(ok(outcome))
}

pub async fn delete_record(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<i64>>, AppError> {
    service
        .delete_record(&current.principal, current.scope, id)
        .await?;
    Ok(ok(id))
}

pub async fn reset_scores(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Affected>>, AppError> {
    let affected = service
        .reset_scores(&current.principal, current.scope)
        .await?;
    Ok(ok(Affected { affected }))
}

pub async fn reset_all(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Affected>>, AppError> {
    let affected = service
        .reset_all(&current.principal, current.scope)
        .await?;
    Ok(ok(Affected { affected }))
}

pub async fn reset_data(
    Extension(service): Extension<Arc<dyn LedgerService>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ResetDataRequest>,
) -> Result<Json<ApiResponse<Affected>>, AppError> {
    let target = match req.scope.trim().to_ascii_uppercase().as_str() {
        "CURRENT" => ResetTarget::Scope(current.scope),
        "ALL" => ResetTarget::All,
        other => ResetTarget::Scope(Scope::parse(other).ok_or_else(|| {
            TallyError::InvalidValue(format!(
                "reset scope must be CURRENT, UnitA, UnitB or ALL, got '{}'",
                req.scope
            ))
        })?),
    };
    let affected = service
        .admin_reset_data(&current.principal, target)
        .await?;
    Ok(ok(Affected { affected }))
}
