//! Route handlers. Every success body is `{ "success": true, "data": ... }`.

pub mod auth;
pub mod health;
pub mod logs;
pub mod records;
pub mod settings;
pub mod stats;
pub mod users;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

/// `{ "affected": n }` for bulk operations.
#[derive(Debug, Serialize)]
pub struct Affected {
    pub affected: u64,
}
