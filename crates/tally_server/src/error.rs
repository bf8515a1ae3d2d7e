//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tally_core::TallyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] TallyError),

    #[error("session expired")]
    SessionExpired,

    /// The maintenance window ended this session.
    #[error("maintenance")]
    Maintenance,

    /// Logins are refused while maintenance is on.
    #[error("the system is under maintenance until {0}")]
    LoginSuspended(String),

    #[error("account removed")]
    AccountRemoved,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::SessionExpired | AppError::Maintenance => StatusCode::UNAUTHORIZED,
            AppError::LoginSuspended(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AccountRemoved => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Core(e @ TallyError::Persistence(_)) => {
                tracing::error!(error = %e, "store failure");
                e.public_message()
            }
            AppError::Core(e) => e.public_message(),
            other => other.to_string(),
        };
        let body = json!({ "success": false, "error": message });
        (self.status(), Json(body)).into_response()
    }
}
