use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl TallyError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PermissionDenied(_) => 403,
            Self::InvalidField(_) => 400,
            Self::InvalidValue(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unauthenticated(_) => 401,
            Self::Persistence(_) => 500,
        }
    }

    /// Storage failures are reported generically; everything else is safe to show.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}
