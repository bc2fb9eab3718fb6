use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// AppError
///
/// The single error taxonomy of the service. Every repository, service and handler
/// path returns this type, and `IntoResponse` turns it into a status-coded JSON body.
/// Nothing is retried: each variant is surfaced to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Handle or resource absent (or not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// The presented secret does not match the stored digest.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The actor exists but has been deactivated.
    #[error("account is inactive")]
    Inactive,

    /// A protected route was called without any credentials.
    #[error("authentication required")]
    Unauthenticated,

    /// The access policy denied the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed or missing input, duplicate handle.
    #[error("{0}")]
    Validation(String),

    /// The transition is not allowed in the resource's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (database, hashing backend).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for the service layer.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials | AppError::Inactive | AppError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs.
        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "internal server error".to_string()
            }
            other => {
                tracing::debug!(status = status.as_u16(), "request rejected: {}", other);
                other.to_string()
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
