use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::repo::StoreError;
use crate::notify::NotifyError;

/// Errors that may cross the trust boundary.
///
/// The `Display` text of every variant is what the client sees, so
/// variants that could leak account state carry fixed messages only.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("an account with these details already exists")]
    Conflict,

    #[error("invalid email or password")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid or expired token")]
    InvalidOrExpired,

    #[error("not found")]
    NotFound,

    #[error("storage timed out")]
    Timeout,

    /// Carries the backend's own description for the log; never rendered.
    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("password processing failed")]
    Processing,

    #[error("could not deliver email, please try again later")]
    DeliveryDegraded,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidOrExpired => StatusCode::BAD_REQUEST,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Unauthorized | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Timeout | AppError::StoreUnavailable(_) | AppError::Processing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::DeliveryDegraded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Timeout | AppError::StoreUnavailable(_) | AppError::Processing => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AppError::Conflict,
            StoreError::NotFound => AppError::NotFound,
            StoreError::Timeout => AppError::Timeout,
            StoreError::Unavailable(detail) => AppError::StoreUnavailable(detail),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(_: NotifyError) -> Self {
        AppError::DeliveryDegraded
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
