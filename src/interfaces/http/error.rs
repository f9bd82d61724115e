use crate::error::WalletError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A [`WalletError`] on its way out as an HTTP response.
///
/// Server-side failures are logged in full and answered with a generic message, so
/// storage details and provider responses never reach the client.
#[derive(Debug)]
pub struct ApiError(pub WalletError);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_attempts: Option<u32>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            WalletError::ValidationError(_)
            | WalletError::NotFound
            | WalletError::Expired
            | WalletError::LockedOut
            | WalletError::Mismatch { .. }
            | WalletError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            WalletError::Unauthorized => StatusCode::UNAUTHORIZED,
            WalletError::AccountNotFound(_) | WalletError::PaymentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            WalletError::AccountExists(_)
            | WalletError::InvalidTransition { .. }
            | WalletError::AlreadyEnrolled(_) => StatusCode::CONFLICT,
            WalletError::ProviderError(_)
            | WalletError::ConfigError(_)
            | WalletError::Conflict(_)
            | WalletError::StorageError(_)
            | WalletError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match &self.0 {
            WalletError::ProviderError(_) => "Failed to send OTP".to_string(),
            WalletError::ConfigError(_) => "OTP delivery is not configured".to_string(),
            WalletError::Conflict(_) | WalletError::StorageError(_) | WalletError::InternalError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(WalletError::ValidationError(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(WalletError::ValidationError(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(WalletError::ValidationError(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        }
        let remaining_attempts = match &self.0 {
            WalletError::Mismatch { remaining_attempts } => Some(*remaining_attempts),
            WalletError::LockedOut => Some(0),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.public_message(),
            error_code: self.0.code(),
            remaining_attempts,
        };
        (status, Json(body)).into_response()
    }
}
