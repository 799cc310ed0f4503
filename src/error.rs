use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{accounts::AccountError, models::Notification, provider::ProviderError};

/// AppError
///
/// Every failure a handler can report. Each maps to one status code and a
/// JSON body carrying a stable `code` and the notification to show.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,

    #[error("resource {0} is not registered")]
    UnknownResource(String),

    #[error("records of {0} cannot be deleted")]
    DeleteNotAllowed(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Account(#[from] AccountError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    notification: Notification,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownResource(_) => StatusCode::NOT_FOUND,
            Self::DeleteNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Account(error) => match error {
                AccountError::InvalidEmail | AccountError::WeakPassword => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AccountError::AlreadyExists => StatusCode::CONFLICT,
                AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AccountError::Hashing(_) | AccountError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::UnknownResource(_) => "not_found",
            Self::DeleteNotAllowed(_) => "forbidden",
            Self::Provider(_) => "request_failed",
            Self::Account(AccountError::InvalidEmail | AccountError::WeakPassword) => {
                "invalid_input"
            }
            Self::Account(AccountError::AlreadyExists) => "conflict",
            Self::Account(AccountError::InvalidCredentials) => "invalid_credentials",
            Self::Account(_) => "internal",
        }
    }

    fn notification(&self) -> Notification {
        match self {
            Self::Provider(error) => Notification::error(
                format!("Error ({})", error.status.map_or("network".to_string(), |s| s.to_string())),
                format!("Could not {} {}", error.operation, error.resource),
            ),
            Self::Account(AccountError::Hashing(_) | AccountError::Token(_)) => {
                Notification::error("Something went wrong", "Please try again")
            }
            other => Notification::error("Error", other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Internal details stay in the log.
        let message = match &self {
            Self::Account(AccountError::Hashing(_) | AccountError::Token(_)) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            code: self.code(),
            message,
            notification: self.notification(),
        };
        (status, Json(body)).into_response()
    }
}
