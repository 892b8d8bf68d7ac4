use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::pager::PagerError;
use crate::store::StoreError;
use crate::token::TokenError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("please log in again")]
    Unauthorized,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("permission denied")]
    PermissionDenied,
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("list changed while loading, please retry")]
    StalePage,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PagerError> for AppError {
    fn from(e: PagerError) -> Self {
        match e {
            PagerError::InvalidPage | PagerError::InvalidPageSize => {
                AppError::Validation(e.to_string())
            }
            PagerError::FetchFailed(e) => AppError::Store(e),
            PagerError::Superseded => AppError::StalePage,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {e}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Unauthorized | AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED)
            }
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::StalePage => (StatusCode::CONFLICT, error_codes::STALE_PAGE),
            AppError::Store(StoreError::InvalidDocument(_)) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
            }
            AppError::Store(StoreError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, error_codes::INTERNAL_ERROR)
            }
            AppError::Store(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            }
        };

        // Store and internal details stay in the log.
        let msg = match &self {
            AppError::Store(StoreError::InvalidDocument(_)) => self.to_string(),
            AppError::Store(StoreError::Unavailable(_)) => {
                tracing::error!("{}", self);
                "service temporarily unavailable".to_string()
            }
            AppError::Store(_) | AppError::Internal(_) => {
                tracing::error!("{}", self);
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}
