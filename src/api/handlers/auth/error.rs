//! Handler-boundary error taxonomy.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use super::types::MessageResponse;
use crate::otp::OtpError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    AlreadyRegistered,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code expired")]
    ExpiredCode,
    #[error("A code was sent recently. Try again in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Account not found")]
    NotFound,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Failed to send verification code")]
    DeliveryFailed,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::AlreadyRegistered
            | Self::InvalidCode
            | Self::ExpiredCode => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryFailed | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<OtpError> for AuthError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::MalformedCode => Self::validation("Code must be exactly 6 digits"),
            OtpError::RateLimited {
                retry_after_seconds,
            } => Self::RateLimited {
                retry_after_seconds,
            },
            OtpError::InvalidCode => Self::InvalidCode,
            OtpError::ExpiredCode => Self::ExpiredCode,
            OtpError::AccountNotFound => Self::NotFound,
            // Already logged by the OTP service.
            OtpError::DeliveryFailed(_) => Self::DeliveryFailed,
            OtpError::Store(err) => Self::Unexpected(err),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unexpected(err) => {
                error!("unexpected error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(MessageResponse { message })).into_response();
        if let Self::RateLimited {
            retry_after_seconds,
        } = self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }
        response
    }
}
