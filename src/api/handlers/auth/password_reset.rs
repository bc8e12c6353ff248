//! Password reset through an emailed code.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::AuthError;
use super::state::AuthState;
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest};
use super::utils::{check_password, hash_password, require_email, require_payload};
use crate::otp::{code::is_well_formed, OtpError};
use crate::store::{CodePurpose, ConsumeEffect, Store};

pub(crate) const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a password reset code has been sent.";

/// Send a password reset code.
///
/// The body is the same whether or not the email is registered, including when
/// a previous code is still cooling down.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Invalid email", body = MessageResponse),
        (status = 500, description = "Code could not be delivered", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let email = require_email(&request.email)?;

    if let Some(account) = store.find_account_by_email(&email).await? {
        match auth_state
            .otp()
            .issue(&email, CodePurpose::PasswordReset)
            .await
        {
            Ok(_) => info!(account_id = %account.id, "password reset code issued"),
            Err(OtpError::RateLimited {
                retry_after_seconds,
            }) => debug!(
                account_id = %account.id,
                retry_after_seconds,
                "password reset code still cooling down"
            ),
            Err(err) => return Err(err.into()),
        }
    } else {
        debug!("forgot-password for unknown email ignored");
    }

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)),
    ))
}

/// Consume a password reset code and replace the password.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid input, invalid or expired code", body = MessageResponse),
        (status = 404, description = "No account for this email", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let email = require_email(&request.email)?;
    let code = request.code.trim();
    if !is_well_formed(code) {
        return Err(OtpError::MalformedCode.into());
    }
    check_password(&request.new_password)?;

    let password_hash =
        hash_password(&request.new_password, auth_state.config().bcrypt_cost()).await?;

    let account = auth_state
        .otp()
        .consume(
            &email,
            code,
            CodePurpose::PasswordReset,
            ConsumeEffect::SetPasswordHash(password_hash),
        )
        .await?;
    info!(account_id = %account.id, "password reset");

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password has been reset")),
    ))
}
