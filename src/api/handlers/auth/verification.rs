//! Email verification endpoints.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::AuthError;
use super::state::AuthState;
use super::types::{
    AccountResponse, AuthResponse, MessageResponse, SendCodeRequest, VerifyEmailRequest,
};
use super::utils::{require_email, require_payload};
use crate::store::{CodePurpose, ConsumeEffect, Store};

pub(crate) const SEND_CODE_MESSAGE: &str =
    "If the account exists and is not verified yet, a verification code has been sent.";

/// Send a new email verification code.
///
/// Unknown and already verified emails get the same 200 body as a real send.
/// An unverified account still inside its cooldown gets 429 with
/// `Retry-After`, so a resend does reveal that the account exists. Unlike
/// `forgot_password`, the cooldown is not hidden.
#[utoipa::path(
    post,
    path = "/v1/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Invalid email", body = MessageResponse),
        (status = 429, description = "A code was sent recently", body = MessageResponse),
        (status = 500, description = "Code could not be delivered", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn send_code(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    payload: Option<Json<SendCodeRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let email = require_email(&request.email)?;

    match store.find_account_by_email(&email).await? {
        Some(account) if !account.verified => {
            auth_state
                .otp()
                .issue(&email, CodePurpose::EmailVerification)
                .await?;
            info!(account_id = %account.id, "verification code issued");
        }
        Some(_) => debug!("send-code for verified account ignored"),
        None => debug!("send-code for unknown email ignored"),
    }

    Ok((StatusCode::OK, Json(MessageResponse::new(SEND_CODE_MESSAGE))))
}

/// Consume an email verification code and mark the account verified.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = AuthResponse),
        (status = 400, description = "Invalid or expired code", body = MessageResponse),
        (status = 404, description = "No account for this email", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let email = require_email(&request.email)?;

    let account = auth_state
        .otp()
        .consume(
            &email,
            request.code.trim(),
            CodePurpose::EmailVerification,
            ConsumeEffect::MarkVerified,
        )
        .await?;
    info!(account_id = %account.id, "email verified");

    let token = auth_state
        .tokens()
        .issue(&account, auth_state.otp().clock().now())?;

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            message: "Email verified".to_string(),
            token,
            account: AccountResponse::from(&account),
        }),
    ))
}
