//! Account signup.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::AuthError;
use super::state::AuthState;
use super::types::{AccountResponse, MessageResponse, RegisterRequest, RegisterResponse};
use super::utils::{check_password, hash_password, require_email, require_name, require_payload};
use crate::otp::OtpError;
use crate::store::{CodePurpose, CreateAccountOutcome, NewAccount, Role, Store};

/// Create an unverified account and send an email verification code.
///
/// The account is kept even when the code cannot be delivered; the client then
/// asks for a new one through `send-code`.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input or email already registered", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let name = require_name(&request.name)?;
    let email = require_email(&request.email)?;
    check_password(&request.password)?;

    let password_hash =
        hash_password(&request.password, auth_state.config().bcrypt_cost()).await?;

    let now = auth_state.otp().clock().now();
    let account = match store
        .create_account(
            NewAccount {
                name,
                email: email.clone(),
                password_hash,
                role: Role::Employee,
            },
            now,
        )
        .await?
    {
        CreateAccountOutcome::Created(account) => account,
        CreateAccountOutcome::Conflict => return Err(AuthError::AlreadyRegistered),
    };
    info!(account_id = %account.id, "account registered");

    let code_sent = match auth_state
        .otp()
        .issue(&email, CodePurpose::EmailVerification)
        .await
    {
        Ok(outcome) => outcome.delivered,
        Err(OtpError::RateLimited { .. }) => {
            // Leftover code from an earlier account with the same email.
            warn!(account_id = %account.id, "verification code still cooling down");
            false
        }
        Err(err) => {
            error!(account_id = %account.id, "failed to issue verification code: {err}");
            false
        }
    };

    let message = if code_sent {
        "Account created. Check your email for the verification code."
    } else {
        "Account created, but the verification code could not be sent. Request a new code."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: message.to_string(),
            account: AccountResponse::from(&account),
            code_sent,
        }),
    ))
}
