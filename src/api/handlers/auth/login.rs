//! Password login.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::info;

use super::error::AuthError;
use super::state::AuthState;
use super::types::{AccountResponse, AuthResponse, LoginRequest, MessageResponse};
use super::utils::{normalize_email, require_payload, verify_password};
use crate::store::Store;

/// Exchange email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = MessageResponse),
        (status = 401, description = "Invalid email or password", body = MessageResponse),
        (status = 403, description = "Email not verified", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, AuthError> {
    let request = require_payload(payload)?;
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(AuthError::validation("Email and password are required"));
    }

    let Some(account) = store.find_account_by_email(&email).await? else {
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(&request.password, &account.password_hash).await? {
        return Err(AuthError::InvalidCredentials);
    }

    // Only reported once the password matched, so it does not reveal accounts.
    if !account.verified {
        return Err(AuthError::EmailNotVerified);
    }

    let token = auth_state
        .tokens()
        .issue(&account, auth_state.otp().clock().now())?;
    info!(account_id = %account.id, "login succeeded");

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            message: "Login successful".to_string(),
            token,
            account: AccountResponse::from(&account),
        }),
    ))
}
