//! Bearer-token gate for protected routes.
//!
//! Reads `Authorization: Bearer <jwt>`, checks signature and expiry, and makes
//! sure the account still exists. Role and email come from the stored account,
//! not the token, so role changes apply without re-login.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::debug;
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use crate::store::{Account, Role, Store};

#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub role: Role,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the bearer token into the stored account it was issued for.
///
/// # Errors
/// `Unauthorized` for missing, malformed, forged or expired tokens and for
/// accounts that no longer exist.
pub async fn require_account(
    headers: &HeaderMap,
    auth_state: &AuthState,
    store: &dyn Store,
) -> Result<Account, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;

    let claims = auth_state.tokens().verify(token).map_err(|err| {
        debug!("rejected bearer token: {err}");
        AuthError::Unauthorized
    })?;

    let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)?;

    store
        .find_account_by_id(account_id)
        .await?
        .ok_or(AuthError::Unauthorized)
}

/// Resolve the bearer token into the caller's identity.
///
/// # Errors
/// Same as [`require_account`].
pub async fn require_auth(
    headers: &HeaderMap,
    auth_state: &AuthState,
    store: &dyn Store,
) -> Result<Principal, AuthError> {
    let account = require_account(headers, auth_state, store).await?;
    Ok(Principal {
        account_id: account.id,
        email: account.email,
        role: account.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[tokio::test]
    async fn require_auth_reads_identity_from_store() -> anyhow::Result<()> {
        use super::super::AuthConfig;
        use crate::email::LogCodeSender;
        use crate::otp::{OtpConfig, OtpService, SystemClock};
        use crate::store::{CreateAccountOutcome, MemoryStore, NewAccount};
        use chrono::Utc;
        use secrecy::SecretString;
        use std::sync::Arc;

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let CreateAccountOutcome::Created(account) = store
            .create_account(
                NewAccount {
                    name: "Ada".to_string(),
                    email: "ada@x.com".to_string(),
                    password_hash: "hash".to_string(),
                    role: Role::Admin,
                },
                Utc::now(),
            )
            .await?
        else {
            anyhow::bail!("unexpected conflict");
        };
        let auth_state = AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()),
            OtpService::new(
                store.clone(),
                Arc::new(LogCodeSender),
                Arc::new(SystemClock),
                OtpConfig::default(),
            ),
            &SecretString::from("principal-test-secret".to_string()),
        );

        let mut headers = HeaderMap::new();
        assert!(matches!(
            require_auth(&headers, &auth_state, store.as_ref()).await,
            Err(AuthError::Unauthorized)
        ));

        let token = auth_state.tokens().issue(&account, Utc::now())?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        let principal = require_auth(&headers, &auth_state, store.as_ref())
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(principal.account_id, account.id);
        assert_eq!(principal.email, "ada@x.com");
        assert_eq!(principal.role, Role::Admin);
        Ok(())
    }
}
