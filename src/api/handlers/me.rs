//! Authenticated self-service endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::auth::{
    require_account,
    types::{AccountResponse, MessageResponse},
    AuthError, AuthState,
};
use crate::store::Store;

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Return the authenticated account profile.", body = AccountResponse),
        (status = 401, description = "Missing, invalid or expired bearer token.", body = MessageResponse),
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn get_me(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AuthError> {
    let account = require_account(&headers, &auth_state, store.0.as_ref()).await?;

    Ok((StatusCode::OK, Json(AccountResponse::from(&account))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::LogCodeSender;
    use crate::otp::{OtpConfig, OtpService, SystemClock};
    use crate::store::{
        Account, CodePurpose, ConsumeEffect, ConsumeOutcome, CreateAccountOutcome, MemoryStore,
        NewAccount, Role, VerificationCode,
    };
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use chrono::{DateTime, Utc};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    // Counts id lookups and forwards everything to the memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        id_lookups: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn create_account(
            &self,
            account: NewAccount,
            now: DateTime<Utc>,
        ) -> Result<CreateAccountOutcome> {
            self.inner.create_account(account, now).await
        }

        async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
            self.inner.find_account_by_email(email).await
        }

        async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
            self.id_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_account_by_id(id).await
        }

        async fn insert_code(&self, code: VerificationCode) -> Result<()> {
            self.inner.insert_code(code).await
        }

        async fn latest_unused_code(
            &self,
            email: &str,
            purpose: CodePurpose,
        ) -> Result<Option<VerificationCode>> {
            self.inner.latest_unused_code(email, purpose).await
        }

        async fn discard_code(&self, id: Uuid) -> Result<()> {
            self.inner.discard_code(id).await
        }

        async fn consume_code(
            &self,
            email: &str,
            code: &str,
            purpose: CodePurpose,
            effect: ConsumeEffect,
            now: DateTime<Utc>,
        ) -> Result<ConsumeOutcome> {
            self.inner
                .consume_code(email, code, purpose, effect, now)
                .await
        }

        async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64> {
            self.inner.purge_expired_codes(now).await
        }

        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn profile_loads_account_once() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let outcome = store
            .create_account(
                NewAccount {
                    name: "Ada".to_string(),
                    email: "ada@x.com".to_string(),
                    password_hash: "hash".to_string(),
                    role: Role::Manager,
                },
                Utc::now(),
            )
            .await?;
        let CreateAccountOutcome::Created(account) = outcome else {
            bail!("unexpected conflict");
        };

        let dyn_store: Arc<dyn Store> = store.clone();
        let otp = OtpService::new(
            dyn_store.clone(),
            Arc::new(LogCodeSender),
            Arc::new(SystemClock),
            OtpConfig::default(),
        );
        let auth_state = Arc::new(AuthState::new(
            crate::api::handlers::auth::AuthConfig::new("http://localhost:3000".to_string()),
            otp,
            &SecretString::from("me-test-secret".to_string()),
        ));
        let token = auth_state.tokens().issue(&account, Utc::now())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let response = get_me(headers, Extension(auth_state), Extension(dyn_store))
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.id_lookups.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
