//! Persistence for accounts and one-time codes.
//!
//! Handlers and the OTP workflow only see the `Store` trait. The server picks
//! `MemoryStore` when no DSN is configured and `PgStore` otherwise, wraps it in
//! an `Arc<dyn Store>` and injects it as an axum extension.

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{
    Account, CodePurpose, ConsumeEffect, ConsumeOutcome, NewAccount, Role, VerificationCode,
};
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub enum CreateAccountOutcome {
    Created(Account),
    /// Another account already owns the email.
    Conflict,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new unverified account stamped with `now`.
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<CreateAccountOutcome>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    async fn insert_code(&self, code: VerificationCode) -> Result<()>;

    /// Most recently created unused code for the email and purpose, expired or not.
    async fn latest_unused_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>>;

    /// Mark a code used without touching any account.
    async fn discard_code(&self, id: Uuid) -> Result<()>;

    /// Atomically flip a matching unused, unexpired code to used and apply the
    /// effect to the account owning the email.
    async fn consume_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        effect: ConsumeEffect,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome>;

    /// Delete every code whose expiry is at or before `now`; returns the count.
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> Result<()>;
}
