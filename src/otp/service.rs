//! Issue and consume one-time codes.
//!
//! Issuance checks the cooldown against the newest unused code for the same
//! email and purpose, persists a fresh code and awaits delivery under a
//! timeout. Consumption delegates to `Store::consume_code`, which flips the
//! code to used and applies the account effect in one atomic step.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::code::{generate_code, is_well_formed};
use crate::email::{CodeMessage, CodeSender};
use crate::store::{
    Account, CodePurpose, ConsumeEffect, ConsumeOutcome, Store, VerificationCode,
};

const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_DELIVERY_TIMEOUT_SECONDS: u64 = 10;
pub const MAX_CODE_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const MAX_COOLDOWN_SECONDS: i64 = 24 * 60 * 60;

/// Deployment environment; decides what a failed delivery means.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            _ => Err(format!("invalid environment: {value}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OtpConfig {
    code_ttl_seconds: i64,
    cooldown_seconds: i64,
    delivery_timeout: Duration,
    environment: Environment,
}

impl OtpConfig {
    /// Defaults: 5 minute codes, 60 second cooldown, 10 second delivery timeout.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECONDS),
            environment,
        }
    }

    /// Clamped to `1..=MAX_CODE_TTL_SECONDS`.
    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds.clamp(1, MAX_CODE_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.cooldown_seconds = seconds.clamp(0, MAX_COOLDOWN_SECONDS);
        self
    }

    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    #[must_use]
    pub fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssueOutcome {
    pub expires_at: DateTime<Utc>,
    /// False only in development when delivery failed and the code was logged.
    pub delivered: bool,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("code must be exactly 6 digits")]
    MalformedCode,
    #[error("a code was sent recently; retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("invalid verification code")]
    InvalidCode,
    #[error("verification code expired")]
    ExpiredCode,
    #[error("no account for this email")]
    AccountNotFound,
    #[error("code delivery failed: {0}")]
    DeliveryFailed(anyhow::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct OtpService {
    store: Arc<dyn Store>,
    sender: Arc<dyn CodeSender>,
    clock: Arc<dyn Clock>,
    config: OtpConfig,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        sender: Arc<dyn CodeSender>,
        clock: Arc<dyn Clock>,
        config: OtpConfig,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a fresh code for `email` and deliver it.
    ///
    /// `email` is expected to be normalized already.
    ///
    /// # Errors
    /// `RateLimited` inside the cooldown window, `DeliveryFailed` when delivery
    /// fails in production, `Store` on persistence failures.
    pub async fn issue(&self, email: &str, purpose: CodePurpose) -> Result<IssueOutcome, OtpError> {
        let now = self.clock.now();

        if let Some(latest) = self.store.latest_unused_code(email, purpose).await? {
            if let Some(retry_after_seconds) = self.cooldown_remaining(&latest, now) {
                info!(%purpose, retry_after_seconds, "code issuance refused by cooldown");
                return Err(OtpError::RateLimited {
                    retry_after_seconds,
                });
            }
        }

        let code = generate_code();
        let expires_at = now + ChronoDuration::seconds(self.config.code_ttl_seconds);
        let record = VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: code.clone(),
            purpose,
            used: false,
            expires_at,
            created_at: now,
        };
        let code_id = record.id;
        self.store.insert_code(record).await?;

        let message = CodeMessage::new(email, &code, purpose, self.config.code_ttl_seconds);
        let delivery =
            match tokio::time::timeout(self.config.delivery_timeout, self.sender.send(&message))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "delivery timed out after {}s",
                    self.config.delivery_timeout.as_secs()
                )),
            };

        let Err(err) = delivery else {
            return Ok(IssueOutcome {
                expires_at,
                delivered: true,
            });
        };

        match self.config.environment {
            Environment::Development => {
                warn!(
                    to_email = %email,
                    %purpose,
                    %code,
                    error = %err,
                    "code delivery failed; use the logged code"
                );
                Ok(IssueOutcome {
                    expires_at,
                    delivered: false,
                })
            }
            Environment::Production => {
                // An undelivered code must neither verify nor hold the cooldown.
                self.store.discard_code(code_id).await?;
                error!(%purpose, error = %err, "code delivery failed");
                Err(OtpError::DeliveryFailed(err))
            }
        }
    }

    /// Consume `code` and apply `effect` to the account owning `email`.
    ///
    /// # Errors
    /// `MalformedCode`, `InvalidCode`, `ExpiredCode`, `AccountNotFound`, or
    /// `Store` on persistence failures.
    pub async fn consume(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        effect: ConsumeEffect,
    ) -> Result<Account, OtpError> {
        if !is_well_formed(code) {
            return Err(OtpError::MalformedCode);
        }

        let now = self.clock.now();
        match self
            .store
            .consume_code(email, code, purpose, effect, now)
            .await?
        {
            ConsumeOutcome::Consumed(account) => Ok(account),
            ConsumeOutcome::Expired => Err(OtpError::ExpiredCode),
            ConsumeOutcome::Invalid => Err(OtpError::InvalidCode),
            ConsumeOutcome::AccountMissing => Err(OtpError::AccountNotFound),
        }
    }

    fn cooldown_remaining(&self, latest: &VerificationCode, now: DateTime<Utc>) -> Option<u64> {
        if !latest.is_valid_at(now) {
            return None;
        }
        let remaining =
            ChronoDuration::seconds(self.config.cooldown_seconds) - (now - latest.created_at);
        if remaining <= ChronoDuration::zero() {
            return None;
        }
        let millis = remaining.num_milliseconds();
        let seconds = (millis + 999) / 1000;
        Some(u64::try_from(seconds.max(1)).unwrap_or(1))
    }
}
