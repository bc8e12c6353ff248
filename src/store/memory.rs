//! In-memory store used for local development and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    Account, CodePurpose, ConsumeEffect, ConsumeOutcome, CreateAccountOutcome, NewAccount, Store,
    VerificationCode,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    // normalized email -> account id
    emails: HashMap<String, Uuid>,
    codes: Vec<VerificationCode>,
}

/// Accounts and codes behind a single mutex, so consuming a code and mutating
/// its account are one critical section.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Remove an account by email; returns whether one existed.
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn remove_account(&self, email: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(id) = inner.emails.remove(email) else {
            return Ok(false);
        };
        inner.accounts.remove(&id);
        Ok(true)
    }

    /// Number of stored codes, including used and expired ones.
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn code_count(&self) -> Result<usize> {
        Ok(self.lock()?.codes.len())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<CreateAccountOutcome> {
        let mut inner = self.lock()?;
        if inner.emails.contains_key(&account.email) {
            return Ok(CreateAccountOutcome::Conflict);
        }

        let record = Account {
            id: Uuid::new_v4(),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            verified: false,
            created_at: now,
            updated_at: now,
        };
        inner.emails.insert(record.email.clone(), record.id);
        inner.accounts.insert(record.id, record.clone());

        Ok(CreateAccountOutcome::Created(record))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.lock()?;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    async fn insert_code(&self, code: VerificationCode) -> Result<()> {
        self.lock()?.codes.push(code);
        Ok(())
    }

    async fn latest_unused_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> Result<Option<VerificationCode>> {
        let inner = self.lock()?;
        Ok(inner
            .codes
            .iter()
            .filter(|code| code.email == email && code.purpose == purpose && !code.used)
            .max_by_key(|code| code.created_at)
            .cloned())
    }

    async fn discard_code(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(code) = inner.codes.iter_mut().find(|code| code.id == id) {
            code.used = true;
        }
        Ok(())
    }

    async fn consume_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        effect: ConsumeEffect,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let mut inner = self.lock()?;

        let is_match = |record: &VerificationCode| {
            record.email == email && record.code == code && record.purpose == purpose && !record.used
        };

        let Some(index) = inner
            .codes
            .iter()
            .position(|record| is_match(record) && record.is_valid_at(now))
        else {
            if inner.codes.iter().any(is_match) {
                return Ok(ConsumeOutcome::Expired);
            }
            return Ok(ConsumeOutcome::Invalid);
        };

        let Some(account_id) = inner.emails.get(email).copied() else {
            return Ok(ConsumeOutcome::AccountMissing);
        };
        let Some(account) = inner.accounts.get_mut(&account_id) else {
            return Ok(ConsumeOutcome::AccountMissing);
        };

        match effect {
            ConsumeEffect::MarkVerified => account.verified = true,
            ConsumeEffect::SetPasswordHash(hash) => account.password_hash = hash,
        }
        account.updated_at = now;
        let account = account.clone();

        inner.codes[index].used = true;

        Ok(ConsumeOutcome::Consumed(account))
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock()?;
        let before = inner.codes.len();
        inner.codes.retain(|code| code.expires_at > now);
        Ok(u64::try_from(before - inner.codes.len()).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use chrono::Duration;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Employee,
        }
    }

    fn code(email: &str, value: &str, purpose: CodePurpose, now: DateTime<Utc>) -> VerificationCode {
        VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: value.to_string(),
            purpose,
            used: false,
            expires_at: now + Duration::seconds(300),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn create_account_rejects_duplicate_email() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = store.create_account(new_account("a@x.com"), now).await?;
        assert!(matches!(first, CreateAccountOutcome::Created(ref account) if !account.verified));
        let second = store.create_account(new_account("a@x.com"), now).await?;
        assert!(matches!(second, CreateAccountOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn consume_marks_verified_once() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_account(new_account("a@x.com"), now).await?;
        store
            .insert_code(code("a@x.com", "123456", CodePurpose::EmailVerification, now))
            .await?;

        let outcome = store
            .consume_code(
                "a@x.com",
                "123456",
                CodePurpose::EmailVerification,
                ConsumeEffect::MarkVerified,
                now,
            )
            .await?;
        assert!(matches!(outcome, ConsumeOutcome::Consumed(ref account) if account.verified));

        let again = store
            .consume_code(
                "a@x.com",
                "123456",
                CodePurpose::EmailVerification,
                ConsumeEffect::MarkVerified,
                now,
            )
            .await?;
        assert!(matches!(again, ConsumeOutcome::Invalid));
        Ok(())
    }

    #[tokio::test]
    async fn consume_reports_expired_and_leaves_record() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_account(new_account("a@x.com"), now).await?;
        store
            .insert_code(code("a@x.com", "123456", CodePurpose::EmailVerification, now))
            .await?;

        let outcome = store
            .consume_code(
                "a@x.com",
                "123456",
                CodePurpose::EmailVerification,
                ConsumeEffect::MarkVerified,
                now + Duration::seconds(301),
            )
            .await?;
        assert!(matches!(outcome, ConsumeOutcome::Expired));
        assert_eq!(store.code_count()?, 1);
        let latest = store
            .latest_unused_code("a@x.com", CodePurpose::EmailVerification)
            .await?;
        assert!(latest.is_some_and(|code| !code.used));
        Ok(())
    }

    #[tokio::test]
    async fn consume_without_account_keeps_code_unused() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_code(code("ghost@x.com", "000111", CodePurpose::PasswordReset, now))
            .await?;

        let outcome = store
            .consume_code(
                "ghost@x.com",
                "000111",
                CodePurpose::PasswordReset,
                ConsumeEffect::SetPasswordHash("new".to_string()),
                now,
            )
            .await?;
        assert!(matches!(outcome, ConsumeOutcome::AccountMissing));
        let latest = store
            .latest_unused_code("ghost@x.com", CodePurpose::PasswordReset)
            .await?;
        assert!(latest.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn purpose_mismatch_is_invalid() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_account(new_account("a@x.com"), now).await?;
        store
            .insert_code(code("a@x.com", "654321", CodePurpose::PasswordReset, now))
            .await?;

        let outcome = store
            .consume_code(
                "a@x.com",
                "654321",
                CodePurpose::EmailVerification,
                ConsumeEffect::MarkVerified,
                now,
            )
            .await?;
        assert!(matches!(outcome, ConsumeOutcome::Invalid));
        Ok(())
    }

    #[tokio::test]
    async fn latest_unused_code_prefers_newest_and_skips_discarded() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        let older = code("a@x.com", "111111", CodePurpose::EmailVerification, now);
        let newer = code(
            "a@x.com",
            "222222",
            CodePurpose::EmailVerification,
            now + Duration::seconds(10),
        );
        let newer_id = newer.id;
        store.insert_code(older).await?;
        store.insert_code(newer).await?;

        let latest = store
            .latest_unused_code("a@x.com", CodePurpose::EmailVerification)
            .await?;
        assert_eq!(latest.map(|code| code.code), Some("222222".to_string()));

        store.discard_code(newer_id).await?;
        let latest = store
            .latest_unused_code("a@x.com", CodePurpose::EmailVerification)
            .await?;
        assert_eq!(latest.map(|code| code.code), Some("111111".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_expired_codes() -> Result<()> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_code(code("a@x.com", "111111", CodePurpose::EmailVerification, now))
            .await?;
        store
            .insert_code(code(
                "b@x.com",
                "222222",
                CodePurpose::EmailVerification,
                now + Duration::seconds(120),
            ))
            .await?;

        let purged = store.purge_expired_codes(now + Duration::seconds(300)).await?;
        assert_eq!(purged, 1);
        assert_eq!(store.code_count()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn remove_account_drops_email_index() -> Result<()> {
        let store = MemoryStore::new();
        store.create_account(new_account("a@x.com"), Utc::now()).await?;
        assert!(store.remove_account("a@x.com")?);
        assert!(store.find_account_by_email("a@x.com").await?.is_none());
        assert!(!store.remove_account("a@x.com")?);
        Ok(())
    }
}
