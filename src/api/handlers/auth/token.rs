//! HS256 bearer tokens issued on login and email verification.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::state::MAX_TOKEN_TTL_SECONDS;
use crate::store::{Account, Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl TokenKeys {
    /// `ttl_seconds` is clamped to `1..=MAX_TOKEN_TTL_SECONDS`.
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            ttl_seconds: ttl_seconds.clamp(1, MAX_TOKEN_TTL_SECONDS),
        }
    }

    /// Sign a token for `account` valid from `now` for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<String> {
        let exp = now
            .checked_add_signed(Duration::seconds(self.ttl_seconds))
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            role: account.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")
    }

    /// Check signature and expiry.
    ///
    /// # Errors
    /// Returns the `jsonwebtoken` error for bad signatures, malformed or expired tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_verifies() -> Result<()> {
        let keys = TokenKeys::new(&SecretString::from("test-secret".to_string()), 3600);
        let account = account();
        let token = keys.issue(&account, Utc::now())?;
        let claims = keys.verify(&token)?;
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
        Ok(())
    }

    #[test]
    fn oversized_ttl_is_capped() -> Result<()> {
        let keys = TokenKeys::new(&SecretString::from("test-secret".to_string()), i64::MAX);
        assert_eq!(keys.ttl_seconds(), MAX_TOKEN_TTL_SECONDS);
        let claims = keys.verify(&keys.issue(&account(), Utc::now())?)?;
        assert_eq!(claims.exp - claims.iat, MAX_TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let keys = TokenKeys::new(&SecretString::from("test-secret".to_string()), 60);
        let token = keys.issue(&account(), Utc::now() - Duration::seconds(120))?;
        assert!(keys.verify(&token).is_err());
        Ok(())
    }

    #[test]
    fn foreign_signature_is_rejected() -> Result<()> {
        let ours = TokenKeys::new(&SecretString::from("test-secret".to_string()), 60);
        let theirs = TokenKeys::new(&SecretString::from("other-secret".to_string()), 60);
        let token = theirs.issue(&account(), Utc::now())?;
        assert!(ours.verify(&token).is_err());
        assert!(ours.verify("not.a.token").is_err());
        Ok(())
    }
}
