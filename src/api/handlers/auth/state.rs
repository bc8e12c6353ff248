//! Auth state and configuration.

use secrecy::SecretString;

use super::token::TokenKeys;
use crate::otp::OtpService;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
const DEFAULT_BCRYPT_COST: u32 = 12;
pub(crate) const MIN_BCRYPT_COST: u32 = 10;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_ttl_seconds: i64,
    bcrypt_cost: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Clamped to `1..=MAX_TOKEN_TTL_SECONDS`.
    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds.clamp(1, MAX_TOKEN_TTL_SECONDS);
        self
    }

    /// Costs below 10 are raised to 10.
    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_unchecked_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

pub struct AuthState {
    config: AuthConfig,
    otp: OtpService,
    tokens: TokenKeys,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, otp: OtpService, jwt_secret: &SecretString) -> Self {
        let tokens = TokenKeys::new(jwt_secret, config.token_ttl_seconds());
        Self {
            config,
            otp,
            tokens,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }
}
