//! Account authentication: signup, login, email verification, password reset
//! and the bearer-token gate.
//!
//! Flow Overview:
//! 1) `register` creates an unverified account and sends a verification code.
//! 2) `verify-email` consumes the code, marks the account verified and returns a token.
//! 3) `login` returns a token for verified accounts only.
//! 4) `forgot-password`/`reset-password` replace the password through a reset code.

pub mod error;
pub mod login;
pub mod password_reset;
pub mod principal;
pub mod register;
pub mod state;
pub mod token;
pub mod types;
pub(crate) mod utils;
pub mod verification;


pub use error::AuthError;
pub use principal::{require_account, require_auth, Principal};
pub use state::{AuthConfig, AuthState};
