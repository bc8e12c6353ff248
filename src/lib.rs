//! # Staffgate (Employee Management Authentication)
//!
//! `staffgate` is the authentication authority behind the employee-management
//! application. It owns accounts, signup email verification, password login,
//! and password reset, and it gates protected routes with bearer tokens.
//!
//! ## One-Time Codes
//!
//! Verification and reset both use six-digit codes delivered by email.
//!
//! - **Expiry:** Codes are valid for a short window (5 minutes by default) and
//!   are evicted by a background sweeper once expired.
//! - **Cooldown:** A new code for the same email and purpose is refused while the
//!   previous unused one is younger than the cooldown (60 seconds by default).
//! - **Single use:** Consuming a code and applying its effect on the account
//!   (mark verified, replace the password hash) happen in one atomic store step.
//! - **Purpose:** Codes are issued for either email verification or password
//!   reset, and a code only verifies the flow it was issued for.
//!
//! ## Delivery
//!
//! In `development` a failed delivery is logged together with the code and the
//! request still succeeds. In `production` the failure is returned to the caller
//! and the undelivered code is discarded.
//!
//! ## Storage
//!
//! Without `--dsn` the service runs on an in-memory store. With a Postgres DSN
//! the schema in `db/sql/01_staffgate.sql` is applied on startup.

pub mod api;
pub mod cli;
pub mod email;
pub mod otp;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
