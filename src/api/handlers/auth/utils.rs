//! Small helpers for auth input validation and password hashing.

use anyhow::{Context, Result};
use axum::Json;
use regex::Regex;

use super::error::AuthError;

pub(crate) const MIN_PASSWORD_BYTES: usize = 8;
// bcrypt ignores everything past 72 bytes.
pub(crate) const MAX_PASSWORD_BYTES: usize = 72;
const MAX_NAME_CHARS: usize = 100;

/// Unwrap an optional JSON body; absent or undecodable bodies are a 400.
pub(crate) fn require_payload<T>(payload: Option<Json<T>>) -> Result<T, AuthError> {
    payload
        .map(|Json(payload)| payload)
        .ok_or_else(|| AuthError::validation("Missing payload"))
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn require_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::validation("Invalid email address"))
    }
}

pub(crate) fn require_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::validation("Name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AuthError::validation(format!(
            "Name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn check_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_BYTES {
        return Err(AuthError::validation(format!(
            "Password must be at least {MIN_PASSWORD_BYTES} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Hash on the blocking pool; bcrypt at cost 12 takes a few hundred milliseconds.
pub(crate) async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")
}

pub(crate) async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")?
        .context("failed to verify password")
}
