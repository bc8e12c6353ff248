//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{Account, Role};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Public view of an account; never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            verified: account.verified,
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub message: String,
    pub account: AccountResponse,
    /// False when the verification code could not be delivered; use send-code.
    pub code_sent: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub account: AccountResponse,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SendCodeRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn account_response_omits_password_hash() -> Result<()> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@x.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Manager,
            verified: true,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(AccountResponse::from(&account))?;
        assert!(value.get("password_hash").is_none());
        let role = value
            .get("role")
            .and_then(serde_json::Value::as_str)
            .context("missing role")?;
        assert_eq!(role, "manager");
        Ok(())
    }

    #[test]
    fn reset_request_uses_snake_case_fields() -> Result<()> {
        let request: ResetPasswordRequest = serde_json::from_str(
            r#"{"email":"ada@x.com","code":"123456","new_password":"hunter22"}"#,
        )?;
        assert_eq!(request.new_password, "hunter22");
        Ok(())
    }
}
