//! Delivery of one-time codes.
//!
//! The OTP workflow hands a `CodeMessage` to a `CodeSender` and awaits it
//! under a timeout. An `Err` (or the timeout) is a delivery failure; what
//! happens next depends on the environment, see `otp::OtpService::issue`.
//!
//! `LogCodeSender` is the local development default and only logs. With an
//! SMTP host configured the server uses `SmtpCodeSender` instead.

pub mod log;
pub mod smtp;

pub use log::LogCodeSender;
pub use smtp::{SmtpCodeSender, SmtpConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::store::CodePurpose;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeMessage {
    pub to: String,
    pub code: String,
    pub purpose: CodePurpose,
    pub ttl_seconds: i64,
}

impl CodeMessage {
    #[must_use]
    pub fn new(to: &str, code: &str, purpose: CodePurpose, ttl_seconds: i64) -> Self {
        Self {
            to: to.to_string(),
            code: code.to_string(),
            purpose,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &'static str {
        match self.purpose {
            CodePurpose::EmailVerification => "Your verification code",
            CodePurpose::PasswordReset => "Password reset code",
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        let action = match self.purpose {
            CodePurpose::EmailVerification => "verify your email address",
            CodePurpose::PasswordReset => "reset your password",
        };
        // Round up so a 90 second window never reads as "1 minute".
        let minutes = (self.ttl_seconds.max(1) + 59) / 60;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!(
            "Your code is: {}\n\n\
             Enter this code to {action}. It expires in {minutes} {unit}.\n\n\
             If you didn't request this, you can safely ignore this email.",
            self.code
        )
    }
}

/// Delivery capability used by the OTP workflow.
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Deliver the message or return an error describing why it was not sent.
    async fn send(&self, message: &CodeMessage) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_depends_on_purpose() {
        let verify = CodeMessage::new("a@x.com", "012345", CodePurpose::EmailVerification, 300);
        let reset = CodeMessage::new("a@x.com", "012345", CodePurpose::PasswordReset, 300);
        assert_ne!(verify.subject(), reset.subject());
    }

    #[test]
    fn body_carries_code_and_expiry() {
        let message = CodeMessage::new("a@x.com", "012345", CodePurpose::PasswordReset, 300);
        let body = message.body();
        assert!(body.contains("012345"));
        assert!(body.contains("reset your password"));
        assert!(body.contains("5 minutes"));

        let short = CodeMessage::new("a@x.com", "012345", CodePurpose::EmailVerification, 45);
        assert!(short.body().contains("1 minute."));
    }
}
