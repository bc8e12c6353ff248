use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{CodeMessage, CodeSender};

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, message: &CodeMessage) -> Result<()> {
        info!(
            to_email = %message.to,
            purpose = %message.purpose,
            code = %message.code,
            subject = message.subject(),
            "code delivery stub"
        );
        Ok(())
    }
}
