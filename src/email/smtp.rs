//! SMTP sender used when `--smtp-host` is configured.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, info_span, Instrument};

use super::{CodeMessage, CodeSender};

#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 for implicit TLS, 587 for STARTTLS.
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Mailbox used in the `From` header, e.g. `Staffgate <no-reply@staffgate.dev>`.
    pub from: String,
}

pub struct SmtpCodeSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpCodeSender {
    /// Build the transport. No connection is made until the first send.
    ///
    /// # Errors
    /// Returns an error if the host cannot be used as a TLS relay or the
    /// `from` mailbox does not parse.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("Invalid from address: {}", config.from))?;

        let mut builder = SmtpTransport::relay(&config.host)
            .with_context(|| format!("Failed to create SMTP transport for {}", config.host))?
            .port(config.port);

        match (config.username, config.password) {
            (Some(username), Some(password)) => {
                builder = builder.credentials(Credentials::new(
                    username,
                    password.expose_secret().to_string(),
                ));
            }
            (None, None) => {}
            _ => return Err(anyhow!("SMTP username and password must be set together")),
        }

        info!(host = %config.host, port = config.port, "SMTP sender configured");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl CodeSender for SmtpCodeSender {
    async fn send(&self, message: &CodeMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .with_context(|| format!("Invalid to address: {}", message.to))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body())
            .context("Failed to build email")?;

        // lettre's SmtpTransport is blocking; keep it off the runtime threads.
        let transport = self.transport.clone();
        let span = info_span!("smtp.send", purpose = %message.purpose);
        tokio::task::spawn_blocking(move || transport.send(&email))
            .instrument(span)
            .await
            .context("SMTP send task failed")?
            .context("Failed to send email")?;

        info!(to_email = %message.to, purpose = %message.purpose, "code email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from: from.to_string(),
        }
    }

    #[test]
    fn new_accepts_named_from_mailbox() {
        assert!(SmtpCodeSender::new(config("Staffgate <no-reply@staffgate.dev>")).is_ok());
    }

    #[test]
    fn new_rejects_invalid_from() {
        assert!(SmtpCodeSender::new(config("not an address")).is_err());
    }

    #[test]
    fn new_requires_both_credentials() {
        let mut config = config("no-reply@staffgate.dev");
        config.username = Some("mailer".to_string());
        assert!(SmtpCodeSender::new(config).is_err());
    }
}
