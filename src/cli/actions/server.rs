use crate::{
    api::{self, handlers::auth::AuthConfig},
    email::{CodeSender, LogCodeSender, SmtpCodeSender, SmtpConfig},
    otp::{Environment, OtpConfig},
};
use anyhow::{bail, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub frontend_base_url: String,
    pub code_ttl_seconds: i64,
    pub code_cooldown_seconds: i64,
    pub code_sweep_seconds: u64,
    pub delivery_timeout_seconds: u64,
    pub smtp: Option<SmtpConfig>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if production runs without SMTP, the mail transport cannot
/// be built, the store cannot be reached or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(port = args.port, environment = %args.environment, "Starting server");

    let sender = code_sender(args.environment, args.smtp)?;

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_bcrypt_cost(args.bcrypt_cost);

    let otp_config = OtpConfig::new(args.environment)
        .with_code_ttl_seconds(args.code_ttl_seconds)
        .with_cooldown_seconds(args.code_cooldown_seconds)
        .with_delivery_timeout(Duration::from_secs(args.delivery_timeout_seconds));

    api::new(
        args.port,
        args.dsn,
        auth_config,
        otp_config,
        args.jwt_secret,
        sender,
        Duration::from_secs(args.code_sweep_seconds),
    )
    .await
}

// The logging sender never fails, so production must deliver through SMTP.
fn code_sender(
    environment: Environment,
    smtp: Option<SmtpConfig>,
) -> Result<Arc<dyn CodeSender>> {
    match (smtp, environment) {
        (Some(config), _) => Ok(Arc::new(SmtpCodeSender::new(config)?)),
        (None, Environment::Development) => Ok(Arc::new(LogCodeSender)),
        (None, Environment::Production) => {
            bail!("--smtp-host is required when --environment is production")
        }
    }
}
