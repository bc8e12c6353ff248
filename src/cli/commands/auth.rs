use crate::api::handlers::auth::state::MAX_TOKEN_TTL_SECONDS;
use crate::otp::{
    service::{MAX_CODE_TTL_SECONDS, MAX_COOLDOWN_SECONDS},
    Environment,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_JWT_SECRET: &str = "jwt-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_code_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long("environment")
                .help("Deployment environment: development or production")
                .long_help(
                    "Deployment environment. In development a failed code delivery is logged with the code and the request succeeds; in production it is reported to the caller.",
                )
                .env("STAFFGATE_ENVIRONMENT")
                .default_value("development")
                .value_parser(|value: &str| value.parse::<Environment>()),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long("jwt-secret")
                .help("Secret used to sign bearer tokens")
                .env("STAFFGATE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Bearer token lifetime in seconds")
                .env("STAFFGATE_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new("bcrypt-cost")
                .long("bcrypt-cost")
                .help("bcrypt work factor for password hashes (10-31)")
                .env("STAFFGATE_BCRYPT_COST")
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(10..=31)),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, used as the allowed CORS origin")
                .env("STAFFGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
}

fn with_code_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("code-ttl-seconds")
                .long("code-ttl-seconds")
                .help("Lifetime of verification and reset codes in seconds")
                .env("STAFFGATE_CODE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_CODE_TTL_SECONDS)),
        )
        .arg(
            Arg::new("code-cooldown-seconds")
                .long("code-cooldown-seconds")
                .help("Minimum delay before another code is issued for the same email and purpose")
                .env("STAFFGATE_CODE_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64).range(0..=MAX_COOLDOWN_SECONDS)),
        )
        .arg(
            Arg::new("code-sweep-seconds")
                .long("code-sweep-seconds")
                .help("Interval between expired code sweeps")
                .env("STAFFGATE_CODE_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("delivery-timeout-seconds")
                .long("delivery-timeout-seconds")
                .help("Upper bound for a single code delivery attempt")
                .env("STAFFGATE_DELIVERY_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub frontend_base_url: String,
    pub code_ttl_seconds: i64,
    pub code_cooldown_seconds: i64,
    pub code_sweep_seconds: u64,
    pub delivery_timeout_seconds: u64,
}

impl Options {
    /// Read the auth and code options from validated matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        Ok(Self {
            environment: matches
                .get_one::<Environment>(ARG_ENVIRONMENT)
                .copied()
                .unwrap_or_default(),
            jwt_secret: SecretString::from(jwt_secret),
            token_ttl_seconds: required(matches, "token-ttl-seconds")?,
            bcrypt_cost: required(matches, "bcrypt-cost")?,
            frontend_base_url: required(matches, "frontend-base-url")?,
            code_ttl_seconds: required(matches, "code-ttl-seconds")?,
            code_cooldown_seconds: required(matches, "code-cooldown-seconds")?,
            code_sweep_seconds: required(matches, "code-sweep-seconds")?,
            delivery_timeout_seconds: required(matches, "delivery-timeout-seconds")?,
        })
    }
}

// Every argument read through here has a default value.
fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}
