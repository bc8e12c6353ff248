use crate::email::SmtpConfig;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long("smtp-host")
                .help("SMTP relay host; codes are only logged when unset")
                .env("STAFFGATE_SMTP_HOST"),
        )
        .arg(
            Arg::new("smtp-port")
                .long("smtp-port")
                .help("SMTP relay port")
                .env("STAFFGATE_SMTP_PORT")
                .default_value("465")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("smtp-username")
                .long("smtp-username")
                .help("SMTP username")
                .env("STAFFGATE_SMTP_USERNAME")
                .requires("smtp-password"),
        )
        .arg(
            Arg::new("smtp-password")
                .long("smtp-password")
                .help("SMTP password")
                .env("STAFFGATE_SMTP_PASSWORD")
                .hide_env_values(true)
                .requires("smtp-username"),
        )
        .arg(
            Arg::new("smtp-from")
                .long("smtp-from")
                .help("Sender mailbox for code emails")
                .env("STAFFGATE_SMTP_FROM")
                .default_value("Staffgate <no-reply@staffgate.dev>"),
        )
}

/// SMTP settings, present only when `--smtp-host` is given.
///
/// # Errors
/// Returns an error if a defaulted argument is missing from the matches.
pub fn parse(matches: &ArgMatches) -> Result<Option<SmtpConfig>> {
    let Some(host) = matches.get_one::<String>(ARG_SMTP_HOST).cloned() else {
        return Ok(None);
    };

    let port = matches
        .get_one::<u16>("smtp-port")
        .copied()
        .context("missing required argument: --smtp-port")?;
    let from = matches
        .get_one::<String>("smtp-from")
        .cloned()
        .context("missing required argument: --smtp-from")?;

    Ok(Some(SmtpConfig {
        host,
        port,
        username: matches.get_one::<String>("smtp-username").cloned(),
        password: matches
            .get_one::<String>("smtp-password")
            .cloned()
            .map(SecretString::from),
        from,
    }))
}
