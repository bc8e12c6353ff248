//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, email};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let smtp = email::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        environment: auth_opts.environment,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        bcrypt_cost: auth_opts.bcrypt_cost,
        frontend_base_url: auth_opts.frontend_base_url,
        code_ttl_seconds: auth_opts.code_ttl_seconds,
        code_cooldown_seconds: auth_opts.code_cooldown_seconds,
        code_sweep_seconds: auth_opts.code_sweep_seconds,
        delivery_timeout_seconds: auth_opts.delivery_timeout_seconds,
        smtp,
    }))
}
