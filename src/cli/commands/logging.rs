use crate::cli::telemetry::LogFormat;
use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("STAFFGATE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Console log format: pretty or json")
                .env("STAFFGATE_LOG_FORMAT")
                .default_value("pretty")
                .value_parser(|value: &str| value.parse::<LogFormat>()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_accepts_names_and_numbers() {
        let command = with_args(Command::new("staffgate"));
        for (value, expected) in [("warn", 1u8), ("TRACE", 4), ("3", 3)] {
            temp_env::with_var("STAFFGATE_LOG_LEVEL", Some(value), || {
                let matches = command.clone().get_matches_from(vec!["staffgate"]);
                assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(expected));
            });
        }
    }

    #[test]
    fn log_level_rejects_unknown() {
        temp_env::with_var("STAFFGATE_LOG_LEVEL", Some("loud"), || {
            let result = with_args(Command::new("staffgate")).try_get_matches_from(vec!["staffgate"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn log_format_from_env() {
        temp_env::with_var("STAFFGATE_LOG_FORMAT", Some("json"), || {
            let matches = with_args(Command::new("staffgate")).get_matches_from(vec!["staffgate"]);
            assert_eq!(
                matches.get_one::<LogFormat>(ARG_LOG_FORMAT).copied(),
                Some(LogFormat::Json)
            );
        });
    }
}
