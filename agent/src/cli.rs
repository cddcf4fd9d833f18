//! Command-line argument parsing.

use std::path::PathBuf;

use thiserror::Error;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Version,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Engine configuration document.
    pub config: PathBuf,
    /// `name=value` assignments, in command-line order.
    pub variables: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Missing value for {0}")]
    MissingValue(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("--config is required")]
    MissingConfig,
}

pub fn usage() -> String {
    [
        "Usage: termsampler --config <file> [-e name=value]...",
        "",
        "Options:",
        "  -c, --config <file>   Engine configuration (JSON)",
        "  -e, --env name=value  Script variable, overrides the config file (repeatable)",
        "  --version             Print version and exit",
        "  --help                Print this help message",
        "",
        "Reads {\"command\":\"pause\"|\"resume\"|\"toggle\"} lines on stdin and",
        "writes one JSON event per line on stdout. Logs go to stderr (RUST_LOG).",
    ]
    .join("\n")
}

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config = None;
    let mut variables = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--config" | "-c" => {
                config = Some(PathBuf::from(
                    args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?,
                ));
            }
            "--env" | "-e" => {
                let value = args
                    .next()
                    .ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                variables.push(value);
            }
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    config = Some(PathBuf::from(value));
                } else if let Some(value) = other.strip_prefix("--env=") {
                    variables.push(value.to_string());
                } else {
                    return Err(ArgsError::UnknownOption(other.to_string()));
                }
            }
        }
    }

    let config = config.ok_or(ArgsError::MissingConfig)?;
    Ok(Command::Run(RunArgs { config, variables }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, ArgsError> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn config_and_repeated_variables() {
        let cmd = parse(&["--config", "dash.json", "-e", "FOO=1", "--env", "BAR=2"]).unwrap();
        assert_eq!(
            cmd,
            Command::Run(RunArgs {
                config: PathBuf::from("dash.json"),
                variables: vec!["FOO=1".into(), "BAR=2".into()],
            })
        );
    }

    #[test]
    fn equals_forms() {
        let cmd = parse(&["--config=a.json", "--env=X=y"]).unwrap();
        assert_eq!(
            cmd,
            Command::Run(RunArgs {
                config: PathBuf::from("a.json"),
                variables: vec!["X=y".into()],
            })
        );
    }

    #[test]
    fn version_and_help_short_circuit() {
        assert_eq!(parse(&["--version"]).unwrap(), Command::Version);
        assert_eq!(parse(&["--help", "--bogus"]).unwrap(), Command::Help);
    }

    #[test]
    fn missing_config_is_an_error() {
        assert_eq!(parse(&["-e", "A=1"]), Err(ArgsError::MissingConfig));
        assert_eq!(parse(&[]), Err(ArgsError::MissingConfig));
    }

    #[test]
    fn missing_value_is_an_error() {
        assert_eq!(
            parse(&["--config"]),
            Err(ArgsError::MissingValue("--config".into()))
        );
    }

    #[test]
    fn unknown_option_is_an_error() {
        assert_eq!(
            parse(&["--stdio"]),
            Err(ArgsError::UnknownOption("--stdio".into()))
        );
    }
}
