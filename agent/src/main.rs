mod cli;
mod host;
mod io;
mod protocol;

use anyhow::Context;
use termsampler_core::config::EngineConfig;
use termsampler_core::session::Environment;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, RunArgs};
use crate::host::Host;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            eprintln!("{}", cli::usage());
            std::process::exit(1);
        }
    };

    match command {
        Command::Version => {
            println!("termsampler {VERSION}");
            Ok(())
        }
        Command::Help => {
            eprintln!("{}", cli::usage());
            Ok(())
        }
        Command::Run(args) => {
            // Logs on stderr; stdout is the event stream.
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with_writer(std::io::stderr)
                .init();

            run(args).await
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = EngineConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let env = Environment::merge(&config.variables, &args.variables)?;

    info!(
        "termsampler {} starting with {} component(s)",
        VERSION,
        config.components.len()
    );

    let (mut host, mut events) = Host::start(&config, env);
    let result = io::stdio::run_stdio_loop(&mut host, &mut events).await;
    host.shutdown().await;
    result
}
