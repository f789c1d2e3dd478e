use anyhow::Result;
use clap::Parser;
use ditto::{
    app,
    cli::{handle_parse_command, Cli, CliCommand},
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        verbose,
        config,
        command,
    } = Cli::parse();
    let log_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so `parse` output stays clean JSON.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Some(CliCommand::Version) => {
            println!("Ditto {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Parse(args)) => {
            let config = Config::load(config.as_deref())?;
            handle_parse_command(&config, args)
        }
        Some(CliCommand::Run(args)) => {
            let config = Config::load(config.as_deref())?;
            app::run_service(config, args.into()).await
        }
        None => {
            let config = Config::load(config.as_deref())?;
            app::run_service(config, app::RunOptions::default()).await
        }
    }
}
