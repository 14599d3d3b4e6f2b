// ABOUTME: Entry point for the caravel CLI application.
// ABOUTME: Parses arguments, sets up logging and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use caravel::Platform;
use caravel::config::{self, Config};
use caravel::error::Result;
use caravel::output::{Output, OutputMode};
use caravel::types::AppName;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.quiet, cli.json));
    let mode = output.mode();

    if let Err(e) = run(cli, output).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init {
            namespace,
            root_domain,
            force,
        } => {
            config::init_config(&cwd, namespace.as_deref(), root_domain.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Register { app, persistent } => {
            let app = AppName::new(&app)?;
            let platform = bootstrap(&cwd).await?;
            commands::register(&platform, &app, persistent, output).await
        }
        Commands::Deploy {
            app,
            source,
            detach,
        } => {
            let app = AppName::new(&app)?;
            let source = commands::source_from_args(source)?;
            let platform = bootstrap(&cwd).await?;
            commands::deploy(platform, &app, source, detach, output).await
        }
        Commands::Status { app } => {
            let app = AppName::new(&app)?;
            let platform = bootstrap(&cwd).await?;
            commands::status(&platform, &app, output).await
        }
        Commands::Reload => {
            let platform = bootstrap(&cwd).await?;
            commands::reload(&platform, output).await
        }
        Commands::Remove { app } => {
            let app = AppName::new(&app)?;
            let platform = bootstrap(&cwd).await?;
            commands::remove(&platform, &app, output).await
        }
    }
}

async fn bootstrap(
    cwd: &std::path::Path,
) -> Result<std::sync::Arc<Platform<caravel::engine::BollardEngine>>> {
    let config = Config::discover(cwd)?;
    tracing::debug!(namespace = %config.namespace, "loaded configuration");
    Platform::bootstrap(&config).await
}
