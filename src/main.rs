// ABOUTME: Entry point for the stagehand CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use stagehand::config;
use stagehand::error::Result;
use stagehand::output::{Output, OutputMode};
use stagehand::pipeline::{EXIT_FAILURE, EXIT_SUCCESS};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let code = match run(cli.command, mode).await {
        Ok(code) => code,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

async fn run(command: Commands, mode: OutputMode) -> Result<i32> {
    let cwd = env::current_dir()?;
    let output = Output::new(mode);

    match command {
        Commands::Init { app, force } => {
            let app = app.or_else(|| {
                cwd.file_name()
                    .map(|name| name.to_string_lossy().to_ascii_lowercase())
            });
            config::init_config(&cwd, app.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(EXIT_SUCCESS)
        }
        Commands::Run {
            request,
            force_unlock,
        } => commands::run(&cwd, request, force_unlock, output).await,
        Commands::Plan { request } => commands::plan(&cwd, request, output).map(|()| EXIT_SUCCESS),
        Commands::Rollback { environment, to } => commands::rollback(&cwd, environment, to, output)
            .await
            .map(|()| EXIT_SUCCESS),
    }
}
