//! Parley terminal chat client entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes tracing, database and services, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use parley_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, KeyCommand};
use state::AppState;

/// Set to any value to export spans to stdout through OpenTelemetry.
const OTEL_ENV: &str = "PARLEY_OTEL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley=debug",
        _ => "trace",
    };
    let options = TracingOptions {
        json: cli.log_json,
        enable_otel: std::env::var_os(OTEL_ENV).is_some(),
        ..TracingOptions::new(filter)
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (config, DB, services)
    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Chat {
            local,
            conversation,
            email,
        } => {
            cli::chat::loop_runner::run_chat(
                &state,
                cli::chat::loop_runner::ChatOptions {
                    local,
                    conversation,
                    email,
                },
            )
            .await
        }

        Commands::History => cli::history::list_history(&state, cli.json).await,

        Commands::Delete { id, force } => {
            cli::history::delete_conversation(&state, &id, force, cli.json).await
        }

        Commands::Signup { email } => cli::auth::sign_up(&state, email, cli.json).await,

        Commands::Login { email } => cli::auth::sign_in(&state, email, cli.json).await,

        Commands::Logout => cli::auth::sign_out(&state, cli.json).await,

        Commands::Key { action } => match action {
            KeyCommand::Set { key } => cli::key::set_key(&state, key, cli.json),
            KeyCommand::Status => cli::key::key_status(&state, cli.json),
            KeyCommand::Delete => cli::key::delete_key(&state, cli.json),
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}
