// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (tracing) on stderr
// 2. Parse command-line arguments using clap, asking for anything missing
// 3. Run the pipeline, printing each checked repository as it completes
// 4. Exit with proper code (0 = success, 1 = some fetches failed, 2 = error)
//
// Rust concepts used:
// - async/await: Because we need to make many network requests concurrently
// - Result<T, E>: For error handling (T = success type, E = error type)
// - Closures: the pipeline calls our printing closure for every result
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;      // src/cli.rs - command-line parsing
mod github;   // src/github/ - GitHub API client and pagination
mod pipeline; // src/pipeline/ - the list -> fetch -> match pipeline
mod travis;   // src/travis/ - .travis.yml parsing and version matching

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use crossterm::tty::IsTty;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Prompt, TerminalPrompt};
use github::{ClientSettings, GitHubClient, REQUEST_TIMEOUT};
use pipeline::{print_result, OutputFormat, Pipeline, PipelineConfig, RunSummary};

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    // Parse command-line arguments into our Cli struct
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) if summary.has_failures() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            // If an unexpected error occurred, print it and exit with code 2
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

// Sets up tracing with RUST_LOG support (defaults to "warn").
//
// Logs go to stderr: stdout is reserved for matching repositories so it can
// be piped into other tools.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

// This is the main application logic
// Returns the run summary, or an error if the run had to stop
async fn run(cli: Cli) -> Result<RunSummary> {
    // Only ask questions when someone is there to answer them
    let terminal = TerminalPrompt;
    let prompt = io::stdin().is_tty().then_some(&terminal as &dyn Prompt);
    let inputs = cli.resolve_inputs(prompt)?;

    let client = GitHubClient::new(ClientSettings {
        api_url: cli.api_url,
        raw_url: cli.raw_url,
        token: inputs.token,
        timeout: REQUEST_TIMEOUT,
    })
    .context("could not create the GitHub client")?;

    if !client.is_authenticated() {
        info!("No GitHub token given, requests are anonymous and may hit the rate limit");
    }

    let config = PipelineConfig::new(inputs.username, inputs.python_version)
        .with_repo_type(cli.repo_type)
        .with_forks(cli.forks)
        .with_concurrency(cli.concurrency);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let summary = Pipeline::new(client, config)
        .run(|result| {
            // A closed pipe (e.g. `| head`) shouldn't abort the run
            if let Err(e) = print_result(result, format) {
                warn!(error = %e, "Could not write result");
            }
        })
        .await?;

    Ok(summary)
}
