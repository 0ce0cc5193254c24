//! pocketledger - a command-line client for the pocketledger personal
//! finance backend.
//!
//! Log in once; the session is kept in the credential store and access
//! tokens are renewed transparently on later runs.

mod args;
mod commands;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use pocketledger_core::{ApiClient, ApiError, Config, SessionStore};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::Cli;
use commands::Context;

// ============================================================================
// Constants
// ============================================================================

/// Exit status when the stored session can no longer be renewed
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and also to `log_file` when given. The returned guard
/// flushes the file writer and must live until exit.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("--log-file must name a file"))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _guard = match init_tracing(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    info!("pocketledger starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_session_expired(&err) => {
            warn!(error = %err, "Session expired");
            eprintln!("Your session has expired. Run `pocketledger login` to sign in again.");
            ExitCode::from(EXIT_SESSION_EXPIRED)
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let storage = config.open_storage()?;
    let api = ApiClient::with_timeout(&config.api_base_url, storage, config.request_timeout())?;
    let store = SessionStore::restore(api);
    info!(
        server = %config.api_base_url,
        state = ?store.state(),
        "Session restored"
    );

    let mut ctx = Context { store, config };
    commands::run(&mut ctx, cli.command).await
}

fn is_session_expired(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_session_expired)
    })
}
