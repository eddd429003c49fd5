use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn filter(verbose: bool, quiet_default: tracing::Level) -> EnvFilter {
    let level = if verbose { tracing::Level::DEBUG } else { quiet_default };
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Logs to stderr; stdout stays reserved for command output.
pub fn init_stderr(verbose: bool) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(verbose, tracing::Level::WARN))
        .init();
}

/// Logs to a file while the terminal UI owns the screen.
pub fn init_file(verbose: bool, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).context("failed to create log directory")?;
    let file = fs::File::create(dir.join("recall.log")).context("failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(filter(verbose, tracing::Level::INFO))
        .init();
    Ok(())
}
