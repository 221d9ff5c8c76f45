mod cli;

use std::io::{Read, Write};

use clap::Parser;
use cli::{Cli, Command};
use nativeclip::{Clipboard, ClipboardConfig, ClipboardError, Format};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Clipboard(#[from] ClipboardError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("clipboard has no {0} data")]
    NoData(Format),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.global.config();

    let (name, result) = match cli.command {
        Command::Copy { format } => ("copy", copy(&config, format)),
        Command::Paste { format } => ("paste", paste(&config, &format)),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "{name} failed");
        eprintln!("nativeclip {name}: {e}");
        std::process::exit(1);
    }
}

/// Set stdin as the clipboard, then serve it until another client takes
/// over and every outgoing transfer is done.
fn copy(config: &ClipboardConfig, format: Format) -> Result<(), CliError> {
    let mut data = Vec::new();
    std::io::stdin().lock().read_to_end(&mut data)?;

    let mut clipboard = Clipboard::open(config)?;
    clipboard.set_clipboard(&data, format)?;
    tracing::info!(
        backend = clipboard.backend_name(),
        bytes = data.len(),
        "clipboard set"
    );

    while clipboard.holds_data() {
        clipboard.service()?;
    }
    Ok(())
}

fn paste(config: &ClipboardConfig, format: &Format) -> Result<(), CliError> {
    let mut clipboard = Clipboard::open(config)?;
    let payload = clipboard
        .get_clipboard(format)?
        .ok_or_else(|| CliError::NoData(format.clone()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(payload.bytes())?;
    stdout.flush()?;
    Ok(())
}
