use clap::{Args, Parser, Subcommand};

use nativeclip::clipboard::{DEFAULT_CHUNK_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use nativeclip::{ClipboardConfig, Format, SelectionKind};

#[derive(Parser)]
#[command(name = "nativeclip", about = "Read and write the native clipboard")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// X11 selection to use (ignored on Windows)
    #[arg(long, global = true, value_enum, default_value_t = SelectionKind::Clipboard)]
    pub selection: SelectionKind,

    /// Largest payload a paste will accept, in bytes
    #[arg(long, global = true, env = "NATIVECLIP_MAX_SIZE", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_size: usize,

    /// Payloads above this many bytes are sent in chunks (X11)
    #[arg(long, global = true, env = "NATIVECLIP_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_BYTES)]
    pub chunk_size: usize,

    /// X11 display to connect to instead of $DISPLAY
    #[arg(long, global = true)]
    pub display: Option<String>,
}

impl GlobalArgs {
    pub fn config(&self) -> ClipboardConfig {
        ClipboardConfig {
            selection: self.selection,
            max_payload_bytes: self.max_size,
            chunk_bytes: self.chunk_size,
            display: self.display.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy stdin to the clipboard and serve pastes until replaced
    Copy {
        /// "text" or a custom format name
        #[arg(long, default_value = "text")]
        format: Format,
    },

    /// Write the clipboard contents to stdout
    Paste {
        /// "text" or a custom format name
        #[arg(long, default_value = "text")]
        format: Format,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["nativeclip", "paste"]).unwrap();
        let config = cli.global.config();
        assert_eq!(config, ClipboardConfig::default());
        assert!(matches!(cli.command, Command::Paste { format: Format::Text }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nativeclip",
            "copy",
            "--format",
            "image/png",
            "--selection",
            "primary",
            "--chunk-size",
            "4096",
        ])
        .unwrap();
        let config = cli.global.config();
        assert_eq!(config.selection, SelectionKind::Primary);
        assert_eq!(config.chunk_bytes, 4096);
        match cli.command {
            Command::Copy { format } => assert_eq!(format, Format::custom("image/png")),
            Command::Paste { .. } => panic!("expected copy"),
        }
    }

    #[test]
    fn empty_format_rejected() {
        assert!(Cli::try_parse_from(["nativeclip", "paste", "--format", ""]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
