//! Unified clipboard facade.
//!
//! [`Clipboard`] hides which native model is underneath: the X11
//! selection protocol or the Win32 clipboard lock. Both get and set block
//! until the backend finishes or fails.

use crate::error::ClipboardError;
use crate::payload::{Format, Payload};
use crate::text;

/// Default bound on one incoming payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Default X11 single-message size, also the `INCR` chunk size.
pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024;

/// Which X11 selection to use. Ignored on Win32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SelectionKind {
    /// `CLIPBOARD`: explicit copy/paste.
    #[default]
    Clipboard,
    /// `PRIMARY`: the current text selection.
    Primary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardConfig {
    pub selection: SelectionKind,
    /// Largest payload a get will assemble before failing with
    /// `OutOfMemory`.
    pub max_payload_bytes: usize,
    /// Payloads larger than this (or the server's request limit) go out
    /// as chunked transfers.
    pub chunk_bytes: usize,
    /// X11 display name; `None` uses `$DISPLAY`.
    pub display: Option<String>,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            selection: SelectionKind::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            display: None,
        }
    }
}

/// A native clipboard implementation.
pub trait ClipboardBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Make `payload` the clipboard contents.
    fn write(&mut self, payload: &Payload) -> Result<(), ClipboardError>;

    /// Read the contents as `format`; `Ok(None)` when there is none.
    fn read(&mut self, format: &Format) -> Result<Option<Vec<u8>>, ClipboardError>;

    /// Whether the process must keep calling [`service`](Self::service)
    /// for other clients to see what it set.
    fn holds_data(&self) -> bool {
        false
    }

    /// Handle one unit of pending protocol work, blocking if needed.
    fn service(&mut self) -> Result<(), ClipboardError> {
        Ok(())
    }
}

/// The system clipboard.
pub struct Clipboard {
    backend: Box<dyn ClipboardBackend>,
}

impl Clipboard {
    /// Open the native clipboard for this platform.
    pub fn open(config: &ClipboardConfig) -> Result<Self, ClipboardError> {
        let backend = Self::native_backend(config)?;
        tracing::debug!(backend = backend.name(), "clipboard opened");
        Ok(Self { backend })
    }

    #[cfg(windows)]
    fn native_backend(config: &ClipboardConfig) -> Result<Box<dyn ClipboardBackend>, ClipboardError> {
        use crate::win32::{Win32Clipboard, native::NativeApi};
        Ok(Box::new(Win32Clipboard::new(
            NativeApi,
            config.max_payload_bytes,
        )))
    }

    #[cfg(not(windows))]
    fn native_backend(config: &ClipboardConfig) -> Result<Box<dyn ClipboardBackend>, ClipboardError> {
        Ok(Box::new(crate::x11::X11Clipboard::connect(config)?))
    }

    pub fn from_backend(backend: Box<dyn ClipboardBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Replace the clipboard contents.
    ///
    /// `Text` data must be UTF-8; anything else fails with
    /// `InvalidEncoding` before the backend is touched.
    pub fn set_clipboard(&mut self, data: &[u8], format: Format) -> Result<(), ClipboardError> {
        if format.is_text() {
            text::check_utf8(data)?;
        }
        let payload = Payload::new(format, data);
        self.backend.write(&payload)
    }

    /// Read the clipboard as `format`.
    ///
    /// `Ok(None)` means no data: nobody owns the selection, or nothing in
    /// that format is present.
    pub fn get_clipboard(&mut self, format: &Format) -> Result<Option<Payload>, ClipboardError> {
        let Some(bytes) = self.backend.read(format)? else {
            return Ok(None);
        };
        if format.is_text() {
            text::check_utf8(&bytes)?;
        }
        Ok(Some(Payload::new(format.clone(), bytes)))
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.set_clipboard(text.as_bytes(), Format::Text)
    }

    pub fn get_text(&mut self) -> Result<Option<String>, ClipboardError> {
        match self.get_clipboard(&Format::Text)? {
            Some(payload) => Ok(Some(payload.as_text()?.to_owned())),
            None => Ok(None),
        }
    }

    /// See [`ClipboardBackend::holds_data`].
    pub fn holds_data(&self) -> bool {
        self.backend.holds_data()
    }

    /// See [`ClipboardBackend::service`].
    pub fn service(&mut self) -> Result<(), ClipboardError> {
        self.backend.service()
    }
}
