//! Clipboard payloads and format tags.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::text::{self, EncodingError};

/// What kind of data a payload holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    /// Plain text, UTF-8 on this side of the facade.
    Text,
    /// Application-defined format, carried as opaque bytes. The name is
    /// the X11 target atom or the registered Win32 format name.
    Custom(String),
}

impl Format {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Rejected format names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("format name must not be empty")]
pub struct EmptyFormatName;

impl FromStr for Format {
    type Err = EmptyFormatName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(EmptyFormatName),
            "text" => Ok(Self::Text),
            name => Ok(Self::Custom(name.to_string())),
        }
    }
}

/// An immutable byte payload tagged with its format.
///
/// The bytes are shared, so handing a payload to a backend (which may
/// keep serving it to other clients) is a reference-count bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    format: Format,
    bytes: Arc<[u8]>,
}

impl Payload {
    pub fn new(format: Format, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(Format::Text, text.as_bytes())
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Another handle to the same bytes.
    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// The payload as UTF-8 text.
    pub fn as_text(&self) -> Result<&str, EncodingError> {
        text::check_utf8(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
