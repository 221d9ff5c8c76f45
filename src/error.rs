//! Error taxonomy, one failure set per operation.
//!
//! Every backend operation returns its own union: the leaf kinds that
//! backend can actually produce, plus [`SharedError`] embedded
//! structurally for the kinds all backends share. The facade flattens
//! them into [`ClipboardError`] with exhaustive matches, so a new leaf
//! kind is a compile error until every conversion handles it.
//!
//! `Unknown` is the only open-ended kind and is reserved for native
//! codes this crate has no mapping for.

use std::fmt;

use crate::text::EncodingError;

/// A raw native failure code, kept verbatim when no kind maps to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeCode {
    /// X11 protocol error code (the `error_code` byte of an error packet).
    X11(u8),
    /// Win32 `GetLastError()` value.
    Win32(u32),
}

impl fmt::Display for NativeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X11(code) => write!(f, "X11 error code {code}"),
            Self::Win32(code) => write!(f, "Win32 error {code:#010x}"),
        }
    }
}

/// Kinds every backend can produce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SharedError {
    /// Allocation failed, or a transfer outgrew its configured limit.
    #[error("out of memory")]
    OutOfMemory,

    /// Text could not be converted between encodings.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(#[from] EncodingError),

    /// A native failure code with no mapped kind.
    #[error("unmapped native failure: {0}")]
    Unknown(NativeCode),
}

/// Why a selection conversion could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionFault {
    /// The owner answered with property `None`.
    #[error("selection owner refused the conversion")]
    Refused,

    /// The reply property was not present when read.
    #[error("selection reply property is missing")]
    MissingProperty,

    /// The reply used a property format other than 8-bit.
    #[error("selection reply uses unsupported format {0}")]
    BadFormat(u8),

    /// Selection ownership moved to another client mid-transfer.
    #[error("selection ownership changed during transfer")]
    OwnershipLost,

    /// A chunked transfer was started while another was still active.
    #[error("a chunked transfer is already in progress")]
    TransferInProgress,

    /// A chunk arrived with no transfer waiting for it.
    #[error("chunk arrived outside an active transfer")]
    UnexpectedChunk,
}

/// Failures of the X11 owner side: claiming the selection and answering
/// other clients' requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum X11OwnError {
    #[error("window 0x{0:08x} is not in the window registry")]
    WindowMissing(u32),

    #[error("X11 connection: {0}")]
    Connection(String),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

/// Failures of an X11 selection read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum X11GetError {
    #[error("selection: {0}")]
    Selection(#[from] SelectionFault),

    #[error("window 0x{0:08x} is not in the window registry")]
    WindowMissing(u32),

    #[error("X11 connection: {0}")]
    Connection(String),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl From<X11OwnError> for X11GetError {
    fn from(e: X11OwnError) -> Self {
        match e {
            X11OwnError::WindowMissing(window) => Self::WindowMissing(window),
            X11OwnError::Connection(msg) => Self::Connection(msg),
            X11OwnError::Shared(shared) => Self::Shared(shared),
        }
    }
}

/// Failures of a Win32 clipboard write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Win32SetError {
    /// Another process held the clipboard for the whole retry window.
    /// Transient: a later call may succeed.
    #[error("clipboard is locked by another process")]
    ClipboardLocked,

    #[error("GlobalLock failed (error {0})")]
    MemoryLock(u32),

    #[error("clipboard write failed (error {0})")]
    ClipboardSet(u32),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

/// Failures of a Win32 clipboard read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Win32GetError {
    /// Another process held the clipboard for the whole retry window.
    /// Transient: a later call may succeed.
    #[error("clipboard is locked by another process")]
    ClipboardLocked,

    #[error("GlobalLock failed (error {0})")]
    MemoryLock(u32),

    #[error("clipboard read failed (error {0})")]
    ClipboardGet(u32),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

/// Errors returned by the unified [`Clipboard`](crate::Clipboard) facade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("selection: {0}")]
    Selection(SelectionFault),

    #[error("window 0x{0:08x} is not in the window registry")]
    WindowMissing(u32),

    #[error("X11 connection: {0}")]
    Connection(String),

    #[error("clipboard is locked by another process")]
    ClipboardLocked,

    #[error("GlobalLock failed (error {0})")]
    MemoryLock(u32),

    #[error("clipboard write failed (error {0})")]
    ClipboardSet(u32),

    #[error("clipboard read failed (error {0})")]
    ClipboardGet(u32),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(EncodingError),

    #[error("unmapped native failure: {0}")]
    Unknown(NativeCode),
}

impl ClipboardError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ClipboardLocked)
    }
}

impl From<EncodingError> for ClipboardError {
    fn from(e: EncodingError) -> Self {
        Self::InvalidEncoding(e)
    }
}

impl From<SharedError> for ClipboardError {
    fn from(e: SharedError) -> Self {
        match e {
            SharedError::OutOfMemory => Self::OutOfMemory,
            SharedError::InvalidEncoding(e) => Self::InvalidEncoding(e),
            SharedError::Unknown(code) => Self::Unknown(code),
        }
    }
}

impl From<X11OwnError> for ClipboardError {
    fn from(e: X11OwnError) -> Self {
        match e {
            X11OwnError::WindowMissing(window) => Self::WindowMissing(window),
            X11OwnError::Connection(msg) => Self::Connection(msg),
            X11OwnError::Shared(shared) => shared.into(),
        }
    }
}

impl From<X11GetError> for ClipboardError {
    fn from(e: X11GetError) -> Self {
        match e {
            X11GetError::Selection(fault) => Self::Selection(fault),
            X11GetError::WindowMissing(window) => Self::WindowMissing(window),
            X11GetError::Connection(msg) => Self::Connection(msg),
            X11GetError::Shared(shared) => shared.into(),
        }
    }
}

impl From<Win32SetError> for ClipboardError {
    fn from(e: Win32SetError) -> Self {
        match e {
            Win32SetError::ClipboardLocked => Self::ClipboardLocked,
            Win32SetError::MemoryLock(code) => Self::MemoryLock(code),
            Win32SetError::ClipboardSet(code) => Self::ClipboardSet(code),
            Win32SetError::Shared(shared) => shared.into(),
        }
    }
}

impl From<Win32GetError> for ClipboardError {
    fn from(e: Win32GetError) -> Self {
        match e {
            Win32GetError::ClipboardLocked => Self::ClipboardLocked,
            Win32GetError::MemoryLock(code) => Self::MemoryLock(code),
            Win32GetError::ClipboardGet(code) => Self::ClipboardGet(code),
            Win32GetError::Shared(shared) => shared.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_survives_every_layer() {
        let code = NativeCode::Win32(0xdead);
        let err: ClipboardError = Win32SetError::from(SharedError::Unknown(code)).into();
        assert_eq!(err, ClipboardError::Unknown(code));

        let code = NativeCode::X11(200);
        let err: ClipboardError = X11GetError::from(SharedError::Unknown(code)).into();
        assert_eq!(err, ClipboardError::Unknown(code));
    }

    #[test]
    fn own_error_narrows_into_get_error() {
        let err: X11GetError = X11OwnError::WindowMissing(0x2a).into();
        assert_eq!(err, X11GetError::WindowMissing(0x2a));

        let err: X11GetError = X11OwnError::from(SharedError::OutOfMemory).into();
        assert_eq!(err, X11GetError::Shared(SharedError::OutOfMemory));
    }

    #[test]
    fn selection_fault_keeps_its_kind() {
        let err: ClipboardError = X11GetError::from(SelectionFault::OwnershipLost).into();
        assert_eq!(err, ClipboardError::Selection(SelectionFault::OwnershipLost));
    }

    #[test]
    fn lock_failures_stay_distinct() {
        let locked: ClipboardError = Win32GetError::ClipboardLocked.into();
        let mem: ClipboardError = Win32GetError::MemoryLock(5).into();
        assert_eq!(locked, ClipboardError::ClipboardLocked);
        assert_eq!(mem, ClipboardError::MemoryLock(5));
        assert!(locked.is_transient());
        assert!(!mem.is_transient());
    }

    #[test]
    fn encoding_error_flattens() {
        let err: ClipboardError = Win32SetError::from(SharedError::from(EncodingError::Utf16)).into();
        assert_eq!(err, ClipboardError::InvalidEncoding(EncodingError::Utf16));
    }

    #[test]
    fn display_names_the_code() {
        assert_eq!(NativeCode::X11(11).to_string(), "X11 error code 11");
        assert_eq!(NativeCode::Win32(5).to_string(), "Win32 error 0x00000005");
        assert_eq!(
            ClipboardError::WindowMissing(0x1c00001).to_string(),
            "window 0x01c00001 is not in the window registry"
        );
    }
}
