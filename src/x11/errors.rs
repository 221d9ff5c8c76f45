//! Mapping x11rb failures onto the clipboard taxonomy.

use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::ErrorKind;
use x11rb::x11_utils::X11Error;

use crate::error::{NativeCode, SharedError, X11GetError, X11OwnError};

/// Classify an X11 error packet.
///
/// `BadAlloc` and `BadWindow` have kinds of their own; every other code
/// is kept verbatim as `Unknown`.
pub fn classify(kind: ErrorKind, code: u8, bad_value: u32) -> X11OwnError {
    match kind {
        ErrorKind::Alloc => SharedError::OutOfMemory.into(),
        ErrorKind::Window => X11OwnError::WindowMissing(bad_value),
        _ => SharedError::Unknown(NativeCode::X11(code)).into(),
    }
}

impl From<X11Error> for X11OwnError {
    fn from(e: X11Error) -> Self {
        classify(e.error_kind, e.error_code, e.bad_value)
    }
}

impl From<ConnectionError> for X11OwnError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::InsufficientMemory => SharedError::OutOfMemory.into(),
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<ReplyError> for X11OwnError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => e.into(),
        }
    }
}

impl From<ReplyOrIdError> for X11OwnError {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
            ReplyOrIdError::IdsExhausted => Self::Connection("X11 resource ids exhausted".into()),
        }
    }
}

impl From<ConnectError> for X11OwnError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::InsufficientMemory => SharedError::OutOfMemory.into(),
            other => Self::Connection(format!("connect failed: {other}")),
        }
    }
}

impl From<ConnectionError> for X11GetError {
    fn from(e: ConnectionError) -> Self {
        X11OwnError::from(e).into()
    }
}

impl From<ReplyError> for X11GetError {
    fn from(e: ReplyError) -> Self {
        X11OwnError::from(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_alloc_is_out_of_memory() {
        assert_eq!(
            classify(ErrorKind::Alloc, 11, 0),
            X11OwnError::Shared(SharedError::OutOfMemory)
        );
    }

    #[test]
    fn bad_window_names_the_window() {
        assert_eq!(
            classify(ErrorKind::Window, 3, 0x1e00004),
            X11OwnError::WindowMissing(0x1e00004)
        );
    }

    #[test]
    fn unmapped_codes_are_preserved() {
        assert_eq!(
            classify(ErrorKind::Match, 8, 0),
            X11OwnError::Shared(SharedError::Unknown(NativeCode::X11(8)))
        );
        assert_eq!(
            classify(ErrorKind::Unknown(200), 200, 0),
            X11OwnError::Shared(SharedError::Unknown(NativeCode::X11(200)))
        );
    }

    #[test]
    fn insufficient_memory_is_out_of_memory() {
        assert_eq!(
            X11OwnError::from(ConnectionError::InsufficientMemory),
            X11OwnError::Shared(SharedError::OutOfMemory)
        );
    }

    #[test]
    fn io_failure_is_a_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: X11GetError = ConnectionError::IoError(io).into();
        assert!(matches!(err, X11GetError::Connection(_)));
    }
}
