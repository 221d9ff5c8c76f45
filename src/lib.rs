//! Native clipboard access over X11 selections and the Win32 clipboard.
//!
//! [`Clipboard`] is the entry point. The backend modules are public for
//! callers that already run an X11 event loop or want the narrower
//! per-backend error types.

pub mod clipboard;
pub mod color;
pub mod error;
pub mod payload;
pub mod text;
pub mod win32;
pub mod x11;

pub use clipboard::{Clipboard, ClipboardBackend, ClipboardConfig, SelectionKind};
pub use error::{ClipboardError, NativeCode, SelectionFault, SharedError};
pub use payload::{Format, Payload};
