//! Window registry: which windows this process still owns.
//!
//! Selection events name windows by XID. Before acting on one, the
//! backend checks it against the registry; a miss means a stale handle
//! or a registry out of sync with the server, and is reported as
//! `WindowMissing` instead of being acted on.

use std::collections::HashMap;

use x11rb::protocol::xproto::Window;

/// A window known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle {
    pub window: Window,
    /// Created by this crate (and destroyed by it on drop).
    pub owned: bool,
}

/// Lookup interface the backend consumes.
pub trait WindowRegistry {
    fn lookup(&self, window: Window) -> Option<WindowHandle>;
}

/// In-crate registry backed by a map.
#[derive(Debug, Default)]
pub struct WindowTable {
    windows: HashMap<Window, WindowHandle>,
}

impl WindowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window, returning the previous entry for the same XID.
    pub fn insert(&mut self, handle: WindowHandle) -> Option<WindowHandle> {
        self.windows.insert(handle.window, handle)
    }

    pub fn remove(&mut self, window: Window) -> Option<WindowHandle> {
        self.windows.remove(&window)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl WindowRegistry for WindowTable {
    fn lookup(&self, window: Window) -> Option<WindowHandle> {
        self.windows.get(&window).copied()
    }
}
