// ── Win32 clipboard backend ──────────────────────────────────────────────────
//
// The Win32 clipboard is a systemwide lock. Every access is
// open → (empty) → alloc/lock/copy/unlock → set or get → close, and any
// step can fail because an unrelated process holds the lock. Each acquired
// resource sits in a drop guard, so every exit path (`?` included) releases
// it: the clipboard session closes, a locked block unlocks, and a block the
// system never took ownership of is freed.
//
// The protocol is generic over `ClipboardApi`; `native::NativeApi` is the
// real thing and only exists on Windows.

pub mod api;
#[cfg(windows)]
pub mod native;

#[cfg(test)]
pub(crate) mod fake;

use std::borrow::Cow;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::time::Duration;

use crate::clipboard::ClipboardBackend;
use crate::error::{ClipboardError, NativeCode, SharedError, Win32GetError, Win32SetError};
use crate::payload::{Format, Payload};
use crate::text;

pub use api::ClipboardApi;

/// Tries at opening the clipboard before reporting it locked.
pub const OPEN_ATTEMPTS: u32 = 5;

/// Pause between open attempts. Worst case is about
/// `OPEN_ATTEMPTS * OPEN_RETRY_DELAY` ≈ 10ms.
pub const OPEN_RETRY_DELAY: Duration = Duration::from_millis(2);

/// `CF_UNICODETEXT`.
pub const CF_UNICODETEXT: u32 = 13;

const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
const ERROR_OUTOFMEMORY: u32 = 14;

/// Map a native code to a shared kind.
pub fn shared_from_code(code: u32) -> SharedError {
    match code {
        ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY => SharedError::OutOfMemory,
        _ => SharedError::Unknown(NativeCode::Win32(code)),
    }
}

fn set_failure(code: u32) -> Win32SetError {
    match shared_from_code(code) {
        SharedError::OutOfMemory => SharedError::OutOfMemory.into(),
        _ => Win32SetError::ClipboardSet(code),
    }
}

fn get_failure(code: u32) -> Win32GetError {
    match shared_from_code(code) {
        SharedError::OutOfMemory => SharedError::OutOfMemory.into(),
        _ => Win32GetError::ClipboardGet(code),
    }
}

// ── Guards ───────────────────────────────────────────────────────────────────

/// An open clipboard. Closed on drop.
struct Session<'a, A: ClipboardApi> {
    api: &'a A,
}

impl<A: ClipboardApi> Drop for Session<'_, A> {
    fn drop(&mut self) {
        self.api.close();
    }
}

/// A global block we still own. Freed on drop unless handed to the system.
struct Allocation<'a, A: ClipboardApi> {
    api: &'a A,
    memory: Option<A::Memory>,
}

impl<'a, A: ClipboardApi> Allocation<'a, A> {
    fn new(api: &'a A, len: usize) -> Result<Self, u32> {
        let memory = api.alloc(len)?;
        Ok(Self {
            api,
            memory: Some(memory),
        })
    }

    fn memory(&self) -> Option<A::Memory> {
        self.memory
    }

    /// The system took ownership; do not free.
    fn disown(mut self) {
        self.memory = None;
    }
}

impl<A: ClipboardApi> Drop for Allocation<'_, A> {
    fn drop(&mut self) {
        if let Some(memory) = self.memory.take() {
            self.api.free(memory);
        }
    }
}

/// A locked global block. Unlocked on drop.
struct MemoryLock<'a, A: ClipboardApi> {
    api: &'a A,
    memory: A::Memory,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a, A: ClipboardApi> MemoryLock<'a, A> {
    /// Lock `memory`, exposing its first `len` bytes.
    fn acquire(api: &'a A, memory: A::Memory, len: usize) -> Result<Self, u32> {
        let ptr = api.lock(memory)?;
        Ok(Self {
            api,
            memory,
            ptr,
            len: len.min(api.size(memory)),
        })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ClipboardApi::lock` guarantees `ptr` is valid for
        // `size(memory)` bytes until `unlock`, which only runs in `drop`;
        // `len` never exceeds that size.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; `&mut self` makes this the only view.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<A: ClipboardApi> Drop for MemoryLock<'_, A> {
    fn drop(&mut self) {
        self.api.unlock(self.memory);
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// Win32 clipboard access over a [`ClipboardApi`].
pub struct Win32Clipboard<A: ClipboardApi> {
    api: A,
    formats: HashMap<String, u32>,
    max_payload_bytes: usize,
}

impl<A: ClipboardApi> Win32Clipboard<A> {
    pub fn new(api: A, max_payload_bytes: usize) -> Self {
        Self {
            api,
            formats: HashMap::new(),
            max_payload_bytes,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Open the clipboard, retrying a fixed number of times.
    ///
    /// `None` once every attempt failed; the holder is another process
    /// and may let go later.
    fn acquire(&self) -> Option<Session<'_, A>> {
        for attempt in 1..=OPEN_ATTEMPTS {
            match self.api.open() {
                Ok(()) => return Some(Session { api: &self.api }),
                Err(code) => {
                    tracing::debug!(attempt, code, "clipboard busy");
                    if attempt < OPEN_ATTEMPTS {
                        std::thread::sleep(OPEN_RETRY_DELAY);
                    }
                }
            }
        }
        tracing::warn!(attempts = OPEN_ATTEMPTS, "clipboard still locked, giving up");
        None
    }

    fn format_id(&mut self, format: &Format) -> Result<u32, SharedError> {
        match format {
            Format::Text => Ok(CF_UNICODETEXT),
            Format::Custom(name) => {
                if let Some(&id) = self.formats.get(name) {
                    return Ok(id);
                }
                let id = self.api.register_format(name).map_err(shared_from_code)?;
                self.formats.insert(name.clone(), id);
                Ok(id)
            }
        }
    }

    /// Replace the clipboard contents with `payload`.
    pub fn set(&mut self, payload: &Payload) -> Result<(), Win32SetError> {
        let format = self.format_id(payload.format())?;
        let bytes: Cow<'_, [u8]> = match payload.format() {
            Format::Text => {
                let text = payload.as_text().map_err(SharedError::from)?;
                let wide = text::utf8_to_wide(text).map_err(SharedError::from)?;
                Cow::Owned(text::wide_to_bytes(&wide))
            }
            Format::Custom(_) => Cow::Borrowed(payload.bytes()),
        };

        let Some(_session) = self.acquire() else {
            return Err(Win32SetError::ClipboardLocked);
        };
        self.api.empty().map_err(set_failure)?;

        let allocation =
            Allocation::new(&self.api, bytes.len()).map_err(|_| SharedError::OutOfMemory)?;
        let Some(memory) = allocation.memory() else {
            return Err(SharedError::OutOfMemory.into());
        };
        // A zero-size block is already discarded and cannot be locked;
        // it is handed over as is.
        if !bytes.is_empty() {
            let mut lock = MemoryLock::acquire(&self.api, memory, bytes.len())
                .map_err(Win32SetError::MemoryLock)?;
            lock.as_mut_slice().copy_from_slice(&bytes);
        }

        self.api.set_data(format, memory).map_err(set_failure)?;
        allocation.disown();

        tracing::debug!(format, bytes = bytes.len(), "clipboard set");
        Ok(())
    }

    /// Read the clipboard as `format`. `Ok(None)` when no data in that
    /// format is present.
    pub fn get(&mut self, format: &Format) -> Result<Option<Vec<u8>>, Win32GetError> {
        let id = self.format_id(format)?;

        let Some(_session) = self.acquire() else {
            return Err(Win32GetError::ClipboardLocked);
        };
        if !self.api.is_available(id) {
            tracing::debug!(format = id, "no clipboard data in format");
            return Ok(None);
        }
        let memory = self.api.get_data(id).map_err(get_failure)?;

        let size = self.api.size(memory);
        if size > self.max_payload_bytes {
            return Err(SharedError::OutOfMemory.into());
        }
        let bytes = if size == 0 {
            Vec::new()
        } else {
            let lock =
                MemoryLock::acquire(&self.api, memory, size).map_err(Win32GetError::MemoryLock)?;
            let mut out = Vec::new();
            out.try_reserve_exact(lock.as_slice().len())
                .map_err(|_| SharedError::OutOfMemory)?;
            out.extend_from_slice(lock.as_slice());
            out
        };

        match format {
            Format::Text => {
                let text = text::wide_to_utf8(&text::bytes_to_wide(&bytes))
                    .map_err(SharedError::from)?;
                Ok(Some(text.into_bytes()))
            }
            Format::Custom(_) => Ok(Some(bytes)),
        }
    }
}

impl<A: ClipboardApi> ClipboardBackend for Win32Clipboard<A> {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn write(&mut self, payload: &Payload) -> Result<(), ClipboardError> {
        Ok(self.set(payload)?)
    }

    fn read(&mut self, format: &Format) -> Result<Option<Vec<u8>>, ClipboardError> {
        Ok(self.get(format)?)
    }
}
