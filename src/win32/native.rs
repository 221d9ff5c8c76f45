// ── Win32 bindings ───────────────────────────────────────────────────────────
//
// The only module that calls into user32/kernel32. Every `unsafe` block
// carries a `// SAFETY:` comment.
//
// Failing calls report `GetLastError()`, read immediately after the call
// on the same thread.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ptr::NonNull;

use windows::Win32::Foundation::{GetLastError, HANDLE, HGLOBAL, HWND};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, GetClipboardData, IsClipboardFormatAvailable, OpenClipboard,
    RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{
    GMEM_MOVEABLE, GlobalAlloc, GlobalFree, GlobalLock, GlobalSize, GlobalUnlock,
};
use windows::core::PCWSTR;

use super::api::ClipboardApi;
use crate::text;

/// `ERROR_INVALID_PARAMETER`, used when a format name cannot be encoded.
const ERROR_INVALID_PARAMETER: u32 = 87;

fn last_error() -> u32 {
    // SAFETY: reads thread-local state only.
    unsafe { GetLastError().0 }
}

/// The process clipboard, opened without an owner window.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeApi;

impl ClipboardApi for NativeApi {
    type Memory = HGLOBAL;

    fn open(&self) -> Result<(), u32> {
        // SAFETY: a null owner window is allowed; the clipboard is then
        // associated with the calling task.
        unsafe { OpenClipboard(HWND::default()) }.map_err(|_| last_error())
    }

    fn close(&self) {
        // SAFETY: only called by the session guard that opened it.
        if unsafe { CloseClipboard() }.is_err() {
            tracing::warn!(code = last_error(), "CloseClipboard failed");
        }
    }

    fn empty(&self) -> Result<(), u32> {
        // SAFETY: the clipboard is open on this thread.
        unsafe { EmptyClipboard() }.map_err(|_| last_error())
    }

    fn is_available(&self, format: u32) -> bool {
        // SAFETY: pure query on a format id.
        unsafe { IsClipboardFormatAvailable(format) }.is_ok()
    }

    fn get_data(&self, format: u32) -> Result<HGLOBAL, u32> {
        // SAFETY: the clipboard is open; the returned handle stays owned by
        // the system and is only locked, never freed.
        let handle = unsafe { GetClipboardData(format) }.map_err(|_| last_error())?;
        Ok(HGLOBAL(handle.0))
    }

    fn set_data(&self, format: u32, memory: HGLOBAL) -> Result<(), u32> {
        // SAFETY: `memory` is an unlocked GMEM_MOVEABLE block we allocated;
        // ownership passes to the system only if this succeeds.
        unsafe { SetClipboardData(format, HANDLE(memory.0)) }
            .map(|_| ())
            .map_err(|_| last_error())
    }

    fn register_format(&self, name: &str) -> Result<u32, u32> {
        let wide = text::utf8_to_wide(name).map_err(|_| ERROR_INVALID_PARAMETER)?;
        // SAFETY: `wide` is NUL-terminated UTF-16 and outlives the call.
        match unsafe { RegisterClipboardFormatW(PCWSTR(wide.as_ptr())) } {
            0 => Err(last_error()),
            id => Ok(id),
        }
    }

    fn alloc(&self, len: usize) -> Result<HGLOBAL, u32> {
        // SAFETY: plain allocation; the caller frees or hands it over.
        unsafe { GlobalAlloc(GMEM_MOVEABLE, len) }.map_err(|_| last_error())
    }

    fn free(&self, memory: HGLOBAL) {
        // SAFETY: `memory` came from `alloc` and the system never took it.
        if unsafe { GlobalFree(memory) }.is_err() {
            tracing::warn!(code = last_error(), "GlobalFree failed");
        }
    }

    fn lock(&self, memory: HGLOBAL) -> Result<NonNull<u8>, u32> {
        // SAFETY: `memory` is a live global handle; the pointer is released
        // by `unlock`.
        let ptr: *mut c_void = unsafe { GlobalLock(memory) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(last_error)
    }

    fn unlock(&self, memory: HGLOBAL) {
        // SAFETY: pairs with a successful `lock`. A zero return with no
        // error code only means the lock count reached zero.
        let _ = unsafe { GlobalUnlock(memory) };
    }

    fn size(&self, memory: HGLOBAL) -> usize {
        // SAFETY: `memory` is a live global handle.
        unsafe { GlobalSize(memory) }
    }
}
