//! Native calls the lock protocol is written against.
//!
//! [`NativeApi`](super::native::NativeApi) maps these one-to-one onto
//! `user32`/`kernel32`. Keeping them behind a trait lets the protocol in
//! [`super`] (retry bound, release on every path) run anywhere.
//!
//! Errors are raw `GetLastError()` codes.

use std::ptr::NonNull;

/// Raw clipboard and global-memory operations.
pub trait ClipboardApi {
    /// A movable global memory handle (`HGLOBAL`).
    type Memory: Copy;

    /// `OpenClipboard`. Fails while another window has it open.
    fn open(&self) -> Result<(), u32>;
    /// `CloseClipboard`.
    fn close(&self);
    /// `EmptyClipboard`.
    fn empty(&self) -> Result<(), u32>;
    /// `IsClipboardFormatAvailable`.
    fn is_available(&self, format: u32) -> bool;
    /// `GetClipboardData`. The system keeps owning the handle.
    fn get_data(&self, format: u32) -> Result<Self::Memory, u32>;
    /// `SetClipboardData`. On success the system owns `memory`.
    fn set_data(&self, format: u32, memory: Self::Memory) -> Result<(), u32>;
    /// `RegisterClipboardFormatW`.
    fn register_format(&self, name: &str) -> Result<u32, u32>;

    /// `GlobalAlloc(GMEM_MOVEABLE, len)`.
    fn alloc(&self, len: usize) -> Result<Self::Memory, u32>;
    /// `GlobalFree`.
    fn free(&self, memory: Self::Memory);
    /// `GlobalLock`. The pointer is valid for [`size`](Self::size) bytes
    /// until the matching [`unlock`](Self::unlock).
    fn lock(&self, memory: Self::Memory) -> Result<NonNull<u8>, u32>;
    /// `GlobalUnlock`.
    fn unlock(&self, memory: Self::Memory);
    /// `GlobalSize`.
    fn size(&self, memory: Self::Memory) -> usize;
}
