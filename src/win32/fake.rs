//! In-process stand-in for the Win32 clipboard, with failure injection and
//! bookkeeping for leak checks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr::NonNull;

use super::api::ClipboardApi;

const ERROR_ACCESS_DENIED: u32 = 5;
const FIRST_CUSTOM_FORMAT: u32 = 0xc000;

struct Block {
    data: Box<[u8]>,
    system_owned: bool,
}

#[derive(Default)]
struct State {
    open: bool,
    busy_for: u32,
    open_attempts: u32,

    blocks: HashMap<usize, Block>,
    next_block: usize,
    allocations: u32,
    locks: i64,
    lock_attempts: u32,

    contents: HashMap<u32, usize>,
    formats: HashMap<String, u32>,
    registrations: u32,

    fail_alloc: Option<u32>,
    fail_lock: Option<u32>,
    fail_empty: Option<u32>,
    fail_set_data: Option<u32>,
    fail_get_data: Option<u32>,
    fail_register: Option<u32>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: RefCell<State>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next `attempts` opens fail as if another process held the
    /// clipboard.
    pub(crate) fn hold_by_other_process(&self, attempts: u32) {
        self.state.borrow_mut().busy_for = attempts;
    }

    pub(crate) fn fail_alloc(&self, code: u32) {
        self.state.borrow_mut().fail_alloc = Some(code);
    }

    pub(crate) fn fail_lock(&self, code: u32) {
        self.state.borrow_mut().fail_lock = Some(code);
    }

    pub(crate) fn fail_empty(&self, code: u32) {
        self.state.borrow_mut().fail_empty = Some(code);
    }

    pub(crate) fn fail_set_data(&self, code: u32) {
        self.state.borrow_mut().fail_set_data = Some(code);
    }

    pub(crate) fn fail_get_data(&self, code: u32) {
        self.state.borrow_mut().fail_get_data = Some(code);
    }

    pub(crate) fn fail_register(&self, code: u32) {
        self.state.borrow_mut().fail_register = Some(code);
    }

    /// Place `bytes` on the clipboard directly, as another program would.
    pub(crate) fn put_raw(&self, format: u32, bytes: Vec<u8>) {
        let mut s = self.state.borrow_mut();
        let id = s.next_block;
        s.next_block += 1;
        s.blocks.insert(
            id,
            Block {
                data: bytes.into_boxed_slice(),
                system_owned: true,
            },
        );
        if let Some(old) = s.contents.insert(format, id) {
            s.blocks.remove(&old);
        }
    }

    pub(crate) fn stored(&self, format: u32) -> Option<Vec<u8>> {
        let s = self.state.borrow();
        let id = s.contents.get(&format)?;
        s.blocks.get(id).map(|b| b.data.to_vec())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub(crate) fn open_attempts(&self) -> u32 {
        self.state.borrow().open_attempts
    }

    pub(crate) fn lock_attempts(&self) -> u32 {
        self.state.borrow().lock_attempts
    }

    pub(crate) fn outstanding_locks(&self) -> i64 {
        self.state.borrow().locks
    }

    pub(crate) fn allocations(&self) -> u32 {
        self.state.borrow().allocations
    }

    /// Blocks allocated by the caller and neither freed nor handed over.
    pub(crate) fn unowned_allocations(&self) -> usize {
        self.state
            .borrow()
            .blocks
            .values()
            .filter(|b| !b.system_owned)
            .count()
    }

    pub(crate) fn registrations(&self) -> u32 {
        self.state.borrow().registrations
    }
}

impl ClipboardApi for FakeApi {
    type Memory = usize;

    fn open(&self) -> Result<(), u32> {
        let mut s = self.state.borrow_mut();
        s.open_attempts += 1;
        if s.busy_for > 0 {
            s.busy_for -= 1;
            return Err(ERROR_ACCESS_DENIED);
        }
        if s.open {
            return Err(ERROR_ACCESS_DENIED);
        }
        s.open = true;
        Ok(())
    }

    fn close(&self) {
        self.state.borrow_mut().open = false;
    }

    fn empty(&self) -> Result<(), u32> {
        let mut s = self.state.borrow_mut();
        assert!(s.open, "EmptyClipboard without OpenClipboard");
        if let Some(code) = s.fail_empty {
            return Err(code);
        }
        let held: Vec<usize> = s.contents.drain().map(|(_, id)| id).collect();
        for id in held {
            s.blocks.remove(&id);
        }
        Ok(())
    }

    fn is_available(&self, format: u32) -> bool {
        self.state.borrow().contents.contains_key(&format)
    }

    fn get_data(&self, format: u32) -> Result<usize, u32> {
        let s = self.state.borrow();
        assert!(s.open, "GetClipboardData without OpenClipboard");
        if let Some(code) = s.fail_get_data {
            return Err(code);
        }
        s.contents.get(&format).copied().ok_or(0)
    }

    fn set_data(&self, format: u32, memory: usize) -> Result<(), u32> {
        let mut s = self.state.borrow_mut();
        assert!(s.open, "SetClipboardData without OpenClipboard");
        if let Some(code) = s.fail_set_data {
            return Err(code);
        }
        match s.blocks.get_mut(&memory) {
            Some(block) => block.system_owned = true,
            None => return Err(6),
        }
        if let Some(old) = s.contents.insert(format, memory) {
            s.blocks.remove(&old);
        }
        Ok(())
    }

    fn register_format(&self, name: &str) -> Result<u32, u32> {
        let mut s = self.state.borrow_mut();
        if let Some(code) = s.fail_register {
            return Err(code);
        }
        s.registrations += 1;
        let next = FIRST_CUSTOM_FORMAT + s.formats.len() as u32;
        Ok(*s.formats.entry(name.to_owned()).or_insert(next))
    }

    fn alloc(&self, len: usize) -> Result<usize, u32> {
        let mut s = self.state.borrow_mut();
        if let Some(code) = s.fail_alloc {
            return Err(code);
        }
        let id = s.next_block;
        s.next_block += 1;
        s.allocations += 1;
        s.blocks.insert(
            id,
            Block {
                data: vec![0xcc; len].into_boxed_slice(),
                system_owned: false,
            },
        );
        Ok(id)
    }

    fn free(&self, memory: usize) {
        let removed = self.state.borrow_mut().blocks.remove(&memory);
        assert!(removed.is_some(), "GlobalFree of unknown block {memory}");
    }

    fn lock(&self, memory: usize) -> Result<NonNull<u8>, u32> {
        let mut s = self.state.borrow_mut();
        s.lock_attempts += 1;
        if let Some(code) = s.fail_lock {
            return Err(code);
        }
        let block = s.blocks.get_mut(&memory).ok_or(6u32)?;
        let ptr = NonNull::new(block.data.as_mut_ptr()).ok_or(8u32)?;
        s.locks += 1;
        Ok(ptr)
    }

    fn unlock(&self, _memory: usize) {
        self.state.borrow_mut().locks -= 1;
    }

    fn size(&self, memory: usize) -> usize {
        self.state
            .borrow()
            .blocks
            .get(&memory)
            .map_or(0, |b| b.data.len())
    }
}
