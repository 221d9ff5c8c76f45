//! Owner side of a conversion: what to answer a `SelectionRequest`
//! with, and outgoing `INCR` transfers.

use std::collections::HashMap;
use std::sync::Arc;

use x11rb::protocol::xproto::{Atom, Window};

use crate::error::SelectionFault;
use crate::payload::{Format, Payload};
use crate::text;

use super::atoms::Atoms;

/// Bytes of a `ChangeProperty` request that are not payload.
pub const CHANGE_PROPERTY_HEADER: usize = 24;

/// Largest payload written as a single property.
///
/// Bounded both by the configured chunk size and by what the server
/// accepts in one request.
pub fn single_message_limit(maximum_request_bytes: usize, chunk_bytes: usize) -> usize {
    let budget = maximum_request_bytes.saturating_sub(CHANGE_PROPERTY_HEADER);
    chunk_bytes.min(budget).max(1)
}

/// The selection content this process currently owns.
#[derive(Debug, Clone)]
pub struct Owned {
    pub payload: Payload,
    /// Target atom the payload is natively offered as.
    pub format_atom: Atom,
}

/// A read of a selection this process believes it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRead {
    /// Still ours. The bytes, if the requested format is the one we hold.
    Hit(Option<Vec<u8>>),
    /// Another client took the selection; the `SelectionClear` telling
    /// us so has not been pumped yet.
    Stale,
}

/// Serve a read locally if `ours` is still the selection `owner`.
pub fn local_read(owned: &Owned, owner: Window, ours: Window, format: &Format) -> LocalRead {
    if owner != ours {
        return LocalRead::Stale;
    }
    LocalRead::Hit((owned.payload.format() == format).then(|| owned.payload.bytes().to_vec()))
}

/// How to answer one conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Atom list for the `TARGETS` target.
    Targets(Vec<Atom>),
    /// Fits in one property write.
    Data { type_: Atom, data: Arc<[u8]> },
    /// Too large for one write; announce `INCR` and send in chunks.
    Incr { type_: Atom, data: Arc<[u8]> },
    /// Answer with property `None`.
    Refuse,
}

/// Targets the owned payload can be converted to.
pub fn offered_targets(owned: &Owned, atoms: &Atoms) -> Vec<Atom> {
    let mut targets = vec![atoms.targets];
    match owned.payload.format() {
        Format::Text => {
            targets.extend([atoms.utf8_string, atoms.text]);
            if owned
                .payload
                .as_text()
                .is_ok_and(|s| text::utf8_to_latin1(s).is_ok())
            {
                targets.push(atoms.string);
            }
        }
        Format::Custom(_) => targets.push(owned.format_atom),
    }
    targets
}

/// Decide how to answer a request for `target`.
pub fn plan_reply(target: Atom, owned: &Owned, atoms: &Atoms, single_limit: usize) -> Reply {
    if target == atoms.targets {
        return Reply::Targets(offered_targets(owned, atoms));
    }

    let (type_, data): (Atom, Arc<[u8]>) = match owned.payload.format() {
        Format::Text if target == atoms.utf8_string || target == atoms.text => {
            (atoms.utf8_string, owned.payload.shared())
        }
        Format::Text if target == atoms.string => {
            match owned.payload.as_text().map(text::utf8_to_latin1) {
                Ok(Ok(latin1)) => (atoms.string, latin1.into()),
                _ => return Reply::Refuse,
            }
        }
        Format::Custom(_) if target == owned.format_atom => {
            (owned.format_atom, owned.payload.shared())
        }
        _ => return Reply::Refuse,
    };

    if data.len() > single_limit {
        Reply::Incr { type_, data }
    } else {
        Reply::Data { type_, data }
    }
}

/// One in-progress chunked send to a requestor.
///
/// Holds its own handle to the bytes, so losing or replacing the
/// selection does not disturb a transfer already under way.
#[derive(Debug)]
pub struct OutgoingTransfer {
    requestor: Window,
    property: Atom,
    type_: Atom,
    data: Arc<[u8]>,
    offset: usize,
    chunk_bytes: usize,
    finished: bool,
}

impl OutgoingTransfer {
    pub fn new(
        requestor: Window,
        property: Atom,
        type_: Atom,
        data: Arc<[u8]>,
        chunk_bytes: usize,
    ) -> Self {
        Self {
            requestor,
            property,
            type_,
            data,
            offset: 0,
            chunk_bytes: chunk_bytes.max(1),
            finished: false,
        }
    }

    pub fn requestor(&self) -> Window {
        self.requestor
    }

    pub fn property(&self) -> Atom {
        self.property
    }

    pub fn type_(&self) -> Atom {
        self.type_
    }

    pub fn total(&self) -> usize {
        self.data.len()
    }

    pub fn sent(&self) -> usize {
        self.offset
    }

    /// The next chunk to write. The last chunk is empty; after it,
    /// `None`.
    pub fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.finished {
            return None;
        }
        let start = self.offset;
        let end = start.saturating_add(self.chunk_bytes).min(self.data.len());
        if start == end {
            self.finished = true;
        }
        self.offset = end;
        Some(&self.data[start..end])
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Active outgoing transfers, at most one per requestor window.
#[derive(Debug, Default)]
pub struct Transfers {
    active: HashMap<Window, OutgoingTransfer>,
}

impl Transfers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, requestor: Window) -> bool {
        self.active.contains_key(&requestor)
    }

    /// Track a new transfer. A requestor with one already running is
    /// rejected.
    pub fn begin(&mut self, transfer: OutgoingTransfer) -> Result<(), SelectionFault> {
        if self.contains(transfer.requestor) {
            return Err(SelectionFault::TransferInProgress);
        }
        self.active.insert(transfer.requestor, transfer);
        Ok(())
    }

    /// The transfer writing `property` on `requestor`, if any.
    pub fn get_mut(&mut self, requestor: Window, property: Atom) -> Option<&mut OutgoingTransfer> {
        self.active
            .get_mut(&requestor)
            .filter(|t| t.property == property)
    }

    pub fn remove(&mut self, requestor: Window) -> Option<OutgoingTransfer> {
        self.active.remove(&requestor)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
