//! X11 selection backend.
//!
//! Set claims selection ownership and keeps the payload; other clients'
//! paste requests are then answered from the handler table, but only
//! while the caller keeps pumping events ([`X11Clipboard::pump_event`]
//! or an external loop calling [`X11Clipboard::dispatch`]). A process
//! that stops pumping after a set stalls every paste from other clients
//! until it exits or loses ownership.
//!
//! Get converts the selection into a private property on our window
//! and blocks on the event stream for the answer, following `INCR`
//! transfers to completion. Selection events that arrive meanwhile are
//! serviced inline; everything else is queued and handed back later by
//! `pump_event`.

pub mod assembly;
pub mod atoms;
pub mod dispatch;
pub mod errors;
pub mod registry;
pub mod transfer;
pub mod wait;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::xfixes::{self, SelectionEventMask};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ChangeWindowAttributesAux, CreateWindowAux, EventMask, PropMode,
    Property, SELECTION_NOTIFY_EVENT, SelectionNotifyEvent, SelectionRequestEvent, Window,
    WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use crate::clipboard::{ClipboardBackend, ClipboardConfig, SelectionKind};
use crate::error::{ClipboardError, SelectionFault, SharedError, X11GetError, X11OwnError};
use crate::payload::{Format, Payload};
use crate::text;

use assembly::{ChunkAssembly, Progress};
use atoms::Atoms;
use dispatch::{EventKind, Handled, HandlerTable};
use registry::{WindowHandle, WindowRegistry, WindowTable};
use transfer::{LocalRead, OutgoingTransfer, Owned, Reply, Transfers};
use wait::{Incoming, Pending};

/// 32-bit units requested per `GetProperty` round trip.
const PROPERTY_READ_WORDS: u32 = 1 << 16;

/// Unclaimed events kept for `pump_event`; older ones are dropped.
const BACKLOG_LIMIT: usize = 256;

/// XFixes version whose selection notifications we rely on.
const XFIXES_VERSION: (u32, u32) = (2, 0);

/// A property value read back from the server.
#[derive(Debug)]
struct PropertyValue {
    type_: Atom,
    format: u8,
    bytes: Vec<u8>,
}

/// X11 clipboard bound to one of our windows.
pub struct X11Clipboard {
    conn: Arc<RustConnection>,
    window: Window,
    atoms: Atoms,
    selection: Atom,
    registry: Box<dyn WindowRegistry>,
    handlers: HandlerTable<X11Clipboard, X11OwnError>,
    owned: Option<Owned>,
    transfers: Transfers,
    custom_atoms: HashMap<String, Atom>,
    /// Events read while blocked in a get that no handler consumed.
    backlog: VecDeque<Event>,
    /// Single-write limit, also the chunk size of outgoing transfers.
    single_limit: usize,
    max_payload_bytes: usize,
    /// Owner changes are pushed to us while a read waits.
    xfixes: bool,
    destroy_window: bool,
}

impl X11Clipboard {
    /// Connect to the display and create a hidden window for clipboard
    /// traffic.
    pub fn connect(config: &ClipboardConfig) -> Result<Self, X11OwnError> {
        let (conn, screen_num) = RustConnection::connect(config.display.as_deref())?;
        let root = conn.setup().roots[screen_num].root;

        let window = conn.generate_id()?;
        xproto::create_window(
            &conn,
            COPY_DEPTH_FROM_PARENT,
            window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        conn.flush()?;
        tracing::debug!(
            window = format_args!("0x{window:08x}"),
            screen = screen_num,
            "created clipboard window"
        );

        let mut table = WindowTable::new();
        table.insert(WindowHandle {
            window,
            owned: true,
        });

        let mut clipboard = Self::with_window(Arc::new(conn), window, Box::new(table), config)?;
        clipboard.destroy_window = true;
        Ok(clipboard)
    }

    /// Use an existing window.
    ///
    /// The window must be in `registry` and must select
    /// `PropertyChange` events, or `INCR` reads will never see their
    /// chunks.
    pub fn with_window(
        conn: Arc<RustConnection>,
        window: Window,
        registry: Box<dyn WindowRegistry>,
        config: &ClipboardConfig,
    ) -> Result<Self, X11OwnError> {
        if registry.lookup(window).is_none() {
            return Err(X11OwnError::WindowMissing(window));
        }

        let atoms = Atoms::intern(&*conn)?;
        let selection = match config.selection {
            SelectionKind::Clipboard => atoms.clipboard,
            SelectionKind::Primary => atoms.primary,
        };
        let single_limit =
            transfer::single_message_limit(conn.maximum_request_bytes(), config.chunk_bytes);
        let xfixes = init_xfixes(&*conn)?;
        tracing::debug!(
            single_limit,
            xfixes,
            selection = ?config.selection,
            "X11 clipboard ready"
        );

        let mut handlers = HandlerTable::new();
        Self::register_handlers(&mut handlers);

        Ok(Self {
            conn,
            window,
            atoms,
            selection,
            registry,
            handlers,
            owned: None,
            transfers: Transfers::new(),
            custom_atoms: HashMap::new(),
            backlog: VecDeque::new(),
            single_limit,
            max_payload_bytes: config.max_payload_bytes,
            xfixes,
            destroy_window: false,
        })
    }

    /// Register the selection responder with an event pump's table.
    pub fn register_handlers(table: &mut HandlerTable<Self, X11OwnError>) {
        table.register(EventKind::SelectionRequest, Self::on_selection_request);
        table.register(EventKind::SelectionClear, Self::on_selection_clear);
        table.register(EventKind::PropertyNotify, Self::on_property_notify);
        table.register(EventKind::Error, Self::on_error);
    }

    pub fn conn(&self) -> &Arc<RustConnection> {
        &self.conn
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Whether this process currently owns the selection.
    pub fn owns_selection(&self) -> bool {
        self.owned.is_some()
    }

    /// Whether other clients may still need us to pump events: we own
    /// the selection, or a chunked send is unfinished.
    pub fn holds_data(&self) -> bool {
        self.owned.is_some() || !self.transfers.is_empty()
    }

    /// Run one event through the handler table.
    pub fn dispatch(&mut self, event: &Event) -> Result<Handled, X11OwnError> {
        match self.handlers.get(EventKind::of(event)) {
            Some(handler) => handler(self, event),
            None => Ok(Handled::Ignored),
        }
    }

    /// Block for the next event and dispatch it. Returns the event if no
    /// handler consumed it.
    pub fn pump_event(&mut self) -> Result<Option<Event>, X11OwnError> {
        if let Some(event) = self.backlog.pop_front() {
            return Ok(Some(event));
        }
        let event = self.conn.wait_for_event()?;
        match self.dispatch(&event)? {
            Handled::Consumed => Ok(None),
            Handled::Ignored => Ok(Some(event)),
        }
    }

    // -- Acquire --

    /// Claim the selection with `payload`.
    ///
    /// Ownership is not read back. Losing it later is only visible as a
    /// `SelectionClear` event, seen while pumping.
    pub fn set(&mut self, payload: Payload) -> Result<(), X11OwnError> {
        self.require_window(self.window)?;
        let format_atom = self.format_atom(payload.format())?;

        xproto::set_selection_owner(&*self.conn, self.window, self.selection, CURRENT_TIME)?;
        self.conn.flush()?;

        tracing::debug!(
            format = %payload.format(),
            bytes = payload.len(),
            "claimed selection"
        );
        self.owned = Some(Owned {
            payload,
            format_atom,
        });
        Ok(())
    }

    // -- Respond --

    fn on_selection_request(&mut self, event: &Event) -> Result<Handled, X11OwnError> {
        let Event::SelectionRequest(req) = event else {
            return Ok(Handled::Ignored);
        };
        if let Err(e) = self.require_window(req.owner) {
            self.notify(req, NONE)?;
            return Err(e);
        }

        // Obsolete clients send property None and expect the target.
        let property = if req.property == NONE {
            req.target
        } else {
            req.property
        };

        let reply = match &self.owned {
            Some(owned) if req.selection == self.selection => {
                transfer::plan_reply(req.target, owned, &self.atoms, self.single_limit)
            }
            _ => Reply::Refuse,
        };

        let answered = match reply {
            Reply::Refuse => {
                tracing::debug!(
                    requestor = format_args!("0x{:08x}", req.requestor),
                    target = req.target,
                    "refusing conversion"
                );
                NONE
            }
            Reply::Targets(targets) => {
                let data: Vec<u8> = targets.iter().flat_map(|a| a.to_ne_bytes()).collect();
                xproto::change_property(
                    &*self.conn,
                    PropMode::REPLACE,
                    req.requestor,
                    property,
                    self.atoms.atom,
                    32,
                    targets.len() as u32,
                    &data,
                )?;
                property
            }
            Reply::Data { type_, data } => {
                xproto::change_property(
                    &*self.conn,
                    PropMode::REPLACE,
                    req.requestor,
                    property,
                    type_,
                    8,
                    data.len() as u32,
                    &data,
                )?;
                property
            }
            Reply::Incr { type_, data } => self.begin_incr(req, property, type_, data)?,
        };

        self.notify(req, answered)?;
        Ok(Handled::Consumed)
    }

    /// Announce an `INCR` transfer. Returns the property to report, or
    /// `NONE` if the requestor already has a transfer running.
    fn begin_incr(
        &mut self,
        req: &SelectionRequestEvent,
        property: Atom,
        type_: Atom,
        data: Arc<[u8]>,
    ) -> Result<Atom, X11OwnError> {
        let total = data.len();
        let outgoing =
            OutgoingTransfer::new(req.requestor, property, type_, data, self.single_limit);
        if let Err(fault) = self.transfers.begin(outgoing) {
            tracing::warn!(
                requestor = format_args!("0x{:08x}", req.requestor),
                error = %fault,
                "refusing second chunked transfer"
            );
            return Ok(NONE);
        }

        // Deletions of the property pace the transfer.
        xproto::change_window_attributes(
            &*self.conn,
            req.requestor,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        let hint = u32::try_from(total).unwrap_or(u32::MAX);
        xproto::change_property(
            &*self.conn,
            PropMode::REPLACE,
            req.requestor,
            property,
            self.atoms.incr,
            32,
            1,
            &hint.to_ne_bytes(),
        )?;

        tracing::debug!(
            requestor = format_args!("0x{:08x}", req.requestor),
            bytes = total,
            "starting chunked transfer"
        );
        Ok(property)
    }

    fn notify(&self, req: &SelectionRequestEvent, property: Atom) -> Result<(), X11OwnError> {
        let event = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: req.time,
            requestor: req.requestor,
            selection: req.selection,
            target: req.target,
            property,
        };
        xproto::send_event(&*self.conn, false, req.requestor, EventMask::NO_EVENT, event)?;
        self.conn.flush()?;
        Ok(())
    }

    fn on_property_notify(&mut self, event: &Event) -> Result<Handled, X11OwnError> {
        let Event::PropertyNotify(ev) = event else {
            return Ok(Handled::Ignored);
        };
        if ev.state != Property::DELETE {
            return Ok(Handled::Ignored);
        }
        let Some(outgoing) = self.transfers.get_mut(ev.window, ev.atom) else {
            return Ok(Handled::Ignored);
        };

        let type_ = outgoing.type_();
        if let Some(chunk) = outgoing.next_chunk() {
            xproto::change_property(
                &*self.conn,
                PropMode::REPLACE,
                ev.window,
                ev.atom,
                type_,
                8,
                chunk.len() as u32,
                chunk,
            )?;
        }

        if outgoing.is_finished() {
            let sent = outgoing.sent();
            self.transfers.remove(ev.window);
            xproto::change_window_attributes(
                &*self.conn,
                ev.window,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
            )?;
            tracing::debug!(
                requestor = format_args!("0x{:08x}", ev.window),
                bytes = sent,
                "chunked transfer finished"
            );
        }
        self.conn.flush()?;
        Ok(Handled::Consumed)
    }

    fn on_selection_clear(&mut self, event: &Event) -> Result<Handled, X11OwnError> {
        let Event::SelectionClear(ev) = event else {
            return Ok(Handled::Ignored);
        };
        if ev.owner != self.window || ev.selection != self.selection {
            return Ok(Handled::Ignored);
        }
        // Outgoing transfers keep their own copy and run to completion.
        self.owned = None;
        tracing::debug!(
            transfers = self.transfers.len(),
            "lost selection ownership"
        );
        Ok(Handled::Consumed)
    }

    /// A requestor that vanished mid-transfer shows up as `BadWindow`
    /// for our unchecked writes; drop its transfer.
    fn on_error(&mut self, event: &Event) -> Result<Handled, X11OwnError> {
        let Event::Error(err) = event else {
            return Ok(Handled::Ignored);
        };
        if matches!(err.error_kind, ErrorKind::Window)
            && self.transfers.remove(err.bad_value).is_some()
        {
            tracing::warn!(
                requestor = format_args!("0x{:08x}", err.bad_value),
                "requestor destroyed mid-transfer"
            );
            return Ok(Handled::Consumed);
        }
        Ok(Handled::Ignored)
    }

    // -- Request --

    /// Read the selection as `format`.
    ///
    /// `Ok(None)` when nobody owns the selection. Blocks until the owner
    /// answers; there is no timeout.
    pub fn get(&mut self, format: &Format) -> Result<Option<Vec<u8>>, X11GetError> {
        let owner = self.current_owner()?;
        if let Some(owned) = &self.owned {
            match transfer::local_read(owned, owner, self.window, format) {
                LocalRead::Hit(local) => {
                    tracing::debug!(hit = local.is_some(), "answering from owned selection");
                    return Ok(local);
                }
                LocalRead::Stale => {
                    tracing::debug!(
                        owner = format_args!("0x{owner:08x}"),
                        "selection taken over, clear not yet seen"
                    );
                    self.owned = None;
                }
            }
        }

        if owner == NONE {
            tracing::debug!("selection has no owner");
            return Ok(None);
        }

        match format {
            Format::Text => match self.convert(owner, self.atoms.utf8_string) {
                Err(X11GetError::Selection(SelectionFault::Refused)) => {
                    tracing::debug!("UTF8_STRING refused, retrying as STRING");
                    let latin1 = self.convert(owner, self.atoms.string)?;
                    Ok(Some(text::latin1_to_utf8(&latin1).into_bytes()))
                }
                result => {
                    let bytes = result?;
                    text::check_utf8(&bytes).map_err(SharedError::from)?;
                    Ok(Some(bytes))
                }
            },
            Format::Custom(name) => {
                let target = self.custom_atom(name)?;
                Ok(Some(self.convert(owner, target)?))
            }
        }
    }

    fn current_owner(&self) -> Result<Window, X11GetError> {
        Ok(xproto::get_selection_owner(&*self.conn, self.selection)?
            .reply()?
            .owner)
    }

    fn convert(&mut self, owner: Window, target: Atom) -> Result<Vec<u8>, X11GetError> {
        let pending = Pending {
            window: self.window,
            selection: self.selection,
            property: self.atoms.transfer,
            owner,
        };
        self.watch_owner(true)?;
        let result = self.convert_watched(pending, target);
        if let Err(e) = self.watch_owner(false) {
            tracing::debug!(error = %e, "stopping owner watch failed");
        }
        result
    }

    /// Follow owner changes of our selection through XFixes, so a read
    /// from an owner that goes away fails instead of waiting forever.
    fn watch_owner(&self, on: bool) -> Result<(), X11GetError> {
        if !self.xfixes {
            return Ok(());
        }
        let mask = if on {
            SelectionEventMask::SET_SELECTION_OWNER
                | SelectionEventMask::SELECTION_WINDOW_DESTROY
                | SelectionEventMask::SELECTION_CLIENT_CLOSE
        } else {
            SelectionEventMask::from(0u32)
        };
        xfixes::select_selection_input(&*self.conn, self.window, self.selection, mask)?;
        self.conn.flush()?;
        Ok(())
    }

    fn convert_watched(&mut self, pending: Pending, target: Atom) -> Result<Vec<u8>, X11GetError> {
        xproto::convert_selection(
            &*self.conn,
            pending.window,
            pending.selection,
            target,
            pending.property,
            CURRENT_TIME,
        )?;
        self.conn.flush()?;

        let notify = self.wait_for_notify(&pending)?;
        if notify.property == NONE {
            return Err(SelectionFault::Refused.into());
        }
        self.require_window(notify.requestor)?;
        let pending = Pending {
            property: notify.property,
            ..pending
        };

        let value = self.read_property(pending.window, pending.property, false)?;
        if value.type_ == self.atoms.incr {
            let hint = value
                .bytes
                .get(..4)
                .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as usize);
            return self.receive_incr(pending, hint);
        }

        xproto::delete_property(&*self.conn, pending.window, pending.property)?;
        self.conn.flush()?;
        if value.format != 8 {
            return Err(SelectionFault::BadFormat(value.format).into());
        }
        Ok(value.bytes)
    }

    fn receive_incr(
        &mut self,
        pending: Pending,
        hint: Option<usize>,
    ) -> Result<Vec<u8>, X11GetError> {
        let (window, property) = (pending.window, pending.property);
        let mut assembly = ChunkAssembly::new(self.max_payload_bytes);
        if let Err(e) = assembly.begin(hint) {
            xproto::delete_property(&*self.conn, window, property)?;
            self.conn.flush()?;
            return Err(e.into());
        }
        tracing::debug!(hint = ?hint, "receiving chunked transfer");

        // Deleting the INCR announcement asks for the first chunk.
        xproto::delete_property(&*self.conn, window, property)?;
        self.conn.flush()?;

        loop {
            match self.wait_for_new_value(&pending) {
                Ok(()) => {}
                Err(X11GetError::Selection(fault)) => return Err(assembly.abort(fault).into()),
                Err(e) => return Err(e),
            }

            // Without XFixes this is the only way to notice a new owner.
            if self.current_owner()? != pending.owner {
                return Err(assembly.abort(SelectionFault::OwnershipLost).into());
            }

            let chunk = match self.read_property(window, property, true) {
                Ok(chunk) => chunk,
                Err(X11GetError::Selection(fault)) => return Err(assembly.abort(fault).into()),
                Err(e) => return Err(e),
            };
            self.conn.flush()?;
            if chunk.format != 8 {
                return Err(assembly.abort(SelectionFault::BadFormat(chunk.format)).into());
            }

            if assembly.push(&chunk.bytes)? == Progress::Done {
                break;
            }
        }

        assembly
            .finish()
            .ok_or(X11GetError::Selection(SelectionFault::UnexpectedChunk))
    }

    /// Read a whole property, following `bytes_after` across round trips.
    /// With `delete`, the server removes it once the last part is read.
    fn read_property(
        &self,
        window: Window,
        property: Atom,
        delete: bool,
    ) -> Result<PropertyValue, X11GetError> {
        let mut bytes = Vec::new();
        let mut offset = 0u32;
        loop {
            let reply = xproto::get_property(
                &*self.conn,
                delete,
                window,
                property,
                AtomEnum::ANY,
                offset,
                PROPERTY_READ_WORDS,
            )?
            .reply()?;

            if reply.type_ == NONE {
                return Err(SelectionFault::MissingProperty.into());
            }
            if bytes.len().saturating_add(reply.value.len()) > self.max_payload_bytes {
                return Err(SharedError::OutOfMemory.into());
            }
            if bytes.try_reserve(reply.value.len()).is_err() {
                return Err(SharedError::OutOfMemory.into());
            }
            bytes.extend_from_slice(&reply.value);

            if reply.bytes_after == 0 {
                return Ok(PropertyValue {
                    type_: reply.type_,
                    format: reply.format,
                    bytes,
                });
            }
            offset += (reply.value.len() / 4) as u32;
        }
    }

    fn wait_for_notify(&mut self, pending: &Pending) -> Result<SelectionNotifyEvent, X11GetError> {
        loop {
            let event = self.conn.wait_for_event()?;
            match wait::classify(&event, pending) {
                Incoming::Notify(ev) => return Ok(ev),
                Incoming::OwnerChanged => return Err(SelectionFault::OwnershipLost.into()),
                Incoming::NewValue | Incoming::Echo => {}
                Incoming::Other => self.service_inline(event)?,
            }
        }
    }

    fn wait_for_new_value(&mut self, pending: &Pending) -> Result<(), X11GetError> {
        loop {
            let event = self.conn.wait_for_event()?;
            match wait::classify(&event, pending) {
                Incoming::NewValue => return Ok(()),
                Incoming::OwnerChanged => return Err(SelectionFault::OwnershipLost.into()),
                Incoming::Notify(_) | Incoming::Echo => {}
                Incoming::Other => self.service_inline(event)?,
            }
        }
    }

    fn service_inline(&mut self, event: Event) -> Result<(), X11GetError> {
        // Owner notifications left over from an earlier read.
        if matches!(event, Event::XfixesSelectionNotify(_)) {
            return Ok(());
        }
        if self.dispatch(&event)? == Handled::Ignored {
            if self.backlog.len() >= BACKLOG_LIMIT {
                self.backlog.pop_front();
                tracing::debug!(limit = BACKLOG_LIMIT, "event backlog full, dropping oldest");
            }
            self.backlog.push_back(event);
        }
        Ok(())
    }

    // -- Helpers --

    fn require_window(&self, window: Window) -> Result<WindowHandle, X11OwnError> {
        self.registry
            .lookup(window)
            .ok_or(X11OwnError::WindowMissing(window))
    }

    fn format_atom(&mut self, format: &Format) -> Result<Atom, X11OwnError> {
        match format {
            Format::Text => Ok(self.atoms.utf8_string),
            Format::Custom(name) => self.custom_atom(name),
        }
    }

    fn custom_atom(&mut self, name: &str) -> Result<Atom, X11OwnError> {
        if let Some(&atom) = self.custom_atoms.get(name) {
            return Ok(atom);
        }
        let atom = atoms::intern_named(&*self.conn, name)?;
        self.custom_atoms.insert(name.to_string(), atom);
        Ok(atom)
    }
}

/// Negotiate XFixes. `false` when the server lacks it.
fn init_xfixes(conn: &impl Connection) -> Result<bool, X11OwnError> {
    if conn
        .extension_information(xfixes::X11_EXTENSION_NAME)?
        .is_none()
    {
        tracing::debug!("XFixes unavailable, owner changes are polled per chunk");
        return Ok(false);
    }
    let (major, minor) = XFIXES_VERSION;
    xfixes::query_version(conn, major, minor)?.reply()?;
    Ok(true)
}

impl Drop for X11Clipboard {
    fn drop(&mut self) {
        if !self.destroy_window {
            return;
        }
        if let Err(e) = xproto::destroy_window(&*self.conn, self.window) {
            tracing::debug!(error = %e, "destroy_window failed");
        }
        if let Err(e) = self.conn.flush() {
            tracing::debug!(error = %e, "flush after destroy_window failed");
        }
    }
}

impl ClipboardBackend for X11Clipboard {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn write(&mut self, payload: &Payload) -> Result<(), ClipboardError> {
        Ok(self.set(payload.clone())?)
    }

    fn read(&mut self, format: &Format) -> Result<Option<Vec<u8>>, ClipboardError> {
        Ok(self.get(format)?)
    }

    fn holds_data(&self) -> bool {
        X11Clipboard::holds_data(self)
    }

    fn service(&mut self) -> Result<(), ClipboardError> {
        // The facade has no windows of its own to hand unclaimed events to.
        self.pump_event()?;
        Ok(())
    }
}
