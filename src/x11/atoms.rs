//! Atoms used by the selection protocol.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, Atom, AtomEnum};

use crate::error::X11OwnError;

/// Private property our conversions are delivered into.
const TRANSFER_PROPERTY: &[u8] = b"NATIVECLIP_TRANSFER";

/// Pre-interned atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atoms {
    pub clipboard: Atom,
    pub primary: Atom,
    pub targets: Atom,
    pub utf8_string: Atom,
    pub text: Atom,
    pub string: Atom,
    pub incr: Atom,
    pub atom: Atom,
    pub transfer: Atom,
}

impl Atoms {
    /// Intern every atom the protocol needs.
    pub fn intern(conn: &impl Connection) -> Result<Self, X11OwnError> {
        // Send all requests before waiting on any reply.
        let clipboard = xproto::intern_atom(conn, false, b"CLIPBOARD")?;
        let targets = xproto::intern_atom(conn, false, b"TARGETS")?;
        let utf8_string = xproto::intern_atom(conn, false, b"UTF8_STRING")?;
        let text = xproto::intern_atom(conn, false, b"TEXT")?;
        let incr = xproto::intern_atom(conn, false, b"INCR")?;
        let transfer = xproto::intern_atom(conn, false, TRANSFER_PROPERTY)?;

        Ok(Self {
            clipboard: clipboard.reply()?.atom,
            primary: AtomEnum::PRIMARY.into(),
            targets: targets.reply()?.atom,
            utf8_string: utf8_string.reply()?.atom,
            text: text.reply()?.atom,
            string: AtomEnum::STRING.into(),
            incr: incr.reply()?.atom,
            atom: AtomEnum::ATOM.into(),
            transfer: transfer.reply()?.atom,
        })
    }
}

/// Intern a single application-defined atom.
pub fn intern_named(conn: &impl Connection, name: &str) -> Result<Atom, X11OwnError> {
    Ok(xproto::intern_atom(conn, false, name.as_bytes())?.reply()?.atom)
}

#[cfg(test)]
pub(crate) fn fake() -> Atoms {
    Atoms {
        clipboard: 100,
        primary: 1,
        targets: 101,
        utf8_string: 102,
        text: 103,
        string: 31,
        incr: 104,
        atom: 4,
        transfer: 105,
    }
}
