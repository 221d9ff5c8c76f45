//! What a blocked read does with each event it sees.
//!
//! While a get waits for `SelectionNotify` or the next `INCR` chunk, the
//! event stream carries three sorts of traffic: the answer it is waiting
//! for, echoes of its own property writes and deletions, and everything
//! else. Only the last sort goes on to the handler table; echoes are
//! dropped so a process that never pumps does not accumulate them.

use x11rb::protocol::Event;
use x11rb::protocol::xproto::{Atom, Property, SelectionNotifyEvent, Window};

/// The conversion a read is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// Our window, which receives the reply property.
    pub window: Window,
    pub selection: Atom,
    pub property: Atom,
    /// Selection owner when the conversion was requested.
    pub owner: Window,
}

// x11rb events carry no Debug or PartialEq without `extra-traits`.
#[derive(Clone, Copy)]
pub enum Incoming {
    /// The owner answered the conversion.
    Notify(SelectionNotifyEvent),
    /// A new value was written to the reply property.
    NewValue,
    /// The selection moved away from the owner we are reading from.
    OwnerChanged,
    /// Traffic about our own reply property; drop it.
    Echo,
    /// Not part of this conversion.
    Other,
}

pub fn classify(event: &Event, pending: &Pending) -> Incoming {
    match event {
        Event::SelectionNotify(ev)
            if ev.requestor == pending.window && ev.selection == pending.selection =>
        {
            Incoming::Notify(*ev)
        }
        Event::PropertyNotify(ev)
            if ev.window == pending.window && ev.atom == pending.property =>
        {
            if ev.state == Property::NEW_VALUE {
                Incoming::NewValue
            } else {
                Incoming::Echo
            }
        }
        // Destroy and client-close notifications report owner None.
        Event::XfixesSelectionNotify(ev)
            if ev.window == pending.window && ev.selection == pending.selection =>
        {
            if ev.owner == pending.owner {
                Incoming::Echo
            } else {
                Incoming::OwnerChanged
            }
        }
        _ => Incoming::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xfixes::{self, SelectionEvent};
    use x11rb::protocol::xproto::{
        PROPERTY_NOTIFY_EVENT, PropertyNotifyEvent, SELECTION_NOTIFY_EVENT, SELECTION_REQUEST_EVENT,
        SelectionRequestEvent,
    };

    const OURS: Window = 0x200001;
    const OWNER: Window = 0x400001;
    const CLIPBOARD: Atom = 100;
    const TRANSFER: Atom = 105;

    fn pending() -> Pending {
        Pending {
            window: OURS,
            selection: CLIPBOARD,
            property: TRANSFER,
            owner: OWNER,
        }
    }

    fn property(window: Window, atom: Atom, state: Property) -> Event {
        Event::PropertyNotify(PropertyNotifyEvent {
            response_type: PROPERTY_NOTIFY_EVENT,
            sequence: 0,
            window,
            atom,
            time: 0,
            state,
        })
    }

    fn owner_change(subtype: SelectionEvent, owner: Window) -> Event {
        Event::XfixesSelectionNotify(xfixes::SelectionNotifyEvent {
            response_type: 0,
            subtype,
            sequence: 0,
            window: OURS,
            owner,
            selection: CLIPBOARD,
            timestamp: 0,
            selection_timestamp: 0,
        })
    }

    #[test]
    fn answer_to_our_conversion() {
        let ev = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: 0,
            requestor: OURS,
            selection: CLIPBOARD,
            target: 102,
            property: TRANSFER,
        };
        match classify(&Event::SelectionNotify(ev), &pending()) {
            Incoming::Notify(got) => {
                assert_eq!((got.requestor, got.property), (OURS, TRANSFER));
            }
            _ => panic!("expected the conversion answer"),
        }
    }

    #[test]
    fn answer_for_another_selection_is_not_ours() {
        let ev = SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: 0,
            requestor: OURS,
            selection: 1,
            target: 102,
            property: TRANSFER,
        };
        assert!(matches!(
            classify(&Event::SelectionNotify(ev), &pending()),
            Incoming::Other
        ));
    }

    #[test]
    fn reply_property_writes_and_deletes() {
        let p = pending();
        assert!(matches!(
            classify(&property(OURS, TRANSFER, Property::NEW_VALUE), &p),
            Incoming::NewValue
        ));
        assert!(matches!(
            classify(&property(OURS, TRANSFER, Property::DELETE), &p),
            Incoming::Echo
        ));
    }

    #[test]
    fn other_properties_go_to_handlers() {
        let p = pending();
        // A requestor deleting a property we are sending to it.
        assert!(matches!(
            classify(&property(0x600001, 77, Property::DELETE), &p),
            Incoming::Other
        ));
        assert!(matches!(
            classify(&property(OURS, 77, Property::NEW_VALUE), &p),
            Incoming::Other
        ));
    }

    #[test]
    fn new_owner_aborts_the_read() {
        assert!(matches!(
            classify(
                &owner_change(SelectionEvent::SET_SELECTION_OWNER, 0x800001),
                &pending()
            ),
            Incoming::OwnerChanged
        ));
    }

    #[test]
    fn owner_going_away_aborts_the_read() {
        for subtype in [
            SelectionEvent::SELECTION_WINDOW_DESTROY,
            SelectionEvent::SELECTION_CLIENT_CLOSE,
        ] {
            assert!(matches!(
                classify(&owner_change(subtype, 0), &pending()),
                Incoming::OwnerChanged
            ));
        }
    }

    #[test]
    fn notification_naming_the_current_owner_is_dropped() {
        assert!(matches!(
            classify(
                &owner_change(SelectionEvent::SET_SELECTION_OWNER, OWNER),
                &pending()
            ),
            Incoming::Echo
        ));
    }

    #[test]
    fn requests_go_to_handlers() {
        let ev = Event::SelectionRequest(SelectionRequestEvent {
            response_type: SELECTION_REQUEST_EVENT,
            sequence: 0,
            time: 0,
            owner: OURS,
            requestor: 0x600001,
            selection: CLIPBOARD,
            target: 101,
            property: 9,
        });
        assert!(matches!(classify(&ev, &pending()), Incoming::Other));
    }
}
