//! Handler table keyed by event kind.
//!
//! The selection responder does not poll. Whoever pumps the X11 event
//! stream looks up the handler for each event's kind and calls it with
//! the context that owns the state. Nothing runs unless events are
//! pumped.

use std::collections::HashMap;

use x11rb::protocol::Event;

/// Event kinds the clipboard cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SelectionRequest,
    SelectionClear,
    SelectionNotify,
    PropertyNotify,
    /// Asynchronous protocol error for an unchecked request.
    Error,
    Other,
}

impl EventKind {
    pub fn of(event: &Event) -> Self {
        match event {
            Event::SelectionRequest(_) => Self::SelectionRequest,
            Event::SelectionClear(_) => Self::SelectionClear,
            Event::SelectionNotify(_) => Self::SelectionNotify,
            Event::PropertyNotify(_) => Self::PropertyNotify,
            Event::Error(_) => Self::Error,
            _ => Self::Other,
        }
    }
}

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Consumed,
    /// Not ours; the pump should pass the event on.
    Ignored,
}

pub type Handler<C, E> = fn(&mut C, &Event) -> Result<Handled, E>;

/// One handler per event kind.
pub struct HandlerTable<C, E> {
    handlers: HashMap<EventKind, Handler<C, E>>,
}

impl<C, E> HandlerTable<C, E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, returning the one it replaces.
    pub fn register(&mut self, kind: EventKind, handler: Handler<C, E>) -> Option<Handler<C, E>> {
        self.handlers.insert(kind, handler)
    }

    pub fn get(&self, kind: EventKind) -> Option<Handler<C, E>> {
        self.handlers.get(&kind).copied()
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler registered for the event's kind.
    pub fn dispatch(&self, ctx: &mut C, event: &Event) -> Result<Handled, E> {
        match self.get(EventKind::of(event)) {
            Some(handler) => handler(ctx, event),
            None => Ok(Handled::Ignored),
        }
    }
}

impl<C, E> Default for HandlerTable<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::{
        PROPERTY_NOTIFY_EVENT, Property, PropertyNotifyEvent, SELECTION_CLEAR_EVENT,
        SelectionClearEvent,
    };

    #[derive(Default)]
    struct Counter {
        clears: u32,
        properties: u32,
    }

    fn on_clear(ctx: &mut Counter, _event: &Event) -> Result<Handled, String> {
        ctx.clears += 1;
        Ok(Handled::Consumed)
    }

    fn on_property(ctx: &mut Counter, event: &Event) -> Result<Handled, String> {
        let Event::PropertyNotify(ev) = event else {
            return Ok(Handled::Ignored);
        };
        if ev.state == Property::DELETE {
            return Err(format!("unexpected delete on 0x{:x}", ev.window));
        }
        ctx.properties += 1;
        Ok(Handled::Consumed)
    }

    fn clear_event() -> Event {
        Event::SelectionClear(SelectionClearEvent {
            response_type: SELECTION_CLEAR_EVENT,
            sequence: 0,
            time: 0,
            owner: 1,
            selection: 2,
        })
    }

    fn property_event(state: Property) -> Event {
        Event::PropertyNotify(PropertyNotifyEvent {
            response_type: PROPERTY_NOTIFY_EVENT,
            sequence: 0,
            window: 0x20,
            atom: 3,
            time: 0,
            state,
        })
    }

    #[test]
    fn classifies_selection_events() {
        assert_eq!(EventKind::of(&clear_event()), EventKind::SelectionClear);
        assert_eq!(
            EventKind::of(&property_event(Property::NEW_VALUE)),
            EventKind::PropertyNotify
        );
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let mut table: HandlerTable<Counter, String> = HandlerTable::new();
        table.register(EventKind::SelectionClear, on_clear);
        table.register(EventKind::PropertyNotify, on_property);

        let mut ctx = Counter::default();
        assert_eq!(table.dispatch(&mut ctx, &clear_event()), Ok(Handled::Consumed));
        assert_eq!(
            table.dispatch(&mut ctx, &property_event(Property::NEW_VALUE)),
            Ok(Handled::Consumed)
        );
        assert_eq!(ctx.clears, 1);
        assert_eq!(ctx.properties, 1);
    }

    #[test]
    fn unregistered_kind_is_ignored() {
        let table: HandlerTable<Counter, String> = HandlerTable::new();
        let mut ctx = Counter::default();
        assert_eq!(table.dispatch(&mut ctx, &clear_event()), Ok(Handled::Ignored));
        assert_eq!(ctx.clears, 0);
    }

    #[test]
    fn handler_errors_propagate() {
        let mut table: HandlerTable<Counter, String> = HandlerTable::new();
        table.register(EventKind::PropertyNotify, on_property);
        let mut ctx = Counter::default();
        let result = table.dispatch(&mut ctx, &property_event(Property::DELETE));
        assert_eq!(result, Err("unexpected delete on 0x20".to_string()));
    }

    #[test]
    fn register_replaces_previous_handler() {
        let mut table: HandlerTable<Counter, String> = HandlerTable::new();
        assert!(table.register(EventKind::SelectionClear, on_clear).is_none());
        assert!(table.register(EventKind::SelectionClear, on_clear).is_some());
        assert!(table.handles(EventKind::SelectionClear));
        assert!(!table.handles(EventKind::SelectionNotify));
    }
}
