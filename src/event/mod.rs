//! Sheet lifecycle events (nouns)
//!
//! The engine announces every read and write on its [`EventBus`]. Listeners
//! run synchronously, in registration order, on the calling thread.

use std::fmt;
use tracing::trace;

use crate::sheet::DataSheet;

/// The operation an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Read,
    Create,
    Update,
    Delete,
    Replace,
    Validate,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Read => "read",
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
            EventKind::Replace => "replace",
            EventKind::Validate => "validate",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    Before(EventKind),
    After(EventKind),
}

impl EventPhase {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPhase::Before(kind) | EventPhase::After(kind) => *kind,
        }
    }

    pub fn is_before(&self) -> bool {
        matches!(self, EventPhase::Before(_))
    }
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPhase::Before(kind) => write!(f, "before {}", kind),
            EventPhase::After(kind) => write!(f, "after {}", kind),
        }
    }
}

/// An event: phase, affected sheet and the number of affected rows
///
/// `affected_rows` is the number of rows in the sheet for `Before` events
/// and the number of rows the data source reported for `After` events.
#[derive(Debug, Clone, Copy)]
pub struct SheetEvent<'a> {
    pub phase: EventPhase,
    pub sheet: &'a DataSheet,
    pub affected_rows: usize,
}

impl SheetEvent<'_> {
    pub fn object(&self) -> &str {
        self.sheet.object()
    }
}

type Listener = Box<dyn Fn(&SheetEvent<'_>) + Send + Sync>;

/// Synchronous event dispatcher
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(Option<EventPhase>, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&SheetEvent<'_>) + Send + Sync + 'static,
    {
        self.listeners.push((None, Box::new(listener)));
    }

    /// Register a listener for one phase only
    pub fn subscribe_to<F>(&mut self, phase: EventPhase, listener: F)
    where
        F: Fn(&SheetEvent<'_>) + Send + Sync + 'static,
    {
        self.listeners.push((Some(phase), Box::new(listener)));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&self, phase: EventPhase, sheet: &DataSheet, affected_rows: usize) {
        trace!(target: "metasheet::event", "{} '{}' ({} rows)", phase, sheet.object(), affected_rows);
        let event = SheetEvent {
            phase,
            sheet,
            affected_rows,
        };
        for (filter, listener) in &self.listeners {
            if filter.map_or(true, |p| p == phase) {
                listener(&event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.listeners.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_in_order_with_phase_filter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let all = Arc::clone(&seen);
        bus.subscribe(move |e| all.lock().push(format!("all {} {}", e.phase, e.affected_rows)));
        let deletes = Arc::clone(&seen);
        bus.subscribe_to(EventPhase::After(EventKind::Delete), move |e| {
            deletes.lock().push(format!("delete {}", e.object()))
        });

        let sheet = DataSheet::new("ORDER");
        bus.dispatch(EventPhase::Before(EventKind::Delete), &sheet, 2);
        bus.dispatch(EventPhase::After(EventKind::Delete), &sheet, 3);

        assert_eq!(
            *seen.lock(),
            vec!["all before delete 2", "all after delete 3", "delete ORDER"]
        );
    }

    #[test]
    fn test_phase_accessors() {
        let phase = EventPhase::After(EventKind::Replace);
        assert_eq!(phase.kind(), EventKind::Replace);
        assert!(!phase.is_before());
        assert_eq!(phase.to_string(), "after replace");
    }
}
