//! Events - notifications emitted on visibility transitions.
//!
//! When an observer has `emit` set, every firing transition produces a
//! [`MedusaEvent`] named `medusa-<observer id>`. The registry does not
//! propagate it; it hands it to the host's [`EventDispatcher`] with the
//! [`EventTarget`] chosen by the configured [`EmitScope`](crate::EmitScope).

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::primitive::IntersectionEntry;
use crate::types::{ElementId, EmitScope};

/// Prefix of every emitted event name.
pub const EVENT_PREFIX: &str = "medusa-";

/// Event name for an observer id.
pub fn event_name(observer_id: &str) -> String {
    format!("{EVENT_PREFIX}{observer_id}")
}

/// A notification carrying the raw transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedusaEvent {
    /// `medusa-<observer id>`.
    pub name: String,
    pub observer_id: String,
    pub detail: IntersectionEntry,
}

impl MedusaEvent {
    pub fn new(observer_id: &str, detail: IntersectionEntry) -> Self {
        Self {
            name: event_name(observer_id),
            observer_id: observer_id.to_string(),
            detail,
        }
    }
}

/// Where the host should dispatch an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Element(ElementId),
    Global,
}

/// Targets an event goes to under `scope`, element first.
pub fn targets_for(scope: EmitScope, element: ElementId) -> Vec<EventTarget> {
    let mut targets = Vec::with_capacity(2);
    if scope.contains(EmitScope::ELEMENT) {
        targets.push(EventTarget::Element(element));
    }
    if scope.contains(EmitScope::GLOBAL) {
        targets.push(EventTarget::Global);
    }
    targets
}

/// Host side of event dispatch. Closures implement it.
pub trait EventDispatcher {
    fn dispatch_event(&self, target: EventTarget, event: &MedusaEvent);
}

impl<F> EventDispatcher for F
where
    F: Fn(EventTarget, &MedusaEvent),
{
    fn dispatch_event(&self, target: EventTarget, event: &MedusaEvent) {
        self(target, event)
    }
}

/// Dispatcher that records every event, for hosts that poll.
///
/// Cloning shares the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<(EventTarget, MedusaEvent)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(EventTarget, MedusaEvent)> {
        self.events.borrow().clone()
    }

    /// Events dispatched with the given name.
    pub fn named(&self, name: &str) -> Vec<(EventTarget, MedusaEvent)> {
        self.events
            .borrow()
            .iter()
            .filter(|(_, event)| event.name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventDispatcher for EventLog {
    fn dispatch_event(&self, target: EventTarget, event: &MedusaEvent) {
        self.events.borrow_mut().push((target, event.clone()));
    }
}
