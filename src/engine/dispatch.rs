//! Dispatch Engine - what a transition batch turns into.
//!
//! For every entry, in batch order:
//!
//! 1. Resolve observer and membership. Entries for removed observers or for
//!    elements no longer attached are dropped.
//! 2. Apply the firing mode. `Once` ignores non-intersecting entries and
//!    detaches the element before anything fires.
//! 3. Release the engine, then fire: emit the `medusa-<id>` event (if
//!    `emit`), then the element's callback, falling back to the observer's.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use spark_signals::Signal;
use tracing::{trace, warn};

use super::Engine;
use crate::events::{targets_for, EventDispatcher, EventTarget, MedusaEvent};
use crate::primitive::{IntersectionEntry, PrimitiveHandle, TransitionCallback};
use crate::types::{MedusaCallback, Mode};

// =============================================================================
// FIRING
// =============================================================================

/// Everything needed to run a handler chain once the engine is released.
pub(crate) struct Firing {
    observer_id: String,
    entry: IntersectionEntry,
    emit_targets: Vec<EventTarget>,
    events: Rc<dyn EventDispatcher>,
    callback: Option<MedusaCallback>,
    primitive: Option<PrimitiveHandle>,
    last_entry: Signal<Option<IntersectionEntry>>,
}

impl Firing {
    pub(crate) fn fire(self) {
        self.last_entry.set(Some(self.entry.clone()));

        if !self.emit_targets.is_empty() {
            let event = MedusaEvent::new(&self.observer_id, self.entry.clone());
            for target in self.emit_targets {
                self.events.dispatch_event(target, &event);
            }
        }

        if let Some(callback) = self.callback {
            callback(&self.entry, self.primitive.as_ref());
        }
    }
}

impl Engine {
    /// Decide what `entry` does for observer `id`, applying any detachment.
    /// Returns `None` when nothing should fire.
    pub(crate) fn plan(&mut self, id: &str, entry: &IntersectionEntry) -> Option<Firing> {
        if self.is_destroyed() {
            return None;
        }

        let Some(observer) = self.registry.get(id) else {
            trace!(observer = %id, "batch for unknown observer dropped");
            return None;
        };
        let Some(membership) = self.members.get(entry.target, id) else {
            trace!(observer = %id, target = %entry.target, "stale entry dropped");
            return None;
        };

        let mode = observer.mode;
        let emit = observer.emit;
        let auto_remove = observer.auto_remove;
        // Element callback wins over the observer default
        let callback = membership
            .callback
            .clone()
            .or_else(|| observer.callback.clone());

        if mode == Mode::Once {
            if !entry.is_intersecting {
                return None;
            }
            self.unobserve(id, entry.target);

            let drained = self
                .registry
                .get(id)
                .is_some_and(|observer| observer.observed_nodes.is_empty());
            if auto_remove && drained {
                self.remove_observer(id);
            }
        }

        trace!(
            observer = %id,
            target = %entry.target,
            intersecting = entry.is_intersecting,
            "transition fired"
        );

        let emit_targets = if emit {
            targets_for(self.emit_scope, entry.target)
        } else {
            Vec::new()
        };

        Some(Firing {
            observer_id: id.to_string(),
            entry: entry.clone(),
            emit_targets,
            events: self.events.clone(),
            callback,
            primitive: self.registry.get(id).and_then(|o| o.primitive.clone()),
            last_entry: self.last_entry.clone(),
        })
    }
}

// =============================================================================
// BATCH HANDLING
// =============================================================================

/// Run a batch delivered by the primitive of observer `id`.
pub(crate) fn handle_batch(
    engine: &Weak<RefCell<Engine>>,
    id: &str,
    entries: &[IntersectionEntry],
) {
    let Some(engine) = engine.upgrade() else {
        return;
    };

    for entry in entries {
        let (firing, warnings, sink) = {
            let Ok(mut guard) = engine.try_borrow_mut() else {
                warn!(observer = %id, "transition batch delivered re-entrantly; dropped");
                return;
            };
            let firing = guard.plan(id, entry);
            (firing, guard.take_warnings(), guard.sink.clone())
        };

        for warning in &warnings {
            sink.warn(warning);
        }
        if let Some(firing) = firing {
            firing.fire();
        }
    }
}

/// Callback bound to an observer's primitive at creation.
pub(crate) fn batch_callback(engine: Weak<RefCell<Engine>>, id: String) -> TransitionCallback {
    Rc::new(move |entries: &[IntersectionEntry]| handle_batch(&engine, &id, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObserverConfig;
    use crate::error::TracingSink;
    use crate::events::EventLog;
    use crate::primitive::ManualViewport;
    use crate::types::{callback, ElementId, EmitScope};
    use std::cell::Cell;

    struct Fixture {
        viewport: ManualViewport,
        events: EventLog,
        engine: Rc<RefCell<Engine>>,
    }

    fn fixture() -> Fixture {
        let viewport = ManualViewport::new();
        let events = EventLog::new();
        let engine = Rc::new(RefCell::new(Engine::new(
            Rc::new(viewport.clone()),
            Rc::new(events.clone()),
            Rc::new(TracingSink),
            true,
            EmitScope::default(),
        )));
        Fixture { viewport, events, engine }
    }

    impl Fixture {
        fn add(&self, config: ObserverConfig) {
            let weak = Rc::downgrade(&self.engine);
            self.engine.borrow_mut().add_observer(config, &weak);
        }
    }

    fn counter() -> (Rc<Cell<usize>>, MedusaCallback) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let cb = callback(move |_, _| count_clone.set(count_clone.get() + 1));
        (count, cb)
    }

    #[test]
    fn test_default_mode_fires_every_transition() {
        let f = fixture();
        let (count, cb) = counter();
        f.add(
            ObserverConfig::new("a")
                .nodes(ElementId(1))
                .callback(move |e, p| cb(e, p)),
        );

        f.viewport.set_intersecting(ElementId(1), true);
        f.viewport.set_intersecting(ElementId(1), false);
        f.viewport.set_intersecting(ElementId(1), true);

        assert_eq!(count.get(), 3);
        assert!(f.events.is_empty());
        assert!(f.engine.borrow().members.contains(ElementId(1), "a"));
    }

    #[test]
    fn test_once_ignores_exit_then_detaches() {
        let f = fixture();
        let (count, cb) = counter();
        f.add(
            ObserverConfig::new("b")
                .mode(Mode::Once)
                .emit(true)
                .nodes(ElementId(2))
                .callback(move |e, p| cb(e, p)),
        );

        f.viewport.trigger(0, &[IntersectionEntry::leaving(ElementId(2))]);
        assert_eq!(count.get(), 0);

        f.viewport.trigger(0, &[IntersectionEntry::entering(ElementId(2))]);
        assert_eq!(count.get(), 1);
        assert_eq!(f.events.named("medusa-b").len(), 1);
        assert!(!f.engine.borrow().members.has_record(ElementId(2)));

        // A second synthetic transition for the same pair does nothing
        f.viewport.trigger(0, &[IntersectionEntry::entering(ElementId(2))]);
        assert_eq!(count.get(), 1);
        assert_eq!(f.events.len(), 1);
    }

    #[test]
    fn test_element_callback_wins() {
        let f = fixture();
        let (default_count, default_cb) = counter();
        let (element_count, element_cb) = counter();
        f.add(ObserverConfig::new("a").callback(move |e, p| default_cb(e, p)));
        f.engine.borrow_mut().observe("a", ElementId(1), Some(element_cb));
        f.engine.borrow_mut().observe("a", ElementId(2), None);

        f.viewport.set_intersecting(ElementId(1), true);
        f.viewport.set_intersecting(ElementId(2), true);

        assert_eq!(element_count.get(), 1);
        assert_eq!(default_count.get(), 1);
    }

    #[test]
    fn test_callback_sees_detached_state() {
        let f = fixture();
        let weak = Rc::downgrade(&f.engine);
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();
        f.add(
            ObserverConfig::new("b")
                .mode(Mode::Once)
                .nodes(ElementId(5))
                .callback(move |entry, primitive| {
                    let engine = weak.upgrade().unwrap();
                    let still_member = engine.borrow().members.contains(entry.target, "b");
                    seen_clone.set(Some((still_member, primitive.is_some())));
                }),
        );

        f.viewport.set_intersecting(ElementId(5), true);
        assert_eq!(seen.get(), Some((false, true)));
    }

    #[test]
    fn test_auto_remove_after_last_element() {
        let f = fixture();
        let got_primitive = Rc::new(Cell::new(true));
        let got_clone = got_primitive.clone();
        f.add(
            ObserverConfig::new("once")
                .mode(Mode::Once)
                .auto_remove(true)
                .nodes([ElementId(1), ElementId(2)])
                .callback(move |_, primitive| got_clone.set(primitive.is_some())),
        );

        f.viewport.set_intersecting(ElementId(1), true);
        assert!(f.engine.borrow().registry.contains("once"));
        assert!(got_primitive.get());

        f.viewport.set_intersecting(ElementId(2), true);
        assert!(!f.engine.borrow().registry.contains("once"));
        assert!(!f.viewport.is_connected(0));
        assert!(!got_primitive.get());
    }

    #[test]
    fn test_stale_and_unknown_entries_dropped() {
        let f = fixture();
        let (count, cb) = counter();
        f.add(ObserverConfig::new("a").callback(move |e, p| cb(e, p)));

        // Never observed
        f.viewport.trigger(0, &[IntersectionEntry::entering(ElementId(8))]);
        assert_eq!(count.get(), 0);

        // Batch for an id that was never registered
        let weak = Rc::downgrade(&f.engine);
        handle_batch(&weak, "ghost", &[IntersectionEntry::entering(ElementId(8))]);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_batch_order_and_last_entry() {
        let f = fixture();
        let order = Rc::new(RefCell::new(Vec::new()));
        let order_clone = order.clone();
        f.add(
            ObserverConfig::new("a")
                .nodes([ElementId(1), ElementId(2)])
                .callback(move |entry, _| order_clone.borrow_mut().push(entry.target)),
        );

        f.viewport.trigger(
            0,
            &[
                IntersectionEntry::entering(ElementId(2)),
                IntersectionEntry::entering(ElementId(1)).with_time(4.0),
            ],
        );

        assert_eq!(*order.borrow(), vec![ElementId(2), ElementId(1)]);
        let last = f.engine.borrow().last_entry.get();
        assert_eq!(last, Some(IntersectionEntry::entering(ElementId(1)).with_time(4.0)));
    }

    #[test]
    fn test_emit_scope_global() {
        let f = fixture();
        f.engine.borrow_mut().emit_scope = EmitScope::ELEMENT | EmitScope::GLOBAL;
        f.add(ObserverConfig::new("g").emit(true).nodes(ElementId(3)));

        f.viewport.set_intersecting(ElementId(3), false);

        let targets: Vec<EventTarget> = f.events.events().into_iter().map(|(t, _)| t).collect();
        assert_eq!(targets, vec![EventTarget::Element(ElementId(3)), EventTarget::Global]);
    }

    #[test]
    fn test_dropped_engine_ignores_batches() {
        let f = fixture();
        let (count, cb) = counter();
        f.add(
            ObserverConfig::new("a")
                .nodes(ElementId(1))
                .callback(move |e, p| cb(e, p)),
        );
        let weak = Rc::downgrade(&f.engine);

        drop(f.engine);
        handle_batch(&weak, "a", &[IntersectionEntry::entering(ElementId(1))]);
        assert_eq!(count.get(), 0);
    }
}
