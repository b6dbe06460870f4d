//! Engine - registry, membership and dispatch state behind the facade.
//!
//! The engine manages the core data structures:
//! - Registry: observer id → observer (primitive, observed nodes, mode)
//! - Membership: element → observer id → membership id + callback
//! - Dispatch: turning primitive batches into events and callbacks
//!
//! # Invariant
//!
//! An observer's `observed_nodes` and the membership table change together,
//! inside one `&mut Engine` call:
//!
//! ```text
//! observe(a, #1)   → members[#1][a] = m1,  observers[a].observed_nodes[m1] = #1
//! unobserve(a, #1) → members[#1] dropped,  observers[a].observed_nodes = {}
//! ```
//!
//! Warnings raised while the engine is borrowed are queued and handed to the
//! sink by the caller once the borrow is released.

mod dispatch;
mod membership;
mod registry;

pub(crate) use dispatch::*;
pub(crate) use membership::*;
pub use registry::ObserverInfo;
pub(crate) use registry::*;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use spark_signals::{signal, Signal};
use tracing::debug;

use crate::config::ObserverConfig;
use crate::error::{MedusaWarning, WarningSink};
use crate::events::{EventDispatcher, EventTarget, MedusaEvent};
use crate::primitive::{IntersectionEntry, PrimitiveFactory, PrimitiveHandle};
use crate::types::{ElementId, EmitScope, MedusaCallback};
use crate::utils::uid;

// =============================================================================
// Engine State
// =============================================================================

pub(crate) struct Engine {
    pub(crate) registry: Registry,
    pub(crate) members: MembershipTracker,
    /// `None` once destroyed.
    factory: Option<Rc<dyn PrimitiveFactory>>,
    pub(crate) events: Rc<dyn EventDispatcher>,
    pub(crate) sink: Rc<dyn WarningSink>,
    debug: bool,
    pub(crate) emit_scope: EmitScope,
    /// Last entry that fired a handler chain.
    pub(crate) last_entry: Signal<Option<IntersectionEntry>>,
    pending: Vec<MedusaWarning>,
    destroyed: bool,
}

impl Engine {
    pub(crate) fn new(
        factory: Rc<dyn PrimitiveFactory>,
        events: Rc<dyn EventDispatcher>,
        sink: Rc<dyn WarningSink>,
        debug: bool,
        emit_scope: EmitScope,
    ) -> Self {
        Self {
            registry: Registry::default(),
            members: MembershipTracker::default(),
            factory: Some(factory),
            events,
            sink,
            debug,
            emit_scope,
            last_entry: signal(None),
            pending: Vec::new(),
            destroyed: false,
        }
    }

    // -------------------------------------------------------------------------
    // Warnings
    // -------------------------------------------------------------------------

    /// Queue a warning; dropped unless debug is on.
    pub(crate) fn report(&mut self, warning: MedusaWarning) {
        if self.debug {
            self.pending.push(warning);
        }
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<MedusaWarning> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    /// Validate and register one config. `this` is handed to the primitive's
    /// callback so batches can find their way back.
    pub(crate) fn add_observer(
        &mut self,
        config: ObserverConfig,
        this: &Weak<RefCell<Engine>>,
    ) -> bool {
        if !config.id.is_empty() && self.registry.contains(&config.id) {
            self.report(MedusaWarning::DuplicateId(config.id));
            return false;
        }

        let options = match config.primitive_options() {
            Ok(options) => options,
            Err(warning) => {
                self.report(warning);
                return false;
            }
        };

        let Some(factory) = self.factory.clone() else {
            self.report(MedusaWarning::Destroyed);
            return false;
        };

        let ObserverConfig {
            id,
            nodes,
            mode,
            emit,
            auto_remove,
            callback,
            ..
        } = config;

        let transition_callback = batch_callback(this.clone(), id.clone());
        let primitive: PrimitiveHandle =
            Rc::new(RefCell::new(factory.create(&options, transition_callback)));

        self.registry.insert(Observer {
            id: id.clone(),
            options,
            primitive: Some(primitive),
            observed_nodes: HashMap::new(),
            mode,
            emit,
            auto_remove,
            callback,
        });
        debug!(observer = %id, ?mode, emit, "observer registered");

        for node in nodes {
            self.observe(&id, node, None);
        }
        true
    }

    pub(crate) fn get_observer(&mut self, id: &str) -> Option<ObserverInfo> {
        let info = self.registry.get(id).map(Observer::info);
        if info.is_none() {
            self.report(MedusaWarning::UnknownObserver(id.to_string()));
        }
        info
    }

    /// Detach every element of `id`, keeping the observer alive.
    /// Returns how many elements were detached.
    pub(crate) fn clear_observer(&mut self, id: &str) -> usize {
        let elements = match self.registry.get(id) {
            Some(observer) => observer.elements(),
            None => {
                self.report(MedusaWarning::UnknownObserver(id.to_string()));
                return 0;
            }
        };

        let mut detached = 0;
        for element in elements {
            if self.unobserve(id, element) {
                detached += 1;
            }
        }
        detached
    }

    /// Detach everything, disconnect the primitive, forget the id.
    pub(crate) fn remove_observer(&mut self, id: &str) -> bool {
        if !self.registry.contains(id) {
            self.report(MedusaWarning::UnknownObserver(id.to_string()));
            return false;
        }

        self.clear_observer(id);
        if let Some(mut observer) = self.registry.remove(id) {
            observer.disconnect();
        }
        debug!(observer = %id, "observer removed");
        true
    }

    pub(crate) fn clear_all_observers(&mut self) {
        for id in self.registry.ids() {
            self.clear_observer(&id);
        }
    }

    pub(crate) fn remove_all_observers(&mut self) {
        for id in self.registry.ids() {
            self.remove_observer(&id);
        }
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    pub(crate) fn observe(
        &mut self,
        id: &str,
        element: ElementId,
        callback: Option<MedusaCallback>,
    ) -> bool {
        if !self.registry.contains(id) {
            self.report(MedusaWarning::UnknownObserver(id.to_string()));
            return false;
        }
        if self.members.contains(element, id) {
            self.report(MedusaWarning::AlreadyObserved {
                observer: id.to_string(),
                element,
            });
            return false;
        }

        let membership_id = uid();
        if let Some(observer) = self.registry.get_mut(id) {
            observer.attach(membership_id.clone(), element);
        }
        self.members.insert(element, id, Membership { membership_id, callback });
        true
    }

    pub(crate) fn unobserve(&mut self, id: &str, element: ElementId) -> bool {
        if !self.registry.contains(id) {
            self.report(MedusaWarning::UnknownObserver(id.to_string()));
            return false;
        }
        let Some(membership) = self.members.remove(element, id) else {
            self.report(MedusaWarning::NotObserved {
                observer: id.to_string(),
                element,
            });
            return false;
        };

        if let Some(observer) = self.registry.get_mut(id) {
            observer.detach(&membership.membership_id, element);
        }
        true
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Remove every observer and release state. Later calls are refused.
    ///
    /// The factory and the dispatcher are released too, so anything they
    /// capture is freed. The sink stays: refused calls still report.
    pub(crate) fn destroy(&mut self) {
        debug!(
            observers = self.registry.len(),
            elements = self.members.record_count(),
            "destroying medusa"
        );
        self.remove_all_observers();
        self.members.clear();
        self.factory = None;
        self.events = Rc::new(|_: EventTarget, _: &MedusaEvent| {});
        self.destroyed = true;
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for mut observer in self.registry.drain() {
            observer.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::ManualViewport;
    use crate::types::Mode;

    fn engine(viewport: &ManualViewport) -> Rc<RefCell<Engine>> {
        Rc::new(RefCell::new(Engine::new(
            Rc::new(viewport.clone()),
            Rc::new(|_: crate::events::EventTarget, _: &crate::events::MedusaEvent| {}),
            Rc::new(crate::error::TracingSink),
            true,
            EmitScope::default(),
        )))
    }

    fn add(engine: &Rc<RefCell<Engine>>, config: ObserverConfig) -> bool {
        let weak = Rc::downgrade(engine);
        engine.borrow_mut().add_observer(config, &weak)
    }

    #[test]
    fn test_add_observer_with_nodes() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);

        assert!(add(&engine, ObserverConfig::new("a").nodes([ElementId(1), ElementId(2)])));

        let mut e = engine.borrow_mut();
        let info = e.get_observer("a").unwrap();
        assert_eq!(info.elements(), vec![ElementId(1), ElementId(2)]);
        assert_eq!(viewport.observed(0), vec![ElementId(1), ElementId(2)]);
        assert!(e.members.contains(ElementId(1), "a"));
        assert!(e.take_warnings().is_empty());
    }

    #[test]
    fn test_duplicate_id_keeps_original() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);

        assert!(add(&engine, ObserverConfig::new("x")));
        assert!(!add(&engine, ObserverConfig::new("x").mode(Mode::Once)));

        let mut e = engine.borrow_mut();
        assert_eq!(viewport.instance_count(), 1);
        assert_eq!(e.get_observer("x").unwrap().mode, Mode::Default);
        assert_eq!(e.take_warnings(), vec![MedusaWarning::DuplicateId("x".to_string())]);
    }

    #[test]
    fn test_observe_unobserve_symmetry() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);
        add(&engine, ObserverConfig::new("a").nodes(ElementId(9)));

        let mut e = engine.borrow_mut();
        let before = e.get_observer("a").unwrap().elements();

        assert!(e.observe("a", ElementId(1), None));
        assert!(e.unobserve("a", ElementId(1)));

        assert!(!e.members.has_record(ElementId(1)));
        assert_eq!(e.get_observer("a").unwrap().elements(), before);
        assert_eq!(viewport.observed(0), vec![ElementId(9)]);
    }

    #[test]
    fn test_usage_warnings() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);
        add(&engine, ObserverConfig::new("a"));

        let mut e = engine.borrow_mut();
        assert!(!e.observe("missing", ElementId(1), None));
        assert!(!e.unobserve("a", ElementId(1)));
        assert!(e.observe("a", ElementId(1), None));
        assert!(!e.observe("a", ElementId(1), None));

        assert_eq!(
            e.take_warnings(),
            vec![
                MedusaWarning::UnknownObserver("missing".to_string()),
                MedusaWarning::NotObserved {
                    observer: "a".to_string(),
                    element: ElementId(1)
                },
                MedusaWarning::AlreadyObserved {
                    observer: "a".to_string(),
                    element: ElementId(1)
                },
            ]
        );
    }

    #[test]
    fn test_clear_keeps_primitive() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);
        add(&engine, ObserverConfig::new("a").nodes([ElementId(1), ElementId(2)]));

        let mut e = engine.borrow_mut();
        assert_eq!(e.clear_observer("a"), 2);
        assert_eq!(e.members.record_count(), 0);
        assert!(viewport.is_connected(0));
        assert!(e.observe("a", ElementId(3), None));
    }

    #[test]
    fn test_remove_disconnects() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);
        add(&engine, ObserverConfig::new("a").nodes(ElementId(1)));

        let mut e = engine.borrow_mut();
        assert!(e.remove_observer("a"));
        assert!(!viewport.is_connected(0));
        assert!(!e.members.has_record(ElementId(1)));
        assert!(!e.remove_observer("a"));
        assert_eq!(e.take_warnings(), vec![MedusaWarning::UnknownObserver("a".to_string())]);
    }

    #[test]
    fn test_debug_off_is_silent() {
        let viewport = ManualViewport::new();
        let engine = Rc::new(RefCell::new(Engine::new(
            Rc::new(viewport.clone()),
            Rc::new(|_: crate::events::EventTarget, _: &crate::events::MedusaEvent| {}),
            Rc::new(crate::error::TracingSink),
            false,
            EmitScope::default(),
        )));

        let mut e = engine.borrow_mut();
        assert!(!e.remove_observer("nope"));
        assert!(e.take_warnings().is_empty());
    }

    #[test]
    fn test_drop_disconnects_primitives() {
        let viewport = ManualViewport::new();
        let engine = engine(&viewport);
        add(&engine, ObserverConfig::new("a"));
        add(&engine, ObserverConfig::new("b"));

        drop(engine);
        assert!(!viewport.is_connected(0));
        assert!(!viewport.is_connected(1));
    }
}
