//! Medusa - the public registry facade.
//!
//! Wraps the engine in `Rc<RefCell<..>>`. Every call borrows the engine,
//! releases it, then flushes queued warnings to the sink, so warning sinks,
//! event dispatchers and transition callbacks may all call back in.
//!
//! # API
//!
//! - `add_observer(config | configs)` - Register named observers
//! - `add_observers_from_json(value)` - Register from JSON
//! - `get_observer(id)` - Snapshot of one observer
//! - `observe(id, elements, callback)` - Attach elements
//! - `unobserve(id, elements)` - Detach elements
//! - `clear_observer(id)` / `clear_all_observers()` - Detach, keep observers
//! - `remove_observer(id)` / `remove_all_observers()` - Tear observers down
//! - `destroy()` - Tear everything down; the instance is unusable after
//!
//! # Example
//!
//! ```
//! use medusa::{ElementId, Medusa, MedusaOptions, Mode, ObserverConfig};
//! use medusa::primitive::ManualViewport;
//!
//! let viewport = ManualViewport::new();
//! let medusa = Medusa::new(MedusaOptions::default(), viewport.clone());
//!
//! medusa.add_observer(
//!     ObserverConfig::new("reveal")
//!         .mode(Mode::Once)
//!         .nodes([ElementId(1), ElementId(2)])
//!         .callback(|entry, _| println!("{} revealed", entry.target)),
//! );
//!
//! viewport.set_intersecting(ElementId(1), true);
//! assert!(!medusa.is_observing("reveal", ElementId(1)));
//! assert!(medusa.is_observing("reveal", ElementId(2)));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use spark_signals::Signal;
use tracing::{debug, trace, warn};

use crate::config::{configs_from_json, MedusaOptions, ObserverConfig};
use crate::engine::{Engine, ObserverInfo};
use crate::error::{MedusaWarning, TracingSink, WarningSink};
use crate::events::{EventDispatcher, EventTarget, MedusaEvent};
use crate::primitive::{IntersectionEntry, PrimitiveFactory, PrimitiveHandle};
use crate::types::{ElementId, EmitScope, IntoElements, MedusaCallback};

// =============================================================================
// CONFIG INPUT
// =============================================================================

/// One config or a collection of them.
pub trait IntoConfigs {
    fn into_configs(self) -> Vec<ObserverConfig>;
}

impl IntoConfigs for ObserverConfig {
    fn into_configs(self) -> Vec<ObserverConfig> {
        vec![self]
    }
}

impl IntoConfigs for Vec<ObserverConfig> {
    fn into_configs(self) -> Vec<ObserverConfig> {
        self
    }
}

impl<const N: usize> IntoConfigs for [ObserverConfig; N] {
    fn into_configs(self) -> Vec<ObserverConfig> {
        self.into()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds a [`Medusa`] with a custom event dispatcher or warning sink.
pub struct MedusaBuilder {
    factory: Rc<dyn PrimitiveFactory>,
    options: MedusaOptions,
    events: Option<Rc<dyn EventDispatcher>>,
    sink: Option<Rc<dyn WarningSink>>,
}

impl MedusaBuilder {
    pub fn new(factory: impl PrimitiveFactory + 'static) -> Self {
        Self {
            factory: Rc::new(factory),
            options: MedusaOptions::default(),
            events: None,
            sink: None,
        }
    }

    /// Replace all options at once.
    pub fn options(mut self, options: MedusaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    pub fn emit_scope(mut self, scope: EmitScope) -> Self {
        self.options.emit_scope = scope;
        self
    }

    /// Register `config` at build time.
    pub fn observer(mut self, config: ObserverConfig) -> Self {
        self.options.observers.push(config);
        self
    }

    pub fn observers(mut self, configs: impl IntoIterator<Item = ObserverConfig>) -> Self {
        self.options.observers.extend(configs);
        self
    }

    /// Where `medusa-<id>` events go. Without one, events are only traced.
    pub fn events(mut self, events: impl EventDispatcher + 'static) -> Self {
        self.events = Some(Rc::new(events));
        self
    }

    /// Where warnings go. Defaults to [`TracingSink`].
    pub fn sink(mut self, sink: impl WarningSink + 'static) -> Self {
        self.sink = Some(Rc::new(sink));
        self
    }

    pub fn build(self) -> Medusa {
        let MedusaOptions {
            observers,
            debug,
            emit_scope,
        } = self.options;

        let events: Rc<dyn EventDispatcher> = match self.events {
            Some(events) => events,
            None => Rc::new(trace_event),
        };
        let sink: Rc<dyn WarningSink> = match self.sink {
            Some(sink) => sink,
            None => Rc::new(TracingSink),
        };

        let engine = Engine::new(self.factory, events, sink, debug, emit_scope);
        let medusa = Medusa {
            last_entry: engine.last_entry.clone(),
            engine: Rc::new(RefCell::new(engine)),
        };
        let debug_enabled = debug;
        debug!(observers = observers.len(), debug_enabled, "medusa created");

        medusa.add_observer(observers);
        medusa
    }
}

fn trace_event(target: EventTarget, event: &MedusaEvent) {
    trace!(?target, name = %event.name, "event emitted without a dispatcher");
}

// =============================================================================
// MEDUSA
// =============================================================================

/// Registry of named visibility observers.
///
/// Clones share the same registry.
#[derive(Clone)]
pub struct Medusa {
    engine: Rc<RefCell<Engine>>,
    /// Shared with the engine; readable while the engine is busy.
    last_entry: Signal<Option<IntersectionEntry>>,
}

impl Medusa {
    /// Create an instance and register `options.observers`.
    pub fn new(options: MedusaOptions, factory: impl PrimitiveFactory + 'static) -> Self {
        MedusaBuilder::new(factory).options(options).build()
    }

    pub fn builder(factory: impl PrimitiveFactory + 'static) -> MedusaBuilder {
        MedusaBuilder::new(factory)
    }

    /// Run `f` on the live engine, then flush warnings with the borrow released.
    fn with_engine<R>(&self, fallback: R, f: impl FnOnce(&mut Engine) -> R) -> R {
        let (result, warnings, sink) = {
            let Ok(mut engine) = self.engine.try_borrow_mut() else {
                warn!("medusa called while busy; call ignored");
                return fallback;
            };
            let result = if engine.is_destroyed() {
                engine.report(MedusaWarning::Destroyed);
                fallback
            } else {
                f(&mut engine)
            };
            (result, engine.take_warnings(), engine.sink.clone())
        };

        for warning in &warnings {
            sink.warn(warning);
        }
        result
    }

    /// Read-only access for queries. Never reports.
    fn read<R>(&self, fallback: R, f: impl FnOnce(&Engine) -> R) -> R {
        match self.engine.try_borrow() {
            Ok(engine) => f(&engine),
            Err(_) => fallback,
        }
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    /// Register one or more observers. Invalid or duplicate configs are
    /// reported and skipped. Returns how many were registered.
    pub fn add_observer(&self, configs: impl IntoConfigs) -> usize {
        let this = Rc::downgrade(&self.engine);
        self.with_engine(0, |engine| {
            configs
                .into_configs()
                .into_iter()
                .map(|config| engine.add_observer(config, &this))
                .filter(|added| *added)
                .count()
        })
    }

    /// Register observers from JSON: one object or an array of objects.
    /// Entries that are not objects or don't deserialize are reported and
    /// skipped.
    pub fn add_observers_from_json(&self, value: Value) -> usize {
        let this = Rc::downgrade(&self.engine);
        self.with_engine(0, |engine| {
            let mut added = 0;
            for config in configs_from_json(value) {
                match config {
                    Ok(config) => {
                        if engine.add_observer(config, &this) {
                            added += 1;
                        }
                    }
                    Err(warning) => engine.report(warning),
                }
            }
            added
        })
    }

    /// Snapshot of observer `id`. Reports unknown ids.
    pub fn get_observer(&self, id: &str) -> Option<ObserverInfo> {
        self.with_engine(None, |engine| engine.get_observer(id))
    }

    /// Detach every element, disconnect the primitive and forget `id`.
    pub fn remove_observer(&self, id: &str) -> bool {
        self.with_engine(false, |engine| engine.remove_observer(id))
    }

    /// Detach every element of `id`; the observer stays registered.
    /// Returns how many elements were detached.
    pub fn clear_observer(&self, id: &str) -> usize {
        self.with_engine(0, |engine| engine.clear_observer(id))
    }

    pub fn clear_all_observers(&self) {
        self.with_engine((), |engine| engine.clear_all_observers())
    }

    pub fn remove_all_observers(&self) {
        self.with_engine((), |engine| engine.remove_all_observers())
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Attach elements to observer `id`, optionally with a handler that
    /// overrides the observer's default for these elements.
    ///
    /// Each element is handled on its own; returns how many were attached.
    pub fn observe(
        &self,
        id: &str,
        elements: impl IntoElements,
        callback: Option<MedusaCallback>,
    ) -> usize {
        let elements = elements.into_elements();
        self.with_engine(0, |engine| {
            elements
                .into_iter()
                .filter(|element| engine.observe(id, *element, callback.clone()))
                .count()
        })
    }

    /// [`observe`](Self::observe) with a closure handler.
    pub fn observe_with<F>(&self, id: &str, elements: impl IntoElements, f: F) -> usize
    where
        F: Fn(&IntersectionEntry, Option<&PrimitiveHandle>) + 'static,
    {
        self.observe(id, elements, Some(Rc::new(f)))
    }

    /// Detach elements from observer `id`. Returns how many were detached.
    pub fn unobserve(&self, id: &str, elements: impl IntoElements) -> usize {
        let elements = elements.into_elements();
        self.with_engine(0, |engine| {
            elements
                .into_iter()
                .filter(|element| engine.unobserve(id, *element))
                .count()
        })
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Remove every observer and release state. Every later call reports
    /// [`MedusaWarning::Destroyed`] and does nothing.
    pub fn destroy(&self) {
        let destroyed = self.with_engine(false, |engine| {
            engine.destroy();
            true
        });
        if destroyed {
            self.last_entry.set(None);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Registered ids, in registration order.
    pub fn observer_ids(&self) -> Vec<String> {
        self.read(Vec::new(), |engine| engine.registry.ids())
    }

    /// Ids of the observers watching `element`, sorted.
    pub fn observers_of(&self, element: ElementId) -> Vec<String> {
        self.read(Vec::new(), |engine| engine.members.observers_of(element))
    }

    pub fn is_observing(&self, id: &str, element: ElementId) -> bool {
        self.read(false, |engine| engine.members.contains(element, id))
    }

    pub fn is_destroyed(&self) -> bool {
        self.read(false, Engine::is_destroyed)
    }

    /// Last entry that fired a handler chain.
    pub fn last_entry(&self) -> Option<IntersectionEntry> {
        self.last_entry.get()
    }

    /// Reactive view of [`last_entry`](Self::last_entry).
    pub fn last_entry_signal(&self) -> Signal<Option<IntersectionEntry>> {
        self.last_entry.clone()
    }
}

impl fmt::Debug for Medusa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Medusa")
            .field("observers", &self.observer_ids())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
