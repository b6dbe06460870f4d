//! Observer Registry - named observers and their primitives.
//!
//! Each entry owns:
//! - the primitive options it was created with
//! - the primitive handle (dropped and disconnected on removal)
//! - the membership-id → element map of everything it watches
//!
//! Ids are kept in registration order so bulk operations are deterministic.

use std::collections::HashMap;

use crate::primitive::{PrimitiveHandle, PrimitiveOptions};
use crate::types::{ElementId, MedusaCallback, Mode};

// =============================================================================
// Observer
// =============================================================================

/// A registered observer.
pub(crate) struct Observer {
    pub(crate) id: String,
    pub(crate) options: PrimitiveOptions,
    pub(crate) primitive: Option<PrimitiveHandle>,
    /// Membership id → element.
    pub(crate) observed_nodes: HashMap<String, ElementId>,
    pub(crate) mode: Mode,
    pub(crate) emit: bool,
    pub(crate) auto_remove: bool,
    pub(crate) callback: Option<MedusaCallback>,
}

impl Observer {
    /// Start watching `element` under `membership_id`.
    pub(crate) fn attach(&mut self, membership_id: String, element: ElementId) {
        if let Some(ref primitive) = self.primitive {
            primitive.borrow_mut().observe(element);
        }
        self.observed_nodes.insert(membership_id, element);
    }

    /// Stop watching `element`.
    pub(crate) fn detach(&mut self, membership_id: &str, element: ElementId) {
        if let Some(ref primitive) = self.primitive {
            primitive.borrow_mut().unobserve(element);
        }
        self.observed_nodes.remove(membership_id);
    }

    /// Disconnect and drop the primitive. Idempotent.
    pub(crate) fn disconnect(&mut self) {
        if let Some(primitive) = self.primitive.take() {
            primitive.borrow_mut().disconnect();
        }
    }

    pub(crate) fn elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<ElementId> = self.observed_nodes.values().copied().collect();
        elements.sort();
        elements
    }

    pub(crate) fn info(&self) -> ObserverInfo {
        ObserverInfo {
            id: self.id.clone(),
            options: self.options.clone(),
            mode: self.mode,
            emit: self.emit,
            auto_remove: self.auto_remove,
            has_callback: self.callback.is_some(),
            observed_nodes: self.observed_nodes.clone(),
            primitive: self.primitive.clone(),
        }
    }
}

/// Snapshot of an observer, returned by [`Medusa::get_observer`](crate::Medusa::get_observer).
#[derive(Debug, Clone)]
pub struct ObserverInfo {
    pub id: String,
    pub options: PrimitiveOptions,
    pub mode: Mode,
    pub emit: bool,
    pub auto_remove: bool,
    /// Whether a default callback is configured.
    pub has_callback: bool,
    /// Membership id → element, at snapshot time.
    pub observed_nodes: HashMap<String, ElementId>,
    /// The live primitive; `None` once torn down.
    pub primitive: Option<PrimitiveHandle>,
}

impl ObserverInfo {
    /// Whether `element` was observed at snapshot time.
    pub fn observes(&self, element: ElementId) -> bool {
        self.observed_nodes.values().any(|e| *e == element)
    }

    /// Observed elements, sorted.
    pub fn elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<ElementId> = self.observed_nodes.values().copied().collect();
        elements.sort();
        elements
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
pub(crate) struct Registry {
    observers: HashMap<String, Observer>,
    /// Registration order.
    order: Vec<String>,
}

impl Registry {
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.observers.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Observer> {
        self.observers.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Observer> {
        self.observers.get_mut(id)
    }

    /// Insert a new observer. Returns false, leaving the existing entry
    /// untouched, if the id is taken.
    pub(crate) fn insert(&mut self, observer: Observer) -> bool {
        if self.observers.contains_key(&observer.id) {
            return false;
        }
        self.order.push(observer.id.clone());
        self.observers.insert(observer.id.clone(), observer);
        true
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Observer> {
        let observer = self.observers.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(observer)
    }

    /// Ids in registration order.
    pub(crate) fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    /// Remove every observer, returning them in registration order.
    pub(crate) fn drain(&mut self) -> Vec<Observer> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.observers.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{IntersectionEntry, ManualViewport, PrimitiveFactory};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn observer(id: &str, viewport: &ManualViewport) -> Observer {
        let options = PrimitiveOptions {
            root: None,
            root_margin: "0px 0px 0px 0px".to_string(),
            threshold: vec![0.0],
        };
        let primitive = viewport.create(&options, Rc::new(|_: &[IntersectionEntry]| {}));
        Observer {
            id: id.to_string(),
            options,
            primitive: Some(Rc::new(RefCell::new(primitive))),
            observed_nodes: HashMap::new(),
            mode: Mode::Default,
            emit: false,
            auto_remove: false,
            callback: None,
        }
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let viewport = ManualViewport::new();
        let mut registry = Registry::default();

        assert!(registry.insert(observer("a", &viewport)));
        assert!(!registry.insert(observer("a", &viewport)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec!["a".to_string()]);

        // First primitive stays bound
        let first = registry.get("a").unwrap();
        assert!(first.primitive.is_some());
        assert!(viewport.is_connected(0));
    }

    #[test]
    fn test_attach_detach_mirror_primitive() {
        let viewport = ManualViewport::new();
        let mut obs = observer("a", &viewport);

        obs.attach("m1".to_string(), ElementId(1));
        obs.attach("m2".to_string(), ElementId(2));
        assert_eq!(obs.elements(), vec![ElementId(1), ElementId(2)]);
        assert_eq!(viewport.observed(0), vec![ElementId(1), ElementId(2)]);

        obs.detach("m1", ElementId(1));
        assert_eq!(obs.elements(), vec![ElementId(2)]);
        assert_eq!(viewport.observed(0), vec![ElementId(2)]);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let viewport = ManualViewport::new();
        let mut obs = observer("a", &viewport);

        obs.disconnect();
        obs.disconnect();
        assert!(obs.primitive.is_none());
        assert!(!viewport.is_connected(0));
        assert!(obs.info().primitive.is_none());
    }

    #[test]
    fn test_remove_and_drain_keep_order() {
        let viewport = ManualViewport::new();
        let mut registry = Registry::default();
        for id in ["c", "a", "b"] {
            registry.insert(observer(id, &viewport));
        }

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.ids(), vec!["c".to_string(), "b".to_string()]);

        let drained: Vec<String> = registry.drain().into_iter().map(|o| o.id).collect();
        assert_eq!(drained, vec!["c".to_string(), "b".to_string()]);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_info_snapshot() {
        let viewport = ManualViewport::new();
        let mut obs = observer("a", &viewport);
        obs.attach("m1".to_string(), ElementId(5));

        let info = obs.info();
        assert_eq!(info.id, "a");
        assert!(info.observes(ElementId(5)));
        assert!(!info.observes(ElementId(6)));
        assert_eq!(info.elements(), vec![ElementId(5)]);
        assert!(!info.has_callback);
    }
}
