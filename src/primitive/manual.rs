//! Headless primitive driven by hand.
//!
//! Every primitive the factory creates is recorded, so the host can inspect
//! what the registry asked for and push transitions back in.

use std::cell::RefCell;
use std::rc::Rc;

use super::{
    IntersectionEntry, PrimitiveFactory, PrimitiveOptions, TransitionCallback, VisibilityPrimitive,
};
use crate::types::ElementId;

// =============================================================================
// INSTANCE STATE
// =============================================================================

struct InstanceState {
    options: PrimitiveOptions,
    observed: Vec<ElementId>,
    connected: bool,
    callback: Option<TransitionCallback>,
}

/// Primitive created by [`ManualViewport`].
pub struct ManualPrimitive {
    state: Rc<RefCell<InstanceState>>,
}

impl VisibilityPrimitive for ManualPrimitive {
    fn observe(&mut self, element: ElementId) {
        let mut state = self.state.borrow_mut();
        if state.connected && !state.observed.contains(&element) {
            state.observed.push(element);
        }
    }

    fn unobserve(&mut self, element: ElementId) {
        self.state.borrow_mut().observed.retain(|e| *e != element);
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.observed.clear();
        state.callback = None;
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// A [`PrimitiveFactory`] whose primitives report only what they are told.
///
/// Cloning shares the underlying instance list.
#[derive(Clone, Default)]
pub struct ManualViewport {
    instances: Rc<RefCell<Vec<Rc<RefCell<InstanceState>>>>>,
}

impl ManualViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of primitives created so far (connected or not).
    pub fn instance_count(&self) -> usize {
        self.instances.borrow().len()
    }

    /// Options the primitive at `index` was created with.
    pub fn options(&self, index: usize) -> Option<PrimitiveOptions> {
        self.with_instance(index, |state| state.options.clone())
    }

    /// Elements the primitive at `index` is currently watching.
    pub fn observed(&self, index: usize) -> Vec<ElementId> {
        self.with_instance(index, |state| state.observed.clone())
            .unwrap_or_default()
    }

    /// Whether the primitive at `index` is still connected.
    pub fn is_connected(&self, index: usize) -> bool {
        self.with_instance(index, |state| state.connected)
            .unwrap_or(false)
    }

    /// Deliver a raw batch through the primitive at `index`.
    ///
    /// Entries are passed as-is, including targets the primitive does not
    /// watch. Returns false if the primitive is missing or disconnected.
    pub fn trigger(&self, index: usize, entries: &[IntersectionEntry]) -> bool {
        let callback = self
            .with_instance(index, |state| state.callback.clone())
            .flatten();
        match callback {
            Some(callback) => {
                callback(entries);
                true
            }
            None => false,
        }
    }

    /// Report a visibility change of `element` to every connected primitive
    /// watching it. Returns how many primitives were notified.
    pub fn set_intersecting(&self, element: ElementId, is_intersecting: bool) -> usize {
        let callbacks: Vec<TransitionCallback> = self
            .instances
            .borrow()
            .iter()
            .filter_map(|s| {
                let state = s.borrow();
                if state.connected && state.observed.contains(&element) {
                    state.callback.clone()
                } else {
                    None
                }
            })
            .collect();

        let entry = IntersectionEntry::new(element, is_intersecting);
        for callback in &callbacks {
            callback(std::slice::from_ref(&entry));
        }
        callbacks.len()
    }

    fn with_instance<R>(&self, index: usize, f: impl FnOnce(&InstanceState) -> R) -> Option<R> {
        let instance = self.instances.borrow().get(index).cloned()?;
        let state = instance.borrow();
        Some(f(&state))
    }
}

impl PrimitiveFactory for ManualViewport {
    fn create(
        &self,
        options: &PrimitiveOptions,
        callback: TransitionCallback,
    ) -> Box<dyn VisibilityPrimitive> {
        let state = Rc::new(RefCell::new(InstanceState {
            options: options.clone(),
            observed: Vec::new(),
            connected: true,
            callback: Some(callback),
        }));
        self.instances.borrow_mut().push(state.clone());
        Box::new(ManualPrimitive { state })
    }
}
