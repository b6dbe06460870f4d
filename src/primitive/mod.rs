//! Visibility Primitive - the seam to the host's intersection observer.
//!
//! The host provides the actual visibility detection. This module defines
//! what the registry needs from it and what it hands back:
//!
//! - [`PrimitiveFactory`] creates one primitive per registered observer,
//!   bound to a [`TransitionCallback`]
//! - [`VisibilityPrimitive`] watches and unwatches elements
//! - [`IntersectionEntry`] is one raw transition record in a batch
//!
//! [`ManualViewport`] is a headless implementation that lets a host (or a
//! test) deliver transitions by hand.

mod manual;

pub use manual::*;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::types::ElementId;

// =============================================================================
// TRANSITION RECORDS
// =============================================================================

/// A single raw transition reported by the primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionEntry {
    /// The element whose visibility changed.
    pub target: ElementId,
    /// Whether the element now intersects the root.
    pub is_intersecting: bool,
    /// Visible fraction of the element (0.0 - 1.0).
    pub intersection_ratio: f64,
    /// Host timestamp in milliseconds.
    pub time: f64,
}

impl IntersectionEntry {
    /// Create an entry with a ratio of 1.0 when intersecting, 0.0 otherwise.
    pub fn new(target: ElementId, is_intersecting: bool) -> Self {
        Self {
            target,
            is_intersecting,
            intersection_ratio: if is_intersecting { 1.0 } else { 0.0 },
            time: 0.0,
        }
    }

    /// Entry for an element entering the root.
    pub fn entering(target: ElementId) -> Self {
        Self::new(target, true)
    }

    /// Entry for an element leaving the root.
    pub fn leaving(target: ElementId) -> Self {
        Self::new(target, false)
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.intersection_ratio = ratio;
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Domain view of the record.
    pub fn transition(&self) -> Transition {
        if self.is_intersecting {
            Transition::Enter
        } else {
            Transition::Exit
        }
    }
}

/// Entry/exit reading of an [`IntersectionEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enter,
    Exit,
}

// =============================================================================
// PRIMITIVE TRAITS
// =============================================================================

/// Options handed to the factory when an observer is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveOptions {
    /// Viewport root; `None` is the global viewport.
    pub root: Option<ElementId>,
    /// Normalised four-sided margin, e.g. `"0px 10px 0px 10px"`.
    pub root_margin: String,
    /// Ratios at which the primitive reports a transition.
    pub threshold: Vec<f64>,
}

/// Callback the primitive invokes with each batch of transitions.
pub type TransitionCallback = Rc<dyn Fn(&[IntersectionEntry])>;

/// A host visibility primitive bound to one observer.
///
/// Implementations must deliver batches out of band (from the host event
/// loop), never synchronously from inside `observe`/`unobserve`.
pub trait VisibilityPrimitive {
    fn observe(&mut self, element: ElementId);
    fn unobserve(&mut self, element: ElementId);
    /// Stop watching everything. No batch may be delivered afterwards.
    fn disconnect(&mut self);
}

/// Shared handle to a live primitive, passed to transition callbacks.
pub type PrimitiveHandle = Rc<RefCell<Box<dyn VisibilityPrimitive>>>;

/// Creates primitives for newly registered observers.
pub trait PrimitiveFactory {
    fn create(
        &self,
        options: &PrimitiveOptions,
        callback: TransitionCallback,
    ) -> Box<dyn VisibilityPrimitive>;
}

impl fmt::Debug for dyn VisibilityPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VisibilityPrimitive")
    }
}
