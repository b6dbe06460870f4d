//! Warnings - the skip conditions the registry reports instead of failing.
//!
//! Nothing in the registry is fatal. Every misuse resolves to a no-op and,
//! when debug is enabled, a [`MedusaWarning`] delivered to the configured
//! [`WarningSink`].

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::warn;

use crate::types::ElementId;

/// A skipped configuration entry or call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MedusaWarning {
    /// Observer config without an id.
    #[error("observer id must be a non-empty string")]
    EmptyId,

    /// Observer id already registered; the existing observer is kept.
    #[error("observer id '{0}' already exists")]
    DuplicateId(String),

    /// Config entry that is not an object or does not deserialize.
    #[error("invalid observer config: {0}")]
    InvalidConfig(String),

    /// Root margin that is not 1 to 4 `px`/`%` lengths.
    #[error("observer '{id}' has an invalid root margin: {reason}")]
    InvalidRootMargin { id: String, reason: String },

    /// Threshold value outside `[0, 1]`.
    #[error("observer '{id}' has a threshold out of range: {value}")]
    ThresholdOutOfRange { id: String, value: f64 },

    /// Operation on an id that is not registered.
    #[error("observer '{0}' doesn't exist")]
    UnknownObserver(String),

    /// Element already attached to this observer.
    #[error("element {element} is already observed by '{observer}'")]
    AlreadyObserved { observer: String, element: ElementId },

    /// Element not attached to this observer.
    #[error("element {element} isn't observed by '{observer}'")]
    NotObserved { observer: String, element: ElementId },

    /// Call on a destroyed instance.
    #[error("medusa instance has been destroyed")]
    Destroyed,
}

// =============================================================================
// SINKS
// =============================================================================

/// Receives warnings. Closures taking `&MedusaWarning` implement it.
pub trait WarningSink {
    fn warn(&self, warning: &MedusaWarning);
}

impl<F> WarningSink for F
where
    F: Fn(&MedusaWarning),
{
    fn warn(&self, warning: &MedusaWarning) {
        self(warning)
    }
}

/// Default sink: logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, warning: &MedusaWarning) {
        warn!(target: "medusa", "{}", warning);
    }
}

/// Sink that keeps every warning in memory.
///
/// Cloning shares the same log.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    entries: Rc<RefCell<Vec<MedusaWarning>>>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<MedusaWarning> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Remove and return everything logged so far.
    pub fn take(&self) -> Vec<MedusaWarning> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl WarningSink for WarningLog {
    fn warn(&self, warning: &MedusaWarning) {
        self.entries.borrow_mut().push(warning.clone());
    }
}
