//! Core types shared across the registry.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::primitive::{IntersectionEntry, PrimitiveHandle};

// =============================================================================
// ElementId
// =============================================================================

/// Opaque identity of a host element.
///
/// The registry never dereferences it; the host maps it back to whatever
/// node it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

impl From<usize> for ElementId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can be turned into a list of elements: a single
/// [`ElementId`], a `Vec`, a slice or an array.
pub trait IntoElements {
    fn into_elements(self) -> Vec<ElementId>;
}

impl IntoElements for ElementId {
    fn into_elements(self) -> Vec<ElementId> {
        vec![self]
    }
}

impl IntoElements for Vec<ElementId> {
    fn into_elements(self) -> Vec<ElementId> {
        self
    }
}

impl IntoElements for &[ElementId] {
    fn into_elements(self) -> Vec<ElementId> {
        self.to_vec()
    }
}

impl IntoElements for &Vec<ElementId> {
    fn into_elements(self) -> Vec<ElementId> {
        self.clone()
    }
}

impl<const N: usize> IntoElements for [ElementId; N] {
    fn into_elements(self) -> Vec<ElementId> {
        self.to_vec()
    }
}

// =============================================================================
// Mode
// =============================================================================

/// Firing mode of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Every transition fires.
    #[default]
    Default,
    /// The first intersecting transition fires, then the element is detached.
    Once,
    /// Like `Default`, with the dense 101-point threshold list.
    ByPixels,
}

// =============================================================================
// Threshold
// =============================================================================

/// One ratio or a list of ratios, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Single(f64),
    List(Vec<f64>),
}

impl Threshold {
    /// The ratios handed to the primitive. An empty list reads as `[0.0]`.
    pub fn values(&self) -> Vec<f64> {
        match self {
            Threshold::Single(value) => vec![*value],
            Threshold::List(values) if values.is_empty() => vec![0.0],
            Threshold::List(values) => values.clone(),
        }
    }

    /// First value outside `[0, 1]` (NaN included), if any.
    pub fn out_of_range(&self) -> Option<f64> {
        self.values()
            .into_iter()
            .find(|v| !(0.0..=1.0).contains(v))
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Single(0.0)
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Single(value)
    }
}

impl From<Vec<f64>> for Threshold {
    fn from(values: Vec<f64>) -> Self {
        Threshold::List(values)
    }
}

// =============================================================================
// EmitScope
// =============================================================================

bitflags::bitflags! {
    /// Where emitted notifications are dispatched.
    ///
    /// Combine with bitwise OR: `EmitScope::ELEMENT | EmitScope::GLOBAL`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EmitScope: u8 {
        /// On the element that changed visibility.
        const ELEMENT = 1 << 0;
        /// On the host's global target.
        const GLOBAL = 1 << 1;
    }
}

impl Default for EmitScope {
    fn default() -> Self {
        EmitScope::ELEMENT
    }
}

// =============================================================================
// Callbacks
// =============================================================================

/// Transition handler: receives the entry and the observer's primitive
/// (`None` once the observer has been torn down).
pub type MedusaCallback = Rc<dyn Fn(&IntersectionEntry, Option<&PrimitiveHandle>)>;

/// Wrap a closure as a [`MedusaCallback`].
pub fn callback<F>(f: F) -> MedusaCallback
where
    F: Fn(&IntersectionEntry, Option<&PrimitiveHandle>) + 'static,
{
    Rc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_elements() {
        assert_eq!(ElementId(1).into_elements(), vec![ElementId(1)]);
        assert_eq!([ElementId(1), ElementId(2)].into_elements().len(), 2);
        let list = vec![ElementId(4)];
        assert_eq!((&list).into_elements(), list);
        assert_eq!(list.as_slice().into_elements(), list);
    }

    #[test]
    fn test_mode_serde_names() {
        let mode: Mode = serde_json::from_str("\"BYPIXELS\"").unwrap();
        assert_eq!(mode, Mode::ByPixels);
        assert_eq!(serde_json::to_string(&Mode::Once).unwrap(), "\"ONCE\"");
    }

    #[test]
    fn test_threshold_range() {
        assert_eq!(Threshold::default().out_of_range(), None);
        assert_eq!(Threshold::List(vec![0.0, 0.5, 1.0]).out_of_range(), None);
        assert_eq!(Threshold::Single(1.5).out_of_range(), Some(1.5));
        assert!(Threshold::Single(f64::NAN).out_of_range().is_some());
    }

    #[test]
    fn test_threshold_untagged() {
        let single: Threshold = serde_json::from_str("0.5").unwrap();
        assert_eq!(single, Threshold::Single(0.5));
        let list: Threshold = serde_json::from_str("[0, 0.5, 1]").unwrap();
        assert_eq!(list.values(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_empty_threshold_list() {
        let empty = Threshold::List(Vec::new());
        assert_eq!(empty.values(), vec![0.0]);
        assert_eq!(empty.out_of_range(), None);
    }

    #[test]
    fn test_emit_scope_default() {
        assert_eq!(EmitScope::default(), EmitScope::ELEMENT);
        let both = EmitScope::ELEMENT | EmitScope::GLOBAL;
        assert!(both.contains(EmitScope::GLOBAL));
    }

    #[test]
    fn test_element_display() {
        assert_eq!(ElementId(12).to_string(), "#12");
    }
}
