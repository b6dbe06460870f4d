//! Configuration - observer configs and instance options.
//!
//! Every recognised field is enumerated and defaulted here, and validated
//! once when the config reaches the registry.
//!
//! # Example
//!
//! ```ignore
//! use medusa::{ObserverConfig, Mode, ElementId};
//!
//! let config = ObserverConfig::new("hero")
//!     .root_margin("0px 0px -20% 0px")
//!     .threshold(vec![0.0, 0.5, 1.0])
//!     .mode(Mode::Once)
//!     .nodes([ElementId(1), ElementId(2)])
//!     .callback(|entry, _| println!("{} entered", entry.target));
//! ```
//!
//! Configs also deserialize from JSON (camelCase keys, callback excluded):
//!
//! ```ignore
//! let config: ObserverConfig = serde_json::from_str(
//!     r#"{ "id": "hero", "rootMargin": "10px", "mode": "BYPIXELS", "emit": true }"#,
//! )?;
//! ```

use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::MedusaWarning;
use crate::primitive::{IntersectionEntry, PrimitiveHandle, PrimitiveOptions};
use crate::types::{ElementId, EmitScope, IntoElements, MedusaCallback, Mode, Threshold};
use crate::utils::thresholds_by_pixels;

/// Margin applied when a config does not set one.
pub const DEFAULT_ROOT_MARGIN: &str = "0px 0px 0px 0px";

fn default_root_margin() -> String {
    DEFAULT_ROOT_MARGIN.to_string()
}

// =============================================================================
// ObserverConfig
// =============================================================================

/// Caller-side description of one named observer.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverConfig {
    /// Unique, non-empty id.
    pub id: String,
    /// Viewport root; `None` is the global viewport.
    pub root: Option<ElementId>,
    /// CSS-style margin, 1 to 4 `px`/`%` lengths.
    #[serde(default = "default_root_margin")]
    pub root_margin: String,
    /// Ignored in [`Mode::ByPixels`].
    pub threshold: Threshold,
    /// Elements attached right after registration.
    pub nodes: Vec<ElementId>,
    pub mode: Mode,
    /// Emit a `medusa-<id>` event on every firing transition.
    pub emit: bool,
    /// In [`Mode::Once`], remove the observer when its last element detaches.
    pub auto_remove: bool,
    /// Default handler, used when an element has no handler of its own.
    #[serde(skip)]
    pub callback: Option<MedusaCallback>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            root: None,
            root_margin: default_root_margin(),
            threshold: Threshold::default(),
            nodes: Vec::new(),
            mode: Mode::Default,
            emit: false,
            auto_remove: false,
            callback: None,
        }
    }
}

impl fmt::Debug for ObserverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverConfig")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("root_margin", &self.root_margin)
            .field("threshold", &self.threshold)
            .field("nodes", &self.nodes)
            .field("mode", &self.mode)
            .field("emit", &self.emit)
            .field("auto_remove", &self.auto_remove)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl ObserverConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn root(mut self, root: ElementId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn root_margin(mut self, margin: impl Into<String>) -> Self {
        self.root_margin = margin.into();
        self
    }

    pub fn threshold(mut self, threshold: impl Into<Threshold>) -> Self {
        self.threshold = threshold.into();
        self
    }

    pub fn nodes(mut self, nodes: impl IntoElements) -> Self {
        self.nodes = nodes.into_elements();
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn emit(mut self, emit: bool) -> Self {
        self.emit = emit;
        self
    }

    pub fn auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&IntersectionEntry, Option<&PrimitiveHandle>) + 'static,
    {
        self.callback = Some(Rc::new(f));
        self
    }

    /// Validate the config and build the options for its primitive.
    ///
    /// Does not check id uniqueness; that belongs to the registry.
    pub fn primitive_options(&self) -> Result<PrimitiveOptions, MedusaWarning> {
        if self.id.is_empty() {
            return Err(MedusaWarning::EmptyId);
        }

        let root_margin = normalize_root_margin(&self.root_margin).map_err(|e| {
            MedusaWarning::InvalidRootMargin {
                id: self.id.clone(),
                reason: e.to_string(),
            }
        })?;

        let threshold = match self.mode {
            Mode::ByPixels => thresholds_by_pixels(),
            Mode::Default | Mode::Once => {
                if let Some(value) = self.threshold.out_of_range() {
                    return Err(MedusaWarning::ThresholdOutOfRange {
                        id: self.id.clone(),
                        value,
                    });
                }
                self.threshold.values()
            }
        };

        Ok(PrimitiveOptions {
            root: self.root,
            root_margin,
            threshold,
        })
    }
}

// =============================================================================
// MedusaOptions
// =============================================================================

/// Options for a whole instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedusaOptions {
    /// Observers registered at construction.
    pub observers: Vec<ObserverConfig>,
    /// Report skipped configs and calls to the warning sink.
    pub debug: bool,
    /// Where emitted events are dispatched.
    pub emit_scope: EmitScope,
}

impl Default for MedusaOptions {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            debug: true,
            emit_scope: EmitScope::default(),
        }
    }
}

// =============================================================================
// JSON intake
// =============================================================================

/// Split a JSON value (one object or an array of them) into configs.
///
/// Entries are judged independently; a bad entry never hides its siblings.
pub fn configs_from_json(value: Value) -> Vec<Result<ObserverConfig, MedusaWarning>> {
    match value {
        Value::Array(entries) => entries.into_iter().map(config_from_entry).collect(),
        other => vec![config_from_entry(other)],
    }
}

fn config_from_entry(entry: Value) -> Result<ObserverConfig, MedusaWarning> {
    if !entry.is_object() {
        return Err(MedusaWarning::InvalidConfig(format!(
            "expected an object, found {}",
            json_kind(&entry)
        )));
    }
    serde_json::from_value(entry).map_err(|e| MedusaWarning::InvalidConfig(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Root margin
// =============================================================================

/// Why a root margin was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarginError {
    #[error("margin is empty")]
    Empty,
    #[error("expected at most 4 lengths, found {0}")]
    TooMany(usize),
    #[error("'{0}' is not a px or % length")]
    InvalidLength(String),
}

/// Unit of a margin length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginUnit {
    Px,
    Percent,
}

/// One side of a root margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginLength {
    pub value: f64,
    pub unit: MarginUnit,
}

impl fmt::Display for MarginLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            MarginUnit::Px => write!(f, "{}px", self.value),
            MarginUnit::Percent => write!(f, "{}%", self.value),
        }
    }
}

fn parse_length(token: &str) -> Result<MarginLength, MarginError> {
    let (number, unit) = if let Some(number) = token.strip_suffix("px") {
        (number, MarginUnit::Px)
    } else if let Some(number) = token.strip_suffix('%') {
        (number, MarginUnit::Percent)
    } else {
        return Err(MarginError::InvalidLength(token.to_string()));
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(MarginLength { value, unit }),
        _ => Err(MarginError::InvalidLength(token.to_string())),
    }
}

/// Parse a CSS-style margin into top, right, bottom, left.
///
/// One to four lengths, expanded the way CSS shorthand is.
pub fn parse_root_margin(margin: &str) -> Result<[MarginLength; 4], MarginError> {
    let lengths = margin
        .split_whitespace()
        .map(parse_length)
        .collect::<Result<Vec<_>, _>>()?;

    match lengths.as_slice() {
        [] => Err(MarginError::Empty),
        [all] => Ok([*all; 4]),
        [vertical, horizontal] => Ok([*vertical, *horizontal, *vertical, *horizontal]),
        [top, horizontal, bottom] => Ok([*top, *horizontal, *bottom, *horizontal]),
        [top, right, bottom, left] => Ok([*top, *right, *bottom, *left]),
        more => Err(MarginError::TooMany(more.len())),
    }
}

/// Parse and re-serialize a margin with all four sides spelled out.
pub fn normalize_root_margin(margin: &str) -> Result<String, MarginError> {
    let sides = parse_root_margin(margin)?;
    Ok(sides
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" "))
}
