//! # medusa
//!
//! Named intersection-observer registry.
//!
//! Register many independent observer configurations, each with its own
//! viewport root, margin, thresholds and firing mode, then attach and detach
//! elements to any of them by name. The registry owns the bookkeeping: which
//! primitive backs which observer, which elements each observer watches, and
//! what happens when a watched element changes visibility.
//!
//! ## Architecture
//!
//! ```text
//! ObserverConfig → Registry → PrimitiveFactory::create → VisibilityPrimitive
//!                                                               │ batch
//! callback / medusa-<id> event ← Dispatch ← Membership ←────────┘
//! ```
//!
//! The visibility primitive is supplied by the host through
//! [`PrimitiveFactory`]. [`primitive::ManualViewport`] is a headless one.
//!
//! ## Modules
//!
//! - [`medusa`] - The [`Medusa`] facade and its builder
//! - [`config`] - Observer configs, root-margin parsing, JSON intake
//! - [`primitive`] - The visibility primitive seam
//! - [`events`] - `medusa-<id>` notifications
//! - [`error`] - Warnings and warning sinks
//! - [`types`] - Element ids, modes, thresholds, callbacks
//! - [`utils`] - Id generation and pixel thresholds

pub mod config;
mod engine;
pub mod error;
pub mod events;
pub mod medusa;
pub mod primitive;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;

pub use config::{MedusaOptions, ObserverConfig, DEFAULT_ROOT_MARGIN};

pub use engine::ObserverInfo;

pub use error::{MedusaWarning, TracingSink, WarningLog, WarningSink};

pub use events::{event_name, EventDispatcher, EventLog, EventTarget, MedusaEvent, EVENT_PREFIX};

pub use medusa::{IntoConfigs, Medusa, MedusaBuilder};

pub use primitive::{
    IntersectionEntry, PrimitiveFactory, PrimitiveHandle, PrimitiveOptions, Transition,
    TransitionCallback, VisibilityPrimitive,
};

pub use utils::{thresholds_by_pixels, uid, uid_counter};
