//! STRATA - ordered layer store with schema-driven option binding.
//!
//! - [`LayerStore`]: ordered, uniquely identified layers with exactly one
//!   current layer; add, delete, move, partial update, copy, import
//! - [`OptionSchema`]: declarative per-attribute editing rules (kind,
//!   bounds, visibility, transform, secondary key)
//! - [`OptionBinder`]: per-field draft / immediate commit / debounced
//!   secondary commit cycle

pub mod cli;
pub mod config;
pub mod core;
pub mod entities;
pub mod error;

pub use crate::config::{ReselectPolicy, Settings};
pub use crate::core::binder::{FieldView, OptionBinder};
pub use crate::core::event_bus::{EventBus, SubscriptionId};
pub use crate::entities::{AttrValue, Attrs, Document, Layer, LayerEvent, LayerId, LayerStore, OptionDef, OptionSchema};
pub use crate::error::StoreError;
