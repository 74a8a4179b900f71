//! Entities: layer data, the layer store, and option schemas.
//!
//! Pure state, no UI. The view layer reads snapshots and calls store
//! operations; option binders (see `core::binder`) edit attribute sets
//! described by an [`OptionSchema`].

pub mod attrs;
pub mod document;
pub mod keys;
pub mod layer;
pub mod layer_events;
pub mod layer_store;
pub mod option_schema;

pub use attrs::{AttrValue, Attrs};
pub use document::Document;
pub use layer::{Layer, LayerId};
pub use layer_events::{CurrentLayerChangedEvent, LayerAttrsChangedEvent, LayerEvent, LayersChangedEvent};
pub use layer_store::{LayerSnapshot, LayerStore};
pub use option_schema::{Bound, OptionDef, OptionKind, OptionSchema, Transform, Visibility};
