//! Layer store change events.
//!
//! Emitted after a mutation is fully committed, so subscribers always observe
//! a consistent snapshot.
//!
//! ## [`LayersChangedEvent`]
//! Structure changed: add, delete, move, copy, import or visibility.
//!
//! ## [`LayerAttrsChangedEvent`]
//! A partial attribute merge changed at least one value.
//!
//! ## [`CurrentLayerChangedEvent`]
//! The current-layer pointer moved (explicitly or by delete re-selection).

use super::layer::LayerId;

#[derive(Clone, Debug, PartialEq)]
pub struct LayersChangedEvent {
    /// Store revision after the change
    pub revision: u64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerAttrsChangedEvent {
    pub revision: u64,
    pub layer_id: LayerId,
    /// Keys whose value actually changed
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurrentLayerChangedEvent {
    pub revision: u64,
    pub old: LayerId,
    pub new: LayerId,
}

/// Any store change, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerEvent {
    LayersChanged(LayersChangedEvent),
    AttrsChanged(LayerAttrsChangedEvent),
    CurrentChanged(CurrentLayerChangedEvent),
}

impl LayerEvent {
    /// Store revision the event was emitted at.
    pub fn revision(&self) -> u64 {
        match self {
            LayerEvent::LayersChanged(e) => e.revision,
            LayerEvent::AttrsChanged(e) => e.revision,
            LayerEvent::CurrentChanged(e) => e.revision,
        }
    }
}

impl From<LayersChangedEvent> for LayerEvent {
    fn from(e: LayersChangedEvent) -> Self {
        LayerEvent::LayersChanged(e)
    }
}

impl From<LayerAttrsChangedEvent> for LayerEvent {
    fn from(e: LayerAttrsChangedEvent) -> Self {
        LayerEvent::AttrsChanged(e)
    }
}

impl From<CurrentLayerChangedEvent> for LayerEvent {
    fn from(e: CurrentLayerChangedEvent) -> Self {
        LayerEvent::CurrentChanged(e)
    }
}
