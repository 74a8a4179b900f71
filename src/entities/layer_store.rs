//! Layer store: ordered, uniquely identified layers with one current layer.
//!
//! # Invariants
//!
//! - at least one layer exists
//! - ids are pairwise distinct
//! - `order` values are exactly `0..count`, and equal each layer's index
//! - the current id resolves to an existing layer
//!
//! Every committed mutation installs a fresh `Arc<LayerSnapshot>` and bumps
//! `revision`, so observers can detect change with `Arc::ptr_eq` or by
//! comparing revisions. Operations that change nothing keep the old snapshot.
//!
//! # Errors
//!
//! Deleting the last layer is rejected with `InvariantViolation` before any
//! mutation. `update_layer` on an unknown id is a silent no-op because
//! debounced commits can land after their layer was deleted.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use super::attrs::Attrs;
use super::layer::{Layer, LayerId};
use super::layer_events::*;
use crate::config::{ReselectPolicy, Settings};
use crate::core::event_bus::EventBus;
use crate::error::{Result, StoreError};

/// Immutable view of the store at one revision.
///
/// Deserialization sorts by `order` and validates, so every snapshot in
/// existence satisfies the invariants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct LayerSnapshot {
    layers: Vec<Layer>,
    current: LayerId,
}

/// Unchecked on-disk form of [`LayerSnapshot`].
#[derive(Deserialize)]
struct RawSnapshot {
    layers: Vec<Layer>,
    current: LayerId,
}

impl TryFrom<RawSnapshot> for LayerSnapshot {
    type Error = StoreError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        let mut snapshot = LayerSnapshot {
            layers: raw.layers,
            current: raw.current,
        };
        snapshot.layers.sort_by_key(|l| l.order);
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl LayerSnapshot {
    /// Layers sorted by `order`.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn current_id(&self) -> LayerId {
        self.current
    }

    pub fn current(&self) -> &Layer {
        self.get(self.current)
            .expect("current layer id must resolve to an existing layer")
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Rewrite `order` from list position.
    fn renumber(&mut self) {
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            layer.order = idx;
        }
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(StoreError::InvariantViolation("no layers".into()));
        }
        let mut seen = HashSet::with_capacity(self.layers.len());
        for (idx, layer) in self.layers.iter().enumerate() {
            if !seen.insert(layer.id) {
                return Err(StoreError::InvariantViolation(format!("duplicate layer id {}", layer.id)));
            }
            if layer.order != idx {
                return Err(StoreError::InvariantViolation(format!(
                    "layer {} has order {} at position {}",
                    layer.id, layer.order, idx
                )));
            }
        }
        if !seen.contains(&self.current) {
            return Err(StoreError::InvariantViolation(format!(
                "current layer {} does not exist",
                self.current
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct LayerStore {
    snapshot: Arc<LayerSnapshot>,
    revision: u64,
    reselect: ReselectPolicy,
    copies_after_source: bool,
    events: Option<EventBus>,
}

impl LayerStore {
    /// Store holding a single (current) layer built from `initial`.
    pub fn new(initial: Attrs) -> Self {
        Self::with_settings(initial, &Settings::default())
    }

    pub fn with_settings(mut initial: Attrs, settings: &Settings) -> Self {
        initial.retain_storable();
        let layer = Layer::new(LayerId::new(), initial);
        let current = layer.id;
        Self {
            snapshot: Arc::new(LayerSnapshot {
                layers: vec![layer],
                current,
            }),
            revision: 0,
            reselect: settings.reselect,
            copies_after_source: settings.insert_copies_after_source,
            events: None,
        }
    }

    /// Adopt a snapshot from outside (document load, import).
    ///
    /// The snapshot must satisfy every invariant or it is rejected.
    pub fn from_snapshot(snapshot: LayerSnapshot, settings: &Settings) -> Result<Self> {
        snapshot.validate()?;
        debug!("Loaded layer snapshot: {} layers, current {}", snapshot.len(), snapshot.current);
        Ok(Self {
            snapshot: Arc::new(snapshot),
            revision: 0,
            reselect: settings.reselect,
            copies_after_source: settings.insert_copies_after_source,
            events: None,
        })
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.reselect = settings.reselect;
        self.copies_after_source = settings.insert_copies_after_source;
    }

    pub fn reselect_policy(&self) -> ReselectPolicy {
        self.reselect
    }

    /// Wire change notification (see `layer_events`).
    pub fn set_event_bus(&mut self, bus: EventBus) {
        self.events = Some(bus);
    }

    // ========== Selectors ==========

    /// Shared snapshot of the current state.
    pub fn snapshot(&self) -> Arc<LayerSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Bumped once per committed mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Layers sorted by `order`.
    pub fn all_layers(&self) -> &[Layer] {
        self.snapshot.layers()
    }

    pub fn current_layer(&self) -> &Layer {
        self.snapshot.current()
    }

    pub fn current_id(&self) -> LayerId {
        self.snapshot.current_id()
    }

    pub fn count(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether a delete would be accepted.
    pub fn can_remove(&self) -> bool {
        self.count() > 1
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.snapshot.get(id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.snapshot.index_of(id)
    }

    // ========== Mutations ==========

    /// Install `next` as the new snapshot.
    fn commit(&mut self, next: LayerSnapshot) {
        debug_assert!(
            next.validate().is_ok(),
            "layer store invariant broken: {:?}",
            next.validate()
        );
        self.snapshot = Arc::new(next);
        self.revision += 1;
    }

    fn emit(&self, event: impl Into<LayerEvent>) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    fn emit_layers_changed(&self) {
        self.emit(LayersChangedEvent {
            revision: self.revision,
            count: self.count(),
        });
    }

    /// Insert a new visible layer at `at` (default: end) and return its id.
    ///
    /// An index past the end appends. The new layer does not become current.
    pub fn add_layer(&mut self, attrs: Attrs, at: Option<usize>) -> LayerId {
        self.insert_layer(Layer::new(LayerId::new(), attrs), at)
    }

    fn insert_layer(&mut self, mut layer: Layer, at: Option<usize>) -> LayerId {
        let dropped = layer.attrs.retain_storable();
        if !dropped.is_empty() {
            warn!("New layer: dropped non-finite attributes {:?}", dropped);
        }
        let mut next = (*self.snapshot).clone();
        let len = next.len();
        let idx = match at {
            Some(idx) if idx > len => {
                trace!("add_layer: index {} past end ({}), appending", idx, len);
                len
            }
            Some(idx) => idx,
            None => len,
        };
        let id = layer.id;
        next.layers.insert(idx, layer);
        next.renumber();
        self.commit(next);
        debug!("Added layer {} at {} ({} layers)", id, idx, self.count());
        self.emit_layers_changed();
        id
    }

    /// Add a layer from an externally parsed attribute set, at the end.
    pub fn import_layer(&mut self, attrs: Attrs) -> LayerId {
        debug!("Importing layer with {} attributes", attrs.len());
        self.add_layer(attrs, None)
    }

    /// Duplicate a layer under a fresh id; the current layer is unchanged.
    pub fn copy_layer(&mut self, id: LayerId) -> Result<LayerId> {
        let idx = self.index_of(id).ok_or(StoreError::NotFound(id))?;
        let copy = self.snapshot.layers[idx].duplicate();
        let at = if self.copies_after_source { Some(idx + 1) } else { None };
        debug!("Copying layer {} -> {}", id, copy.id);
        Ok(self.insert_layer(copy, at))
    }

    /// Remove a layer, compacting orders and re-picking current if needed.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<()> {
        let idx = self.index_of(id).ok_or(StoreError::NotFound(id))?;
        if self.count() <= 1 {
            warn!("Refusing to delete last layer {}", id);
            return Err(StoreError::InvariantViolation("cannot delete the last layer".into()));
        }

        let mut next = (*self.snapshot).clone();
        next.layers.remove(idx);
        next.renumber();

        let old_current = next.current;
        if old_current == id {
            let pick = self.reselect.pick(idx, next.len());
            next.current = next.layers[pick].id;
        }
        let new_current = next.current;
        self.commit(next);
        debug!("Deleted layer {} ({} layers left)", id, self.count());

        self.emit_layers_changed();
        if old_current != new_current {
            debug!("Current layer re-selected: {} -> {}", old_current, new_current);
            self.emit(CurrentLayerChangedEvent {
                revision: self.revision,
                old: old_current,
                new: new_current,
            });
        }
        Ok(())
    }

    /// Move the layer at `old_index` to `new_index` (array splice semantics).
    ///
    /// The current layer is tracked by identity, not position.
    pub fn move_layer(&mut self, old_index: usize, new_index: usize) -> Result<()> {
        let len = self.count();
        for index in [old_index, new_index] {
            if index >= len {
                warn!("move_layer: index {} out of range ({} layers)", index, len);
                return Err(StoreError::IndexOutOfRange { index, len });
            }
        }
        if old_index == new_index {
            return Ok(());
        }

        let mut next = (*self.snapshot).clone();
        let layer = next.layers.remove(old_index);
        let id = layer.id;
        next.layers.insert(new_index, layer);
        next.renumber();
        self.commit(next);
        debug!("Moved layer {} from {} to {}", id, old_index, new_index);
        self.emit_layers_changed();
        Ok(())
    }

    /// Merge `patch` into a layer's attributes.
    ///
    /// Unknown ids are ignored. Returns true if any value changed.
    pub fn update_layer(&mut self, id: LayerId, patch: &Attrs) -> bool {
        if self.layer(id).is_none() {
            trace!("update_layer: layer {} no longer exists, ignoring patch", id);
            return false;
        }
        let mut next = (*self.snapshot).clone();
        let changed = match next.get_mut(id) {
            Some(layer) => layer.attrs.merge(patch),
            None => return false,
        };
        if changed.is_empty() {
            return false;
        }
        self.commit(next);
        trace!("Updated layer {}: {:?}", id, changed);
        self.emit(LayerAttrsChangedEvent {
            revision: self.revision,
            layer_id: id,
            keys: changed,
        });
        true
    }

    /// Set the visibility flag. Unknown ids are ignored.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> bool {
        match self.layer(id) {
            Some(layer) if layer.visible != visible => {}
            _ => return false,
        }
        let mut next = (*self.snapshot).clone();
        if let Some(layer) = next.get_mut(id) {
            layer.visible = visible;
        }
        self.commit(next);
        debug!("Layer {} visible={}", id, visible);
        self.emit_layers_changed();
        true
    }

    /// Flip the layer's own visibility. Returns the new value.
    pub fn toggle_layer_visible(&mut self, id: LayerId) -> Option<bool> {
        let visible = !self.layer(id)?.visible;
        self.set_layer_visible(id, visible);
        Some(visible)
    }

    pub fn set_current_layer(&mut self, id: LayerId) -> Result<()> {
        if self.layer(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        let old = self.current_id();
        if old == id {
            return Ok(());
        }
        let mut next = (*self.snapshot).clone();
        next.current = id;
        self.commit(next);
        debug!("Current layer: {} -> {}", old, id);
        self.emit(CurrentLayerChangedEvent {
            revision: self.revision,
            old,
            new: id,
        });
        Ok(())
    }
}
