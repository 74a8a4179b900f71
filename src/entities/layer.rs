//! Layer: one independently editable unit of document content.
//!
//! A layer is an identity plus a rank plus an open attribute set. What the
//! attributes mean is decided by the option schema of the layer's kind; the
//! store only merges patches into them.
//!
//! # Fields
//!
//! - `id` - stable, assigned at creation, never reused (UUID v4)
//! - `order` - rank among siblings; always equal to the layer's index in
//!   the owning store's snapshot
//! - `visible` - list eye toggle
//! - `attrs` - everything else ("name", "kind", shape parameters, ...)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attrs::Attrs;
use super::keys::*;

/// Stable layer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for LayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub order: usize,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub attrs: Attrs,
}

fn default_visible() -> bool {
    true
}

impl Layer {
    /// New visible layer. `order` is assigned by the store on insertion.
    pub fn new(id: LayerId, attrs: Attrs) -> Self {
        Self {
            id,
            order: 0,
            visible: true,
            attrs,
        }
    }

    /// Get layer name
    pub fn name(&self) -> &str {
        self.attrs.get_str(A_NAME).unwrap_or("Untitled")
    }

    /// Get layer kind, if the attribute set declares one
    pub fn kind(&self) -> Option<&str> {
        self.attrs.get_str(A_KIND)
    }

    /// Duplicate under a fresh id. The copy's name gets a suffix when the
    /// source is named.
    pub fn duplicate(&self) -> Self {
        let mut attrs = self.attrs.clone();
        if let Some(name) = self.attrs.get_str(A_NAME) {
            attrs.set(A_NAME, format!("{}{}", name, COPY_SUFFIX));
        }
        Self {
            id: LayerId::new(),
            order: self.order,
            visible: self.visible,
            attrs,
        }
    }
}
