//! Document: the unit of serialization (settings + layer snapshot).
//!
//! Saved and loaded via `Document::to_json` / `Document::from_json`.
//! Loading validates the snapshot, so a hand-edited file with gaps in
//! `order` or a dangling current id is rejected instead of adopted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::attrs::Attrs;
use super::layer::LayerId;
use super::layer_store::{LayerSnapshot, LayerStore};
use crate::config::Settings;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    settings: Settings,
    layers: LayerSnapshot,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub settings: Settings,
    pub store: LayerStore,
}

impl Document {
    /// New document with one layer built from `initial`.
    pub fn new(initial: Attrs, settings: Settings) -> Self {
        let store = LayerStore::with_settings(initial, &settings);
        Self { settings, store }
    }

    pub fn to_json_string(&self) -> Result<String> {
        let file = DocumentFile {
            settings: self.settings.clone(),
            layers: (*self.store.snapshot()).clone(),
        };
        serde_json::to_string_pretty(&file).context("Serialize document error")
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DocumentFile = serde_json::from_str(json).context("Parse document error")?;
        let store = LayerStore::from_snapshot(file.layers, &file.settings)
            .context("Document holds an invalid layer list")?;
        Ok(Self {
            settings: file.settings,
            store,
        })
    }

    /// Save as pretty JSON. A missing `.json` extension is added.
    /// Returns the path actually written.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };
        let json = self.to_json_string()?;
        fs::write(&path, json).with_context(|| format!("Write document error: {}", path.display()))?;
        log::debug!("Saved document to {}", path.display());
        Ok(path)
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Read document error: {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Load document error: {}", path.display()))
    }

    /// Import a layer from a JSON file holding one attribute object.
    pub fn import_layer_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LayerId> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Read layer error: {}", path.display()))?;
        let attrs: Attrs = serde_json::from_str(&json)
            .with_context(|| format!("Parse layer error: {}", path.display()))?;
        Ok(self.store.import_layer(attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::keys::A_NAME;

    #[test]
    fn test_json_roundtrip_keeps_order_and_current() {
        let mut doc = Document::new(Attrs::single(A_NAME, "A"), Settings::default());
        let b = doc.store.add_layer(Attrs::single(A_NAME, "B"), None);
        doc.store.add_layer(Attrs::single(A_NAME, "C"), Some(0));
        doc.store.set_current_layer(b).unwrap();
        doc.store.toggle_layer_visible(b);

        let json = doc.to_json_string().unwrap();
        let loaded = Document::from_json_str(&json).unwrap();

        assert_eq!(loaded.store.all_layers(), doc.store.all_layers());
        assert_eq!(loaded.store.current_id(), b);
    }

    #[test]
    fn test_rejects_dangling_current() {
        let doc = Document::new(Attrs::new(), Settings::default());
        let json = doc
            .to_json_string()
            .unwrap()
            .replace(&doc.store.current_id().to_string(), &LayerId::new().to_string());
        // Layer id and current id were both replaced: still consistent
        assert!(Document::from_json_str(&json).is_ok());

        let mut value: serde_json::Value = serde_json::from_str(&doc.to_json_string().unwrap()).unwrap();
        value["layers"]["current"] = serde_json::Value::String(LayerId::new().to_string());
        assert!(Document::from_json_str(&value.to_string()).is_err());
    }

    #[test]
    fn test_rejects_empty_layer_list() {
        let json = r#"{"layers": {"layers": [], "current": "67e55044-10b1-426f-9247-bb680e5fe0c8"}}"#;
        assert!(Document::from_json_str(json).is_err());
    }
}
