//! Attribute storage shared by layers and plain settings objects.
//!
//! The shape of an attribute set is not fixed here: the option schema for a
//! layer's kind decides which keys exist and how they are edited. `Attrs` is
//! also the patch type: a patch is just a (usually small) attribute set that
//! gets merged key-by-key into a target.
//!
//! Serialization is untagged so documents read naturally:
//! `{"name": "Star", "radius": 3.5, "closed": true}`.

use std::fmt;

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

/// Generic attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl AttrValue {
    /// Empty string value. Numeric fields use it for "cleared by the user".
    pub fn empty() -> Self {
        AttrValue::Str(String::new())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// False for NaN and infinities, which have no JSON form.
    pub fn is_storable(&self) -> bool {
        match self {
            AttrValue::Number(v) => v.is_finite(),
            _ => true,
        }
    }

    /// Parse a loosely typed token: numbers, `true`/`false`, otherwise text.
    pub fn parse_loose(raw: &str) -> Self {
        match raw {
            "true" => return AttrValue::Bool(true),
            "false" => return AttrValue::Bool(false),
            _ => {}
        }
        match raw.trim().parse::<f64>() {
            Ok(v) if !raw.trim().is_empty() && v.is_finite() => AttrValue::Number(v),
            _ => AttrValue::Str(raw.to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Number(v) => write!(f, "{}", v),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Number(v as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

/// Attribute container: string key -> typed value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attrs {
    map: IndexMap<String, AttrValue>,
}

impl Attrs {
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    /// Single-key attribute set, the common shape of an edit patch.
    pub fn single(key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let mut attrs = Self::new();
        attrs.set(key, value);
        attrs
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(AttrValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(AttrValue::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(AttrValue::as_bool)
    }

    /// Get number with custom default
    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    /// Get bool with custom default
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Remove attribute by key, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.map.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Merge `patch` into self. Keys absent from the patch are untouched.
    ///
    /// Returns the keys whose value actually changed. Non-finite numbers
    /// are dropped from the patch.
    pub fn merge(&mut self, patch: &Attrs) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in patch.iter() {
            if !value.is_storable() {
                warn!("Dropping non-finite value for {:?}", key);
                continue;
            }
            if self.map.get(key) != Some(value) {
                self.map.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        changed
    }

    /// Remove non-finite numbers. Returns the removed keys.
    pub fn retain_storable(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        self.map.retain(|key, value| {
            let keep = value.is_storable();
            if !keep {
                removed.push(key.clone());
            }
            keep
        });
        removed
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attrs::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_only_touches_patch_keys() {
        let mut attrs = Attrs::new().with("name", "Star").with("radius", 3.0);
        let changed = attrs.merge(&Attrs::single("radius", 5.0));

        assert_eq!(changed, vec!["radius".to_string()]);
        assert_eq!(attrs.get_f64("radius"), Some(5.0));
        assert_eq!(attrs.get_str("name"), Some("Star"));
    }

    #[test]
    fn test_merge_reports_nothing_for_equal_values() {
        let mut attrs = Attrs::single("radius", 3.0);
        assert!(attrs.merge(&Attrs::single("radius", 3.0)).is_empty());
    }

    #[test]
    fn test_merge_drops_non_finite_numbers() {
        let mut attrs = Attrs::single("radius", 3.0);
        let patch = Attrs::new()
            .with("radius", f64::NAN)
            .with("outer", f64::INFINITY)
            .with("name", "Star");

        assert_eq!(attrs.merge(&patch), vec!["name".to_string()]);
        assert_eq!(attrs.get_f64("radius"), Some(3.0));
        assert!(!attrs.contains("outer"));
        // Same patch again changes nothing
        assert!(attrs.merge(&patch).is_empty());
    }

    #[test]
    fn test_retain_storable() {
        let mut attrs = Attrs::new().with("a", 1.0).with("b", f64::NEG_INFINITY).with("c", "x");
        assert_eq!(attrs.retain_storable(), vec!["b".to_string()]);
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(AttrValue::parse_loose("3.5"), AttrValue::Number(3.5));
        assert_eq!(AttrValue::parse_loose("true"), AttrValue::Bool(true));
        assert_eq!(AttrValue::parse_loose("star"), AttrValue::from("star"));
        assert_eq!(AttrValue::parse_loose(""), AttrValue::empty());
    }

    #[test]
    fn test_json_is_untagged() {
        let attrs = Attrs::new().with("name", "Star").with("points", 5).with("closed", true);
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"name":"Star","points":5.0,"closed":true}"#);

        let back: Attrs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attrs);
    }
}
