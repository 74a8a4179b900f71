//! Attribute key constants for Attrs access.
//!
//! Avoid string typos, enable IDE autocomplete.
//! Usage: `layer.attrs.get_str(A_NAME)`

/// Human-readable layer name
pub const A_NAME: &str = "name";
/// Layer kind (selects the option schema used to edit it)
pub const A_KIND: &str = "kind";

/// Suffix appended to the name of a copied layer
pub const COPY_SUFFIX: &str = " copy";
