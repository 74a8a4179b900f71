//! Error types for layer store and option binding.
//!
//! Only structural problems are errors. Soft numeric problems (NaN bounds,
//! unparsable numeric input) are absorbed where they occur and never reach
//! callers.

use thiserror::Error;

use crate::entities::LayerId;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The operation would break a structural invariant (e.g. zero layers).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Layer not found: {0}")]
    NotFound(LayerId),

    #[error("Index {index} out of range for {len} layers")]
    IndexOutOfRange { index: usize, len: usize },

    /// Binder requested for a key the schema does not describe.
    #[error("Unknown option: {0}")]
    UnknownOption(String),
}
