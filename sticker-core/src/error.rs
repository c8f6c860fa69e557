//! Error types for design and surface operations.

use thiserror::Error;

use crate::element::ElementType;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Element not found in the design.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// An element with the same id already exists in the design.
    #[error("Duplicate element id: {0}")]
    DuplicateElement(String),

    /// A property patch targeted an element of another type.
    #[error("Cannot apply {patch:?} properties to a {element:?} element")]
    TypeMismatch {
        /// Type of the element being patched.
        element: ElementType,
        /// Type the patch was written for.
        patch: ElementType,
    },

    /// Surface object handle no longer exists.
    #[error("Surface object not found: {0}")]
    ObjectNotFound(u64),

    /// The requested document is not the one currently materialized.
    #[error("Design {requested} is not the active document (active: {active})")]
    IdentityMismatch {
        /// Design id the caller asked for.
        requested: String,
        /// Design id that is actually open, or `none`.
        active: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
