//! Generation-time error types.
//!
//! These are fatal to the affected type's generation run: bindings are
//! never partially emitted for a type that fails here.

use thiserror::Error;

use crate::types::DefId;

/// Error type for identity and projection queries
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetaError {
    /// A COM-visible interface or delegate declares no identifier
    #[error("unresolved identity: {name} declares no interface identifier")]
    UnresolvedIdentity { name: String },

    /// A shape outside the projectable set
    #[error("unsupported type shape: {reason}")]
    UnsupportedType { reason: String },

    /// A definition reference that resolves to nothing
    #[error("missing definition: {0:?}")]
    MissingDefinition(DefId),

    /// An interface operation on a non-interface definition
    #[error("{name} is not an interface or delegate")]
    NotAnInterface { name: String },

    /// Wrong number of generic arguments for a definition
    #[error("{name} expects {expected} generic argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for generation-time queries
pub type Result<T> = std::result::Result<T, MetaError>;
