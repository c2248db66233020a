//! Error types for semantic type checks and registry construction.

use thiserror::Error;

use deid_model::{ActionKind, PrimitiveType};

/// A value, action or argument rejected by a semantic type.
///
/// Messages never contain cell values; `reason` describes the problem only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("semantic type '{semantic_type}' does not accept primitive type '{primitive}'")]
    MismatchingType {
        semantic_type: String,
        primitive: PrimitiveType,
    },

    #[error("action '{action}' is not supported for semantic type '{semantic_type}'")]
    MismatchingAction {
        semantic_type: String,
        action: ActionKind,
    },

    #[error(
        "argument '{argument}' is not supported by action '{action}' on semantic type '{semantic_type}'"
    )]
    UnsupportedArgument {
        semantic_type: String,
        action: ActionKind,
        argument: String,
    },

    #[error("invalid value for semantic type '{semantic_type}': {reason}")]
    InvalidValue {
        semantic_type: String,
        reason: String,
    },

    #[error("unknown semantic type '{name}'")]
    UnknownSemanticType { name: String },
}

/// Result type alias for semantic type checks.
pub type Result<T> = std::result::Result<T, TypeError>;

/// A semantic type definition that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("semantic type definition has an empty name")]
    EmptyName,

    #[error("semantic type '{name}' accepts no primitive types")]
    NoPrimitiveTypes { name: String },

    #[error("semantic type '{name}' accepts no actions")]
    NoActions { name: String },

    #[error("semantic type '{name}' has no fallback value")]
    EmptyFallback { name: String },

    #[error("semantic type name or alias '{name}' is registered twice")]
    Duplicate { name: String },
}
