//! Error types for validation and transformation runs.

use thiserror::Error;

use deid_model::{ActionKind, StateError};
use deid_types::TypeError;

use crate::catalog::CatalogError;

/// A method that cannot run against a data source.
///
/// Raised before any row is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("column '{column}' is not part of the data source")]
    MissingColumn { column: String },

    #[error("column '{column}': {source}")]
    Type {
        column: String,
        #[source]
        source: TypeError,
    },

    #[error("column '{column}': invalid argument '{argument}' for {action}: {message}")]
    InvalidArgument {
        column: String,
        action: ActionKind,
        argument: String,
        message: String,
    },
}

impl ValidationError {
    pub fn column(&self) -> &str {
        match self {
            Self::MissingColumn { column }
            | Self::Type { column, .. }
            | Self::InvalidArgument { column, .. } => column,
        }
    }

    pub(crate) fn invalid_argument(
        column: &str,
        action: ActionKind,
        argument: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            column: column.to_string(),
            action,
            argument: argument.to_string(),
            message: message.into(),
        }
    }
}

/// Failure of a single action on a single cell.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("value is not a date")]
    NotADate,

    #[error("value is not a number")]
    NotANumber,

    #[error("offset date is out of range")]
    DateOutOfRange,

    #[error("free-text pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors that abort a transformation run.
#[derive(Debug, Error)]
pub enum DeidError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("input table has no header row")]
    MissingHeader,

    #[error("column '{column}' is configured but absent from the table header")]
    UnknownHeaderColumn { column: String },

    #[error("CSV error at data row {row}: {source}")]
    Csv {
        /// 1-based data row; 0 is the header.
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("column '{column}', data row {row}: {source}")]
    Transform {
        column: String,
        row: u64,
        #[source]
        source: ActionError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for transformation runs.
pub type Result<T> = std::result::Result<T, DeidError>;
