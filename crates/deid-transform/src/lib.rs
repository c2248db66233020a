//! De-identification transformer.
//!
//! - **validation**: checks a method against a data source and parses
//!   action arguments into a [`MethodPlan`]
//! - **action**: the action catalogue applied cell by cell
//! - **handler**: the streaming row transformer and unit-of-work reporting
//! - **batch**: parallel runs over many data sources

pub mod action;
pub mod batch;
pub mod catalog;
pub mod codec;
pub mod context;
pub mod error;
pub mod free_text;
pub mod handler;
pub mod validation;

pub use action::{Action, ColumnAction, SUPPRESSED_ZIP_PREFIXES, salted_digest};
pub use batch::{BatchRunner, TransformJob};
pub use catalog::{CatalogError, DerivedTable, DerivedTableCatalog, NoopCatalog};
pub use codec::TableFormat;
pub use context::{MethodContext, RunOptions};
pub use error::{ActionError, DeidError, Result, ValidationError};
pub use free_text::FreeTextReplacer;
pub use handler::{MethodHandler, RunSummary};
pub use validation::{
    ActionConfig, ColumnPlan, MethodPlan, Resolution, validate_method, validate_method_all,
};
