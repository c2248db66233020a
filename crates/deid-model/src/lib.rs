//! Data model for dataset de-identification.
//!
//! This crate holds the plain descriptors exchanged between the rule engine and
//! its collaborators:
//!
//! - **column**: column descriptors and data sources (what a table looks like)
//! - **method**: de-identification methods and their per-column rules
//! - **state**: the per (method, data source) unit-of-work lifecycle

pub mod column;
pub mod error;
pub mod method;
pub mod state;

pub use column::{ColumnDescriptor, DataSource, PrimitiveType};
pub use error::StateError;
pub use method::{ActionKind, ArgumentValue, ColumnRule, MethodConfig};
pub use state::{StateSink, Transition, UnitOfWork, UnitState, aggregate_state};
