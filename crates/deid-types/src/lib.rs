//! Semantic type registry for de-identification.
//!
//! - **semantic**: the [`SemanticType`] value object and its checks
//! - **registry**: the constructed-once [`TypeRegistry`]
//! - **builtin**: the builtin type catalogue (Name, Age, Date, Zip Code, ...)
//! - **numeric** / **temporal**: cell parsing shared with the action catalogue

mod builtin;
pub mod error;
pub mod numeric;
pub mod registry;
pub mod semantic;
pub mod temporal;
mod values;

pub use error::{RegistryError, Result, TypeError};
pub use numeric::{Number, format_float};
pub use registry::TypeRegistry;
pub use semantic::{
    AGE_CEILING, AgeGrouping, SemanticType, SemanticTypeBuilder, ValueCheck, ValueDomain,
};
pub use temporal::{cap_date, format_date, parse_date};
