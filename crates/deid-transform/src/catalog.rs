//! Registration of transformed tables with a downstream query catalog.

use std::fmt;

use thiserror::Error;

/// A transformed table produced by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTable {
    pub method_id: String,
    pub data_source_id: String,
    pub run_index: usize,
}

impl DerivedTable {
    pub fn new(
        method_id: impl Into<String>,
        data_source_id: impl Into<String>,
        run_index: usize,
    ) -> Self {
        Self {
            method_id: method_id.into(),
            data_source_id: data_source_id.into(),
            run_index,
        }
    }

    /// `{data_source}__{method}__{run_index}`, with characters outside
    /// `[A-Za-z0-9_-]` replaced by `_`.
    pub fn name(&self) -> String {
        format!(
            "{}__{}__{}",
            sanitize(&self.data_source_id),
            sanitize(&self.method_id),
            self.run_index
        )
    }
}

impl fmt::Display for DerivedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to register table '{table}': {message}")]
pub struct CatalogError {
    pub table: String,
    pub message: String,
}

/// Receives every successfully transformed table.
pub trait DerivedTableCatalog: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the table cannot be registered.
    fn register(&self, table: &DerivedTable) -> Result<(), CatalogError>;
}

/// Catalog that accepts everything and records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCatalog;

impl DerivedTableCatalog for NoopCatalog {
    fn register(&self, _table: &DerivedTable) -> Result<(), CatalogError> {
        Ok(())
    }
}
