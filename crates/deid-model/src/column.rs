//! Column descriptors and data sources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage type a column is declared with in the source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    #[serde(alias = "varchar", alias = "text", alias = "char")]
    String,
    #[serde(alias = "integer", alias = "bigint", alias = "smallint")]
    Int,
    #[serde(alias = "double", alias = "decimal", alias = "real")]
    Float,
    #[serde(alias = "timestamp", alias = "datetime")]
    Date,
    #[serde(alias = "bool")]
    Boolean,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 5] = [
        PrimitiveType::String,
        PrimitiveType::Int,
        PrimitiveType::Float,
        PrimitiveType::Date,
        PrimitiveType::Boolean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Date => "date",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a data source.
///
/// `semantic_type` is the name of a registered semantic type (e.g. "Name",
/// "Zip Code"); it is resolved against the type registry during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: PrimitiveType,
    pub semantic_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        data_type: PrimitiveType,
        semantic_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            semantic_type: semantic_type.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Label for reports: the display name when set, otherwise the column name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A tabular dataset described column by column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl DataSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Look up a column by name. Exact matches win over case-insensitive ones.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
