//! De-identification methods.
//!
//! A method is a named set of per-column rules. Each rule picks one
//! [`ActionKind`] and supplies its named arguments; whether the combination is
//! legal for the column's semantic type is decided by the type registry, not
//! here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of transformation applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Omit,
    Mask,
    #[serde(alias = "salted_hash_mask")]
    SaltedMask,
    Offset,
    RandomOffset,
    LowerResolution,
    #[serde(alias = "free_text")]
    FreeTextReplacement,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Omit,
        ActionKind::Mask,
        ActionKind::SaltedMask,
        ActionKind::Offset,
        ActionKind::RandomOffset,
        ActionKind::LowerResolution,
        ActionKind::FreeTextReplacement,
    ];

    /// Human-readable name used in reports.
    pub fn display_name(self) -> &'static str {
        match self {
            ActionKind::Omit => "Omit",
            ActionKind::Mask => "Mask",
            ActionKind::SaltedMask => "Salted Hash Mask",
            ActionKind::Offset => "Offset",
            ActionKind::RandomOffset => "Random Offset",
            ActionKind::LowerResolution => "Lower Resolution",
            ActionKind::FreeTextReplacement => "Free Text Replacement",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Value of a named action argument.
///
/// Deserialized untagged, so JSON `5` is an integer, `5.5` a float and an
/// object of strings a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Mapping(BTreeMap<String, String>),
}

impl ArgumentValue {
    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ArgumentValue::Bool(_) => "boolean",
            ArgumentValue::Integer(_) => "integer",
            ArgumentValue::Float(_) => "float",
            ArgumentValue::Text(_) => "text",
            ArgumentValue::Mapping(_) => "mapping",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgumentValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgumentValue::Integer(value) => Some(*value as f64),
            ArgumentValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Text rendering of scalar values. Mappings have no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ArgumentValue::Bool(value) => Some(value.to_string()),
            ArgumentValue::Integer(value) => Some(value.to_string()),
            ArgumentValue::Float(value) => Some(value.to_string()),
            ArgumentValue::Text(value) => Some(value.clone()),
            ArgumentValue::Mapping(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ArgumentValue::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        ArgumentValue::Bool(value)
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        ArgumentValue::Integer(value)
    }
}

impl From<i32> for ArgumentValue {
    fn from(value: i32) -> Self {
        ArgumentValue::Integer(i64::from(value))
    }
}

impl From<f64> for ArgumentValue {
    fn from(value: f64) -> Self {
        ArgumentValue::Float(value)
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        ArgumentValue::Text(value.to_string())
    }
}

impl From<BTreeMap<String, String>> for ArgumentValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        ArgumentValue::Mapping(value)
    }
}

/// Action and arguments configured for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, ArgumentValue>,
}

impl ColumnRule {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentValue> {
        self.arguments.get(name)
    }

    pub fn argument_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.keys().map(String::as_str)
    }
}

/// A reusable de-identification method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub id: String,
    /// Push ages and dates through the over-age ceiling before any action runs.
    #[serde(default)]
    pub cap_overage: bool,
    /// Stable per-method secret appended to values before salted hashing.
    #[serde(default)]
    pub salt: String,
    /// Rules keyed by column name. Columns without a rule pass through.
    #[serde(default)]
    pub rules: BTreeMap<String, ColumnRule>,
}

impl MethodConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cap_overage: false,
            salt: String::new(),
            rules: BTreeMap::new(),
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn with_cap_overage(mut self, cap_overage: bool) -> Self {
        self.cap_overage = cap_overage;
        self
    }

    pub fn with_rule(mut self, column: impl Into<String>, rule: ColumnRule) -> Self {
        self.rules.insert(column.into(), rule);
        self
    }

    pub fn rule(&self, column: &str) -> Option<&ColumnRule> {
        self.rules.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_text_renders_scalars() {
        assert_eq!(ArgumentValue::from(5_i64).as_text().as_deref(), Some("5"));
        assert_eq!(ArgumentValue::from(true).as_text().as_deref(), Some("true"));
        assert_eq!(ArgumentValue::from("X").as_text().as_deref(), Some("X"));
        assert!(ArgumentValue::from(BTreeMap::new()).as_text().is_none());
    }

    #[test]
    fn argument_numbers_widen_to_f64() {
        assert_eq!(ArgumentValue::from(3_i64).as_f64(), Some(3.0));
        assert_eq!(ArgumentValue::from(2.5).as_f64(), Some(2.5));
        assert_eq!(ArgumentValue::from("3").as_f64(), None);
    }

    #[test]
    fn builder_collects_rules() {
        let method = MethodConfig::new("m1")
            .with_salt("pepper")
            .with_cap_overage(true)
            .with_rule("name", ColumnRule::new(ActionKind::SaltedMask))
            .with_rule(
                "visit",
                ColumnRule::new(ActionKind::Offset).with_argument("interval", 5_i64),
            );

        assert!(method.cap_overage);
        assert_eq!(method.rules.len(), 2);
        let names: Vec<&str> = method.rule("visit").unwrap().argument_names().collect();
        assert_eq!(names, vec!["interval"]);
    }
}
