//! Method validation.
//!
//! Validation is pure: it looks at the method, the data source's column
//! descriptors and the type registry, never at the data. A successful pass
//! yields a [`MethodPlan`] with every argument parsed into its typed form,
//! which the transformer instantiates without re-checking.

use std::collections::BTreeMap;
use std::sync::Arc;

use deid_model::{
    ActionKind, ArgumentValue, ColumnDescriptor, ColumnRule, DataSource, MethodConfig,
};
use deid_types::{Number, SemanticType, TypeRegistry};
use tracing::debug;

use crate::error::ValidationError;

/// How a LowerResolution action generalizes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep a prefix of the date's components.
    Date { keep_month: bool, keep_day: bool },
    /// Reduce a zip code to its three-digit prefix.
    ZipCode,
}

/// An action with its arguments parsed and checked.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionConfig {
    Omit,
    Mask { replacement: String },
    SaltedMask,
    /// Days for temporal columns, units otherwise.
    Offset { interval: Number },
    RandomOffset { std_dev: f64 },
    LowerResolution(Resolution),
    FreeTextReplacement { mapping: BTreeMap<String, String> },
}

impl ActionConfig {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionConfig::Omit => ActionKind::Omit,
            ActionConfig::Mask { .. } => ActionKind::Mask,
            ActionConfig::SaltedMask => ActionKind::SaltedMask,
            ActionConfig::Offset { .. } => ActionKind::Offset,
            ActionConfig::RandomOffset { .. } => ActionKind::RandomOffset,
            ActionConfig::LowerResolution(_) => ActionKind::LowerResolution,
            ActionConfig::FreeTextReplacement { .. } => ActionKind::FreeTextReplacement,
        }
    }
}

/// One validated column rule.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub column: ColumnDescriptor,
    pub semantic: Arc<SemanticType>,
    pub action: ActionConfig,
}

/// A method validated against one data source.
#[derive(Debug, Clone)]
pub struct MethodPlan {
    pub method_id: String,
    pub data_source_id: String,
    pub columns: Vec<ColumnPlan>,
}

/// Validate a method against a data source, stopping at the first failure.
///
/// Rules are checked in column-name order, so the reported failure is
/// deterministic.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_method(
    registry: &TypeRegistry,
    data_source: &DataSource,
    method: &MethodConfig,
) -> Result<MethodPlan, ValidationError> {
    let columns = method
        .rules
        .iter()
        .map(|(name, rule)| validate_column(registry, data_source, name, rule))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        method = %method.id,
        data_source = %data_source.id,
        columns = columns.len(),
        "method validated"
    );
    Ok(MethodPlan {
        method_id: method.id.clone(),
        data_source_id: data_source.id.clone(),
        columns,
    })
}

/// Validate every rule of a method and collect all failures.
pub fn validate_method_all(
    registry: &TypeRegistry,
    data_source: &DataSource,
    method: &MethodConfig,
) -> Vec<ValidationError> {
    method
        .rules
        .iter()
        .filter_map(|(name, rule)| validate_column(registry, data_source, name, rule).err())
        .collect()
}

fn validate_column(
    registry: &TypeRegistry,
    data_source: &DataSource,
    name: &str,
    rule: &ColumnRule,
) -> Result<ColumnPlan, ValidationError> {
    let column = data_source
        .column(name)
        .ok_or_else(|| ValidationError::MissingColumn {
            column: name.to_string(),
        })?;
    let type_error = |source| ValidationError::Type {
        column: column.name.clone(),
        source,
    };

    let semantic = registry
        .resolve(&column.semantic_type)
        .map_err(type_error)?
        .clone();
    semantic.validate_type(column.data_type).map_err(type_error)?;
    semantic
        .validate_action(rule.action, rule.argument_names())
        .map_err(type_error)?;

    let action = parse_arguments(&semantic, &column.name, rule)?;
    Ok(ColumnPlan {
        column: column.clone(),
        semantic,
        action,
    })
}

fn parse_arguments(
    semantic: &SemanticType,
    column: &str,
    rule: &ColumnRule,
) -> Result<ActionConfig, ValidationError> {
    let action = rule.action;
    let invalid =
        |argument: &str, message: String| ValidationError::invalid_argument(column, action, argument, message);

    let config = match action {
        ActionKind::Omit => ActionConfig::Omit,
        ActionKind::SaltedMask => ActionConfig::SaltedMask,
        ActionKind::Mask => {
            let replacement = match rule.argument("replacement") {
                None => semantic.fallback_value().to_string(),
                Some(value) => {
                    let text = value.as_text().ok_or_else(|| {
                        invalid("replacement", format!("expected text, got {}", value.kind_name()))
                    })?;
                    semantic
                        .validate_value(&text)
                        .map_err(|source| ValidationError::Type {
                            column: column.to_string(),
                            source,
                        })?;
                    text
                }
            };
            ActionConfig::Mask { replacement }
        }
        ActionKind::Offset => {
            let value = required(rule, "interval").map_err(|m| invalid("interval", m))?;
            let interval = match value {
                ArgumentValue::Integer(days) => Number::Int(*days),
                ArgumentValue::Float(amount) if amount.is_finite() => Number::Float(*amount),
                other => {
                    return Err(invalid(
                        "interval",
                        format!("expected a number, got {}", other.kind_name()),
                    ));
                }
            };
            if semantic.is_temporal() && matches!(interval, Number::Float(f) if f.fract() != 0.0) {
                return Err(invalid("interval", "date offsets are whole days".to_string()));
            }
            ActionConfig::Offset { interval }
        }
        ActionKind::RandomOffset => {
            let value = required(rule, "std_dev").map_err(|m| invalid("std_dev", m))?;
            let std_dev = value
                .as_f64()
                .ok_or_else(|| invalid("std_dev", format!("expected a number, got {}", value.kind_name())))?;
            if !(std_dev.is_finite() && std_dev > 0.0) {
                return Err(invalid("std_dev", "must be a positive number".to_string()));
            }
            ActionConfig::RandomOffset { std_dev }
        }
        ActionKind::LowerResolution => {
            if !semantic.is_temporal() {
                ActionConfig::LowerResolution(Resolution::ZipCode)
            } else {
                let flag = |name: &str, default: bool| match rule.argument(name) {
                    None => Ok(default),
                    Some(value) => value.as_bool().ok_or_else(|| {
                        invalid(name, format!("expected a boolean, got {}", value.kind_name()))
                    }),
                };
                let keep_year = flag("keep_year", true)?;
                let keep_month = flag("keep_month", false)?;
                let keep_day = flag("keep_day", false)?;
                if !keep_year {
                    return Err(invalid("keep_year", "the year cannot be dropped".to_string()));
                }
                if keep_day && !keep_month {
                    return Err(invalid(
                        "keep_day",
                        "keeping the day requires keeping the month".to_string(),
                    ));
                }
                ActionConfig::LowerResolution(Resolution::Date {
                    keep_month,
                    keep_day,
                })
            }
        }
        ActionKind::FreeTextReplacement => {
            let mapping = match rule.argument("mapping") {
                None => BTreeMap::new(),
                Some(value) => value
                    .as_mapping()
                    .ok_or_else(|| {
                        invalid("mapping", format!("expected a mapping, got {}", value.kind_name()))
                    })?
                    .clone(),
            };
            if mapping.keys().any(|key| key.trim().is_empty()) {
                return Err(invalid("mapping", "keys must not be empty".to_string()));
            }
            ActionConfig::FreeTextReplacement { mapping }
        }
    };
    Ok(config)
}

fn required<'a>(rule: &'a ColumnRule, name: &str) -> Result<&'a ArgumentValue, String> {
    rule.argument(name)
        .ok_or_else(|| "missing required argument".to_string())
}
