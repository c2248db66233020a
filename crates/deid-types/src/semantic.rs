//! Semantic type definitions.
//!
//! A semantic type classifies a column by what it means for privacy (a name,
//! an age, a zip code) independently of how it is stored. It decides which
//! primitive types a column of that kind may be declared with and which
//! actions, with which named arguments, may be configured for it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use deid_model::{ActionKind, PrimitiveType};

use crate::error::{Result, TypeError};
use crate::numeric::Number;
use crate::temporal::{cap_date, format_date, parse_date};
use crate::values;

/// Age ceiling used when generalizing over-age values.
pub const AGE_CEILING: i64 = 90;

/// How actions interpret cell values of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    Text,
    Numeric,
    Temporal,
    Boolean,
}

/// Type-specific syntax check applied by [`SemanticType::validate_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCheck {
    Any,
    Email,
    IpAddress,
    Ssn,
    PhoneNumber,
}

/// Over-age generalization hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGrouping {
    /// Identity.
    None,
    /// `min(age, AGE_CEILING)`.
    CapAge,
    /// Move dates implying an age past the ceiling.
    CapDate,
}

/// One semantic type. Immutable once registered.
#[derive(Debug, Clone)]
pub struct SemanticType {
    name: String,
    aliases: Vec<String>,
    domain: ValueDomain,
    accepted_primitive_types: BTreeSet<PrimitiveType>,
    /// Absent key: action unsupported. `None`: action takes no arguments.
    accepted_actions: BTreeMap<ActionKind, Option<BTreeSet<String>>>,
    fallback_value: String,
    value_check: ValueCheck,
    age_grouping: AgeGrouping,
}

impl SemanticType {
    pub fn builder(name: impl Into<String>) -> SemanticTypeBuilder {
        SemanticTypeBuilder {
            inner: SemanticType {
                name: name.into(),
                aliases: Vec::new(),
                domain: ValueDomain::Text,
                accepted_primitive_types: BTreeSet::new(),
                accepted_actions: BTreeMap::new(),
                fallback_value: String::new(),
                value_check: ValueCheck::Any,
                age_grouping: AgeGrouping::None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn domain(&self) -> ValueDomain {
        self.domain
    }

    pub fn is_temporal(&self) -> bool {
        self.domain == ValueDomain::Temporal
    }

    pub fn accepted_primitive_types(&self) -> &BTreeSet<PrimitiveType> {
        &self.accepted_primitive_types
    }

    pub fn accepted_actions(&self) -> &BTreeMap<ActionKind, Option<BTreeSet<String>>> {
        &self.accepted_actions
    }

    pub fn accepts_action(&self, action: ActionKind) -> bool {
        self.accepted_actions.contains_key(&action)
    }

    /// Type-appropriate placeholder used where a value must be hidden and no
    /// replacement was configured.
    pub fn fallback_value(&self) -> &str {
        &self.fallback_value
    }

    pub fn validate_type(&self, primitive: PrimitiveType) -> Result<()> {
        if self.accepted_primitive_types.contains(&primitive) {
            Ok(())
        } else {
            Err(TypeError::MismatchingType {
                semantic_type: self.name.clone(),
                primitive,
            })
        }
    }

    /// Check that `action` is legal for this type and that every supplied
    /// argument name belongs to the action's argument contract.
    pub fn validate_action<'a, I>(&self, action: ActionKind, arguments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(accepted) = self.accepted_actions.get(&action) else {
            return Err(TypeError::MismatchingAction {
                semantic_type: self.name.clone(),
                action,
            });
        };
        for argument in arguments {
            let legal = accepted
                .as_ref()
                .is_some_and(|names| names.contains(argument));
            if !legal {
                return Err(TypeError::UnsupportedArgument {
                    semantic_type: self.name.clone(),
                    action,
                    argument: argument.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate_value(&self, value: &str) -> Result<()> {
        let outcome = match self.value_check {
            ValueCheck::Any => Ok(()),
            ValueCheck::Email => values::check_email(value),
            ValueCheck::IpAddress => values::check_ip_address(value),
            ValueCheck::Ssn => values::check_ssn(value),
            ValueCheck::PhoneNumber => values::check_phone_number(value),
        };
        outcome.map_err(|reason| self.invalid_value(reason))
    }

    /// Generalize a value whose implied age exceeds [`AGE_CEILING`].
    ///
    /// Identity for types without an age hook and for values under the
    /// ceiling. `today` anchors date arithmetic.
    pub fn group_over_age(&self, value: &str, today: NaiveDate) -> Result<String> {
        match self.age_grouping {
            AgeGrouping::None => Ok(value.to_string()),
            AgeGrouping::CapAge => {
                let age = Number::parse(value)
                    .ok_or_else(|| self.invalid_value("age is not a number"))?;
                if age.as_f64() > AGE_CEILING as f64 {
                    Ok(AGE_CEILING.to_string())
                } else {
                    Ok(value.to_string())
                }
            }
            AgeGrouping::CapDate => {
                let date =
                    parse_date(value).ok_or_else(|| self.invalid_value("value is not a date"))?;
                let capped = cap_date(date, today, AGE_CEILING as i32);
                if capped == date {
                    Ok(value.to_string())
                } else {
                    Ok(format_date(capped))
                }
            }
        }
    }

    pub(crate) fn invalid_value(&self, reason: impl Into<String>) -> TypeError {
        TypeError::InvalidValue {
            semantic_type: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Fluent construction of [`SemanticType`]. Completeness is checked when the
/// type is registered.
#[derive(Debug, Clone)]
pub struct SemanticTypeBuilder {
    inner: SemanticType,
}

impl SemanticTypeBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.aliases.push(alias.into());
        self
    }

    pub fn domain(mut self, domain: ValueDomain) -> Self {
        self.inner.domain = domain;
        self
    }

    pub fn primitives<I>(mut self, primitives: I) -> Self
    where
        I: IntoIterator<Item = PrimitiveType>,
    {
        self.inner.accepted_primitive_types.extend(primitives);
        self
    }

    /// Accept `action` with no arguments.
    pub fn action(mut self, action: ActionKind) -> Self {
        self.inner.accepted_actions.insert(action, None);
        self
    }

    /// Accept `action` with the given argument names.
    pub fn action_with<I, S>(mut self, action: ActionKind, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = arguments.into_iter().map(Into::into).collect();
        self.inner.accepted_actions.insert(action, Some(names));
        self
    }

    pub fn fallback(mut self, value: impl Into<String>) -> Self {
        self.inner.fallback_value = value.into();
        self
    }

    pub fn value_check(mut self, check: ValueCheck) -> Self {
        self.inner.value_check = check;
        self
    }

    pub fn age_grouping(mut self, grouping: AgeGrouping) -> Self {
        self.inner.age_grouping = grouping;
        self
    }

    pub fn finish(self) -> SemanticType {
        self.inner
    }
}
