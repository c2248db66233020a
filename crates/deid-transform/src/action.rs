//! Action catalogue.
//!
//! A [`ColumnAction`] is one validated column rule instantiated for a run.
//! It transforms single cells and decides whether its column survives in
//! the output header. Actions never see a cell twice and never see the
//! rest of the row, except for free-text replacement which is fed the
//! row's other values through [`ColumnAction::absorb_row`].

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use sha3::{Digest, Sha3_224};

use deid_model::{ActionKind, ColumnDescriptor};
use deid_types::{Number, SemanticType, format_date, parse_date};

use crate::context::MethodContext;
use crate::error::{ActionError, ValidationError};
use crate::free_text::FreeTextReplacer;
use crate::validation::{ActionConfig, ColumnPlan, Resolution};

/// Three-digit zip prefixes covering fewer than 20,000 people.
pub const SUPPRESSED_ZIP_PREFIXES: [&str; 17] = [
    "036", "059", "063", "102", "203", "556", "692", "790", "821", "823", "830", "831", "878",
    "879", "884", "890", "893",
];

const SUPPRESSED_ZIP: &str = "000";

/// Random offsets are clamped to this many standard deviations.
const NOISE_CLAMP: f64 = 3.0;

#[derive(Debug)]
pub enum Action {
    Omit,
    Mask { replacement: String },
    SaltedMask { salt: String },
    Offset { interval: Number },
    RandomOffset { noise: Normal<f64>, std_dev: f64, rng: StdRng },
    LowerResolution(Resolution),
    FreeTextReplacement(FreeTextReplacer),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Omit => ActionKind::Omit,
            Action::Mask { .. } => ActionKind::Mask,
            Action::SaltedMask { .. } => ActionKind::SaltedMask,
            Action::Offset { .. } => ActionKind::Offset,
            Action::RandomOffset { .. } => ActionKind::RandomOffset,
            Action::LowerResolution(_) => ActionKind::LowerResolution,
            Action::FreeTextReplacement(_) => ActionKind::FreeTextReplacement,
        }
    }

    /// Whether the transform depends on the cell value.
    fn reads_value(&self) -> bool {
        !matches!(self, Action::Omit | Action::Mask { .. })
    }
}

#[derive(Debug)]
pub struct ColumnAction {
    column: ColumnDescriptor,
    semantic: Arc<SemanticType>,
    context: Arc<MethodContext>,
    action: Action,
}

impl ColumnAction {
    /// Instantiate a validated rule. `position` selects the random stream
    /// for seeded runs.
    pub fn new(
        plan: &ColumnPlan,
        context: Arc<MethodContext>,
        position: usize,
    ) -> Result<Self, ValidationError> {
        let column = plan.column.name.as_str();
        let action = match &plan.action {
            ActionConfig::Omit => Action::Omit,
            ActionConfig::Mask { replacement } => Action::Mask {
                replacement: replacement.clone(),
            },
            ActionConfig::SaltedMask => Action::SaltedMask {
                salt: context.salt.clone(),
            },
            ActionConfig::Offset { interval } => Action::Offset {
                interval: *interval,
            },
            ActionConfig::RandomOffset { std_dev } => {
                let noise = Normal::new(0.0, *std_dev).map_err(|e| {
                    ValidationError::invalid_argument(
                        column,
                        ActionKind::RandomOffset,
                        "std_dev",
                        e.to_string(),
                    )
                })?;
                Action::RandomOffset {
                    noise,
                    std_dev: *std_dev,
                    rng: context.rng_for(position),
                }
            }
            ActionConfig::LowerResolution(resolution) => Action::LowerResolution(*resolution),
            ActionConfig::FreeTextReplacement { mapping } => {
                let replacer = FreeTextReplacer::new(mapping).map_err(|e| {
                    ValidationError::invalid_argument(
                        column,
                        ActionKind::FreeTextReplacement,
                        "mapping",
                        e.to_string(),
                    )
                })?;
                Action::FreeTextReplacement(replacer)
            }
        };
        Ok(Self {
            column: plan.column.clone(),
            semantic: Arc::clone(&plan.semantic),
            context,
            action,
        })
    }

    pub fn column(&self) -> &ColumnDescriptor {
        &self.column
    }

    pub fn semantic(&self) -> &SemanticType {
        &self.semantic
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn is_omit(&self) -> bool {
        matches!(self.action, Action::Omit)
    }

    pub fn is_free_text(&self) -> bool {
        matches!(self.action, Action::FreeTextReplacement(_))
    }

    /// Output header entry for the column at `index`; `None` drops it.
    pub fn deid_column_name(&self, header: &[String], index: usize) -> Option<String> {
        if self.is_omit() {
            return None;
        }
        header.get(index).cloned()
    }

    /// Transform one cell. `Ok(None)` means the cell is dropped.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be read as the action requires, such as
    /// a non-date under a date offset.
    pub fn deid(&mut self, value: &str) -> Result<Option<String>, ActionError> {
        let value: Cow<'_, str> = if self.context.cap_overage && self.action.reads_value() {
            Cow::Owned(self.semantic.group_over_age(value, self.context.today)?)
        } else {
            Cow::Borrowed(value)
        };
        let temporal = self.semantic.is_temporal();

        let output = match &mut self.action {
            Action::Omit => return Ok(None),
            Action::Mask { replacement } => replacement.clone(),
            Action::SaltedMask { salt } => salted_digest(&value, salt),
            Action::Offset { interval } => offset(&value, *interval, temporal)?,
            Action::RandomOffset {
                noise,
                std_dev,
                rng,
            } => {
                let limit = NOISE_CLAMP * *std_dev;
                let drawn = noise.sample(rng).clamp(-limit, limit);
                offset(&value, Number::Float(drawn), temporal)?
            }
            Action::LowerResolution(Resolution::ZipCode) => lower_zip_resolution(&value),
            Action::LowerResolution(Resolution::Date {
                keep_month,
                keep_day,
            }) => {
                let date = parse_date(&value).ok_or(ActionError::NotADate)?;
                lower_date_resolution(date, *keep_month, *keep_day)
            }
            Action::FreeTextReplacement(replacer) => replacer.replace(&value),
        };
        Ok(Some(output))
    }

    /// Feed the row's `original -> transformed` pairs to a free-text action.
    /// No-op for other actions.
    pub fn absorb_row<'a, I>(&mut self, row_values: I) -> Result<(), ActionError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if let Action::FreeTextReplacement(replacer) = &mut self.action {
            replacer.absorb(row_values)?;
        }
        Ok(())
    }

    /// Forget the values absorbed for the current row.
    pub fn reset_row(&mut self) {
        if let Action::FreeTextReplacement(replacer) = &mut self.action {
            replacer.reset();
        }
    }
}

/// Lowercase hex SHA3-224 of `value` followed by `salt`.
pub fn salted_digest(value: &str, salt: &str) -> String {
    let mut hasher = Sha3_224::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

fn offset(value: &str, interval: Number, temporal: bool) -> Result<String, ActionError> {
    if temporal {
        let date = parse_date(value).ok_or(ActionError::NotADate)?;
        let days = match interval {
            Number::Int(days) => days,
            Number::Float(days) => days.round() as i64,
        };
        return offset_date(date, days).map(format_date);
    }
    Ok(numeric_base(value)?.add(interval).to_string())
}

fn offset_date(date: NaiveDate, days: i64) -> Result<NaiveDate, ActionError> {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(ActionError::DateOutOfRange)
}

/// Numeric base of an offset: the float reading when it exceeds the integer
/// reading, otherwise the integer (truncated when the cell is fractional).
fn numeric_base(value: &str) -> Result<Number, ActionError> {
    let trimmed = value.trim();
    let float = trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or(ActionError::NotANumber)?;
    let int = trimmed.parse::<i64>().unwrap_or(float.trunc() as i64);
    if float > int as f64 {
        Ok(Number::Float(float))
    } else {
        Ok(Number::Int(int))
    }
}

fn lower_date_resolution(date: NaiveDate, keep_month: bool, keep_day: bool) -> String {
    let format = match (keep_month, keep_day) {
        (true, true) => "%Y-%m-%d",
        (true, false) => "%Y-%m",
        _ => "%Y",
    };
    date.format(format).to_string()
}

/// First three characters of the zip, or `000` for prefixes starting with
/// zero and for sparsely populated areas.
fn lower_zip_resolution(value: &str) -> String {
    let trimmed = value.trim();
    let prefix: String = trimmed.chars().take(3).collect();
    if trimmed.starts_with('0') || SUPPRESSED_ZIP_PREFIXES.contains(&prefix.as_str()) {
        SUPPRESSED_ZIP.to_string()
    } else {
        prefix
    }
}
