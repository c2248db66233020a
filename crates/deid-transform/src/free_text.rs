//! Whole-word replacement in free-text cells.
//!
//! A replacer holds a static mapping from the method configuration and,
//! while one row is being processed, a working mapping that also carries
//! the row's other de-identified values. Keys match case-insensitively.

use std::collections::{BTreeMap, BTreeSet};

use regex::{Captures, Regex, RegexBuilder};

/// Keys and replacements compiled into one alternation.
///
/// Each key is its own capture group, so a match is resolved by which
/// group took part rather than by re-folding the matched text.
#[derive(Debug, Clone)]
struct Dictionary {
    /// Match priority order: longest key first.
    entries: Vec<(String, String)>,
    pattern: Option<Regex>,
}

impl Dictionary {
    fn new(mut entries: Vec<(String, String)>) -> Result<Self, regex::Error> {
        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let pattern = build_pattern(entries.iter().map(|(key, _)| key.as_str()))?;
        Ok(Self { entries, pattern })
    }

    fn replace(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures<'_>| {
                (1..caps.len())
                    .find(|&group| caps.get(group).is_some())
                    .and_then(|group| self.entries.get(group - 1))
                    .map_or_else(|| caps[0].to_string(), |(_, value)| value.clone())
            })
            .into_owned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct FreeTextReplacer {
    configured: Dictionary,
    /// Lowercased configured keys, for conflict checks.
    configured_keys: BTreeSet<String>,
    /// Row values and the configured entries compiled together. Kept after
    /// a reset so that a row with the same values reuses the pattern.
    row: Option<RowDictionary>,
    in_row: bool,
}

#[derive(Debug, Clone)]
struct RowDictionary {
    additions: Vec<(String, String)>,
    dictionary: Dictionary,
}

impl FreeTextReplacer {
    /// Build a replacer from a configured mapping.
    ///
    /// Keys are trimmed. When two keys differ only in case, the first in
    /// sort order wins.
    pub fn new(mapping: &BTreeMap<String, String>) -> Result<Self, regex::Error> {
        let mut configured_keys = BTreeSet::new();
        let entries = mapping
            .iter()
            .filter_map(|(key, value)| {
                let key = key.trim();
                (!key.is_empty() && configured_keys.insert(key.to_lowercase()))
                    .then(|| (key.to_string(), value.clone()))
            })
            .collect();
        Ok(Self {
            configured: Dictionary::new(entries)?,
            configured_keys,
            row: None,
            in_row: false,
        })
    }

    /// Extend the working mapping with a row's `original -> transformed`
    /// pairs. Configured entries win over row values on conflict.
    pub fn absorb<'a, I>(&mut self, row_values: I) -> Result<(), regex::Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut seen = self.configured_keys.clone();
        let additions: Vec<(String, String)> = row_values
            .into_iter()
            .filter_map(|(original, transformed)| {
                let key = original.trim();
                (!key.is_empty() && seen.insert(key.to_lowercase()))
                    .then(|| (key.to_string(), transformed.to_string()))
            })
            .collect();
        self.in_row = !additions.is_empty();
        if !self.in_row {
            return Ok(());
        }
        if self.row.as_ref().is_some_and(|row| row.additions == additions) {
            return Ok(());
        }
        let mut entries = self.configured.entries.clone();
        entries.extend(additions.iter().cloned());
        self.row = Some(RowDictionary {
            dictionary: Dictionary::new(entries)?,
            additions,
        });
        Ok(())
    }

    /// Drop the row values, restoring the configured mapping.
    pub fn reset(&mut self) {
        self.in_row = false;
    }

    pub fn replace(&self, text: &str) -> String {
        self.active().replace(text)
    }

    /// Number of entries currently in effect.
    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn active(&self) -> &Dictionary {
        match &self.row {
            Some(row) if self.in_row => &row.dictionary,
            _ => &self.configured,
        }
    }
}

/// Alternation of escaped keys, one group each, in the given order.
/// Word boundaries are only required on sides where the key itself starts
/// or ends with a word character.
fn build_pattern<'a, I>(keys: I) -> Result<Option<Regex>, regex::Error>
where
    I: IntoIterator<Item = &'a str>,
{
    let alternatives: Vec<String> = keys
        .into_iter()
        .map(|key| {
            let lead = if key.starts_with(is_word_char) { r"\b" } else { "" };
            let tail = if key.ends_with(is_word_char) { r"\b" } else { "" };
            format!("({lead}{}{tail})", regex::escape(key))
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .size_limit(1 << 26)
        .build()
        .map(Some)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
