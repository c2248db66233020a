//! Streaming row transformer for one (method, data source) unit of work.
//!
//! A run:
//! 1. Validates the method against the data source, before any I/O
//! 2. Reads the header and resolves each configured column to a position
//! 3. Streams the data rows, transforming cells in two passes per row
//! 4. Marks the unit ready and registers the derived table
//!
//! Within a row the first pass handles every non-free-text column and
//! records `original -> transformed` pairs in a row-local cache; the second
//! pass runs free-text replacement with that cache merged into the
//! configured mapping. The cache never outlives its row.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use csv::StringRecord;
use tracing::{debug, info, info_span, warn};

use deid_model::{DataSource, MethodConfig, StateSink};
use deid_types::TypeRegistry;

use crate::action::ColumnAction;
use crate::catalog::{DerivedTable, DerivedTableCatalog};
use crate::codec::{open_reader, open_writer};
use crate::context::{MethodContext, RunOptions};
use crate::error::{ActionError, DeidError, Result};
use crate::validation::{MethodPlan, validate_method};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub derived_table: DerivedTable,
    /// Data rows written, blank lines included, header excluded.
    pub rows: u64,
    pub columns_in: usize,
    pub columns_out: usize,
    /// Columns removed by Omit, in header order.
    pub omitted: Vec<String>,
    pub elapsed: Duration,
}

/// Runs one method over one data source.
#[derive(Debug, Clone, Copy)]
pub struct MethodHandler<'a> {
    registry: &'a TypeRegistry,
    data_source: &'a DataSource,
    method: &'a MethodConfig,
    run_index: usize,
    options: RunOptions,
}

impl<'a> MethodHandler<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        data_source: &'a DataSource,
        method: &'a MethodConfig,
        run_index: usize,
    ) -> Self {
        Self {
            registry,
            data_source,
            method,
            run_index,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn derived_table(&self) -> DerivedTable {
        DerivedTable::new(&self.method.id, &self.data_source.id, self.run_index)
    }

    /// Transform `input` into `output` and report the outcome to `state`
    /// and `catalog`.
    ///
    /// On any failure the unit is marked `Error` and nothing is registered.
    /// On success the unit is marked `Ready` before registration, so a
    /// catalog failure leaves a ready unit and returns
    /// [`DeidError::Catalog`].
    ///
    /// # Errors
    ///
    /// Returns validation, CSV, I/O, transform, state and catalog errors.
    pub fn run<R, W>(
        &self,
        input: R,
        output: W,
        state: &dyn StateSink,
        catalog: &dyn DerivedTableCatalog,
    ) -> Result<RunSummary>
    where
        R: Read,
        W: Write,
    {
        let run_span = info_span!(
            "deid_run",
            method = %self.method.id,
            data_source = %self.data_source.id,
            run_index = self.run_index
        );
        let _run_guard = run_span.enter();

        let summary = match self.transform(input, output) {
            Ok(summary) => summary,
            Err(error) => {
                warn!(error = %error, "transformation failed");
                if let Err(state_error) = state.set_error() {
                    warn!(error = %state_error, "could not mark unit as failed");
                }
                return Err(error);
            }
        };

        state.set_ready()?;
        catalog.register(&summary.derived_table)?;
        info!(
            derived_table = %summary.derived_table,
            rows = summary.rows,
            columns_in = summary.columns_in,
            columns_out = summary.columns_out,
            duration_ms = summary.elapsed.as_millis(),
            "transformation complete"
        );
        Ok(summary)
    }

    /// Validate, then stream. Touches neither state nor catalog.
    pub fn transform<R, W>(&self, input: R, output: W) -> Result<RunSummary>
    where
        R: Read,
        W: Write,
    {
        let start = Instant::now();
        let plan = validate_method(self.registry, self.data_source, self.method)?;
        let mut actions = self.instantiate(&plan)?;

        let (format, mut reader) = open_reader(input)?;
        let mut record = StringRecord::new();
        let has_header = reader
            .read_record(&mut record)
            .map_err(|source| DeidError::Csv { row: 0, source })?;
        if !has_header {
            return Err(DeidError::MissingHeader);
        }
        let header: Vec<String> = record.iter().map(str::to_string).collect();
        let slots = resolve_slots(&header, &actions)?;

        let mut output_header = Vec::with_capacity(header.len());
        let mut omitted = Vec::new();
        for (index, name) in header.iter().enumerate() {
            let entry = match slots[index] {
                Some(slot) => actions[slot].deid_column_name(&header, index),
                None => Some(name.clone()),
            };
            match entry {
                Some(entry) => output_header.push(entry),
                None => omitted.push(name.clone()),
            }
        }
        debug!(
            columns_in = header.len(),
            columns_out = output_header.len(),
            omitted = omitted.len(),
            quote_all = format.quote_all,
            "header resolved"
        );

        let mut writer = open_writer(output, format);
        let leading = reader.get_mut().take_blank_lines_before(0);
        write_blank_lines(&mut writer, leading, 0)?;
        writer
            .write_record(&output_header)
            .map_err(|source| DeidError::Csv { row: 0, source })?;

        let mut rows = 0u64;
        let mut records = 0u64;
        let mut cells: Vec<String> = Vec::with_capacity(output_header.len());
        let mut deferred: Vec<(usize, usize, usize)> = Vec::new();
        loop {
            let more = reader
                .read_record(&mut record)
                .map_err(|source| DeidError::Csv { row: rows + 1, source })?;
            if !more {
                break;
            }
            records += 1;
            // blank lines pass through untouched and keep their place
            let blank = reader.get_mut().take_blank_lines_before(records);
            write_blank_lines(&mut writer, blank, rows + 1)?;
            rows += blank;
            let row = rows + 1;
            transform_row(&record, row, &slots, &mut actions, &mut cells, &mut deferred)?;
            writer
                .write_record(&cells)
                .map_err(|source| DeidError::Csv { row, source })?;
            rows = row;
        }
        let trailing = reader.get_mut().take_remaining_blank_lines();
        write_blank_lines(&mut writer, trailing, rows + 1)?;
        rows += trailing;
        writer.flush()?;

        Ok(RunSummary {
            derived_table: self.derived_table(),
            rows,
            columns_in: header.len(),
            columns_out: output_header.len(),
            omitted,
            elapsed: start.elapsed(),
        })
    }

    fn instantiate(&self, plan: &MethodPlan) -> Result<Vec<ColumnAction>> {
        let context = Arc::new(MethodContext::new(self.method, self.options));
        plan.columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                ColumnAction::new(column, Arc::clone(&context), position).map_err(DeidError::from)
            })
            .collect()
    }
}

/// Fill `cells` with the transformed row.
///
/// `deferred` collects `(cell position, action slot, input column)` of
/// free-text cells for the second pass.
fn transform_row(
    record: &StringRecord,
    row: u64,
    slots: &[Option<usize>],
    actions: &mut [ColumnAction],
    cells: &mut Vec<String>,
    deferred: &mut Vec<(usize, usize, usize)>,
) -> Result<()> {
    cells.clear();
    deferred.clear();
    let mut row_cache: BTreeMap<&str, String> = BTreeMap::new();

    for (index, field) in record.iter().enumerate() {
        let Some(slot) = slots.get(index).copied().flatten() else {
            cells.push(field.to_string());
            continue;
        };
        let action = &mut actions[slot];
        if action.is_omit() {
            remember(&mut row_cache, field, action.semantic().fallback_value());
            continue;
        }
        if action.is_free_text() {
            deferred.push((cells.len(), slot, index));
            cells.push(String::new());
            continue;
        }
        if field.is_empty() {
            cells.push(String::new());
            continue;
        }
        let transformed = action
            .deid(field)
            .map_err(|source| transform_error(action, row, source))?;
        if let Some(value) = transformed {
            remember(&mut row_cache, field, &value);
            cells.push(value);
        }
    }

    for &(position, slot, index) in deferred.iter() {
        let field = record.get(index).unwrap_or_default();
        if field.is_empty() {
            continue;
        }
        let action = &mut actions[slot];
        action
            .absorb_row(row_cache.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|source| transform_error(action, row, source))?;
        let replaced = action
            .deid(field)
            .map_err(|source| transform_error(action, row, source));
        action.reset_row();
        cells[position] = replaced?.unwrap_or_default();
    }
    Ok(())
}

/// Map each header position to the action configured for it, if any.
fn resolve_slots(header: &[String], actions: &[ColumnAction]) -> Result<Vec<Option<usize>>> {
    let mut slots = vec![None; header.len()];
    for (slot, action) in actions.iter().enumerate() {
        let name = action.column().name.as_str();
        let position = header
            .iter()
            .position(|h| h == name)
            .or_else(|| header.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DeidError::UnknownHeaderColumn {
                column: name.to_string(),
            })?;
        slots[position] = Some(slot);
    }
    Ok(slots)
}

fn write_blank_lines<W: Write>(writer: &mut csv::Writer<W>, count: u64, row: u64) -> Result<()> {
    for _ in 0..count {
        writer
            .write_record(std::iter::empty::<&str>())
            .map_err(|source| DeidError::Csv { row, source })?;
    }
    Ok(())
}

/// Record a value for free-text replacement, keyed by the trimmed
/// original. Blank originals and unchanged values are skipped.
fn remember<'r>(cache: &mut BTreeMap<&'r str, String>, original: &'r str, transformed: &str) {
    let key = original.trim();
    let value = transformed.trim();
    if key.is_empty() || key == value {
        return;
    }
    cache.insert(key, value.to_string());
}

fn transform_error(action: &ColumnAction, row: u64, source: ActionError) -> DeidError {
    DeidError::Transform {
        column: action.column().name.clone(),
        row,
        source,
    }
}
