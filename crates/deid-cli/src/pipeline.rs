//! Manifest-level operations behind the `check` and `run` commands.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use deid_model::{StateSink, UnitOfWork, UnitState, aggregate_state};
use deid_transform::{
    BatchRunner, CatalogError, DeidError, DerivedTable, DerivedTableCatalog, RunOptions, RunSummary,
    TransformJob, ValidationError, validate_method_all,
};
use deid_types::TypeRegistry;

use crate::manifest::{JobManifest, SourceEntry};

/// File listing the derived tables written to an output directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// Validation issues of one data source.
#[derive(Debug)]
pub struct SourceCheck {
    pub data_source_id: String,
    pub issues: Vec<ValidationError>,
}

/// Validate the method against every source of the manifest.
pub fn check_manifest(registry: &TypeRegistry, manifest: &JobManifest) -> Vec<SourceCheck> {
    manifest
        .sources
        .iter()
        .map(|source| {
            let issues = validate_method_all(registry, &source.data_source, &manifest.method);
            debug!(
                data_source = %source.data_source.id,
                issues = issues.len(),
                "source checked"
            );
            SourceCheck {
                data_source_id: source.data_source.id.clone(),
                issues,
            }
        })
        .collect()
}

/// Settings for [`run_manifest`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub options: RunOptions,
    /// Worker threads; zero means available parallelism.
    pub workers: usize,
}

/// Outcome of one unit of work.
#[derive(Debug)]
pub struct UnitReport {
    pub data_source_id: String,
    pub state: UnitState,
    pub output: PathBuf,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

/// Outcome of a whole manifest run.
#[derive(Debug)]
pub struct RunReport {
    pub method_id: String,
    pub output_dir: PathBuf,
    pub units: Vec<UnitReport>,
    pub aggregate: UnitState,
}

impl RunReport {
    pub fn all_ready(&self) -> bool {
        self.units.iter().all(|unit| unit.state == UnitState::Ready)
    }
}

#[derive(Debug, Serialize)]
struct CatalogEntry {
    name: String,
    method: String,
    data_source: String,
    run_index: usize,
    path: String,
}

/// Catalog recording every registered table for `catalog.json`.
#[derive(Debug, Default)]
struct DirectoryCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
}

impl DirectoryCatalog {
    fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let path = output_dir.join(CATALOG_FILE);
        let json = serde_json::to_string_pretty(&*entries).context("serialize catalog")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

impl DerivedTableCatalog for DirectoryCatalog {
    fn register(&self, table: &DerivedTable) -> Result<(), CatalogError> {
        let name = table.name();
        let mut entries = self.entries.lock().map_err(|_| CatalogError {
            table: name.clone(),
            message: "catalog lock poisoned".to_string(),
        })?;
        entries.push(CatalogEntry {
            path: output_file_name(table),
            name,
            method: table.method_id.clone(),
            data_source: table.data_source_id.clone(),
            run_index: table.run_index,
        });
        Ok(())
    }
}

fn output_file_name(table: &DerivedTable) -> String {
    format!("{}.csv", table.name())
}

/// Transform every source of the manifest into `settings.output_dir`.
///
/// Sources whose input cannot be opened fail on their own; the others
/// still run. Outputs of failed runs are removed.
pub fn run_manifest(
    registry: &TypeRegistry,
    manifest: &JobManifest,
    settings: &RunSettings,
) -> Result<RunReport> {
    let method = &manifest.method;
    let run_span = info_span!("manifest", method = %method.id);
    let _run_guard = run_span.enter();

    fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("create {}", settings.output_dir.display()))?;

    let mut reports = Vec::with_capacity(manifest.sources.len());
    let mut units = Vec::with_capacity(manifest.sources.len());
    let mut jobs = Vec::new();
    let mut job_slots = Vec::new();
    for (run_index, source) in manifest.sources.iter().enumerate() {
        let data_source_id = source.data_source.id.clone();
        let table = DerivedTable::new(&method.id, &data_source_id, run_index);
        let output = settings.output_dir.join(output_file_name(&table));
        let unit = Arc::new(UnitOfWork::new(&method.id, &data_source_id));

        let mut error = None;
        match open_job(run_index, source, &output, &unit) {
            Ok(job) => {
                job_slots.push(reports.len());
                jobs.push(job);
            }
            Err(open_error) => {
                warn!(
                    data_source = %data_source_id,
                    error = %open_error,
                    "could not open unit of work"
                );
                if let Err(state_error) = unit.set_error() {
                    warn!(error = %state_error, "could not mark unit as failed");
                }
                error = Some(format!("{open_error:#}"));
            }
        }
        reports.push(UnitReport {
            data_source_id,
            state: unit.state(),
            output,
            summary: None,
            error,
        });
        units.push(unit);
    }

    let catalog = DirectoryCatalog::default();
    let results = BatchRunner::new(registry, method, &catalog)
        .with_options(settings.options)
        .with_workers(settings.workers)
        .run(jobs)
        .context("start worker pool")?;

    for (slot, result) in job_slots.into_iter().zip(results) {
        settle(&mut reports[slot], units[slot].state(), result);
    }
    for (report, unit) in reports.iter_mut().zip(&units) {
        report.state = unit.state();
    }

    let catalog_path = catalog.write(&settings.output_dir)?;
    let aggregate = aggregate_state(units.iter().map(|unit| unit.state()));
    info!(
        units = reports.len(),
        aggregate = %aggregate,
        catalog = %catalog_path.display(),
        "manifest finished"
    );
    Ok(RunReport {
        method_id: method.id.clone(),
        output_dir: settings.output_dir.clone(),
        units: reports,
        aggregate,
    })
}

fn open_job(
    run_index: usize,
    source: &SourceEntry,
    output: &Path,
    unit: &Arc<UnitOfWork>,
) -> Result<TransformJob> {
    let input = File::open(&source.input)
        .with_context(|| format!("open {}", source.input.display()))?;
    let output_file =
        File::create(output).with_context(|| format!("create {}", output.display()))?;
    Ok(TransformJob::new(
        run_index,
        source.data_source.clone(),
        BufReader::new(input),
        BufWriter::new(output_file),
        Arc::clone(unit),
    ))
}

/// Fold a job's result into its report. The output file is removed only
/// when the unit failed; a ready unit whose catalog registration failed
/// keeps its table.
fn settle(report: &mut UnitReport, state: UnitState, result: Result<RunSummary, DeidError>) {
    match result {
        Ok(summary) => report.summary = Some(summary),
        Err(error) => {
            report.error = Some(error.to_string());
            if state == UnitState::Error {
                remove_partial_output(&report.output);
            }
        }
    }
}

fn remove_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(error) = fs::remove_file(path) {
        warn!(
            path = %path.display(),
            error = %error,
            "could not remove partial output"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report_for(output: PathBuf) -> UnitReport {
        UnitReport {
            data_source_id: "clinic".into(),
            state: UnitState::Pending,
            output,
            summary: None,
            error: None,
        }
    }

    fn catalog_error() -> DeidError {
        DeidError::Catalog(CatalogError {
            table: "clinic__release__0".into(),
            message: "catalog unavailable".into(),
        })
    }

    #[test]
    fn catalog_failure_keeps_the_ready_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clinic__release__0.csv");
        fs::write(&output, "name\n[NAME]\n").unwrap();
        let mut report = report_for(output.clone());

        settle(&mut report, UnitState::Ready, Err(catalog_error()));

        assert!(output.exists());
        assert!(report.error.as_deref().unwrap().contains("catalog unavailable"));
    }

    #[test]
    fn failed_unit_loses_its_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("clinic__release__0.csv");
        fs::write(&output, "name\n").unwrap();
        let mut report = report_for(output.clone());

        settle(&mut report, UnitState::Error, Err(DeidError::MissingHeader));

        assert!(!output.exists());
        assert!(report.error.is_some());
    }
}
