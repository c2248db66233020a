use anyhow::{Context, Result};
use tracing::{info, info_span};

use deid_transform::RunOptions;
use deid_types::TypeRegistry;

use deid_cli::manifest::JobManifest;
use deid_cli::pipeline::{RunReport, RunSettings, check_manifest, run_manifest};

use crate::cli::{CheckArgs, RunArgs};
use crate::summary::{print_check, print_types};

fn load_registry() -> Result<TypeRegistry> {
    TypeRegistry::builtin().context("build semantic type registry")
}

pub fn run_types() -> Result<()> {
    let registry = load_registry()?;
    print_types(registry.iter());
    Ok(())
}

/// Validate only. Returns the number of issues found.
pub fn run_check(args: &CheckArgs) -> Result<usize> {
    let registry = load_registry()?;
    let manifest = JobManifest::load(&args.manifest)?;
    let check_span = info_span!("check", method = %manifest.method.id);
    let _check_guard = check_span.enter();
    let checks = check_manifest(&registry, &manifest);
    let issues = print_check(&manifest.method.id, &checks);
    info!(sources = checks.len(), issues, "check complete");
    Ok(issues)
}

pub fn run_transform(args: &RunArgs) -> Result<RunReport> {
    let registry = load_registry()?;
    let manifest = JobManifest::load(&args.manifest)?;
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        args.manifest
            .parent()
            .map(|dir| dir.join("deid-output"))
            .unwrap_or_else(|| "deid-output".into())
    });

    let mut options = RunOptions::default();
    if let Some(today) = args.today {
        options = options.with_today(today);
    }
    if let Some(seed) = args.seed {
        options = options.with_seed(seed);
    }
    let settings = RunSettings {
        output_dir,
        options,
        workers: args.jobs,
    };
    run_manifest(&registry, &manifest, &settings)
}
