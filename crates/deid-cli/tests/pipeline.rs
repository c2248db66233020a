//! Manifest runs against a temporary directory.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use deid_cli::manifest::JobManifest;
use deid_cli::pipeline::{CATALOG_FILE, RunSettings, check_manifest, run_manifest};
use deid_model::UnitState;
use deid_transform::RunOptions;
use deid_types::TypeRegistry;

const MANIFEST: &str = r#"{
    "method": {
        "id": "release",
        "salt": "pepper",
        "rules": {
            "name": { "action": "mask", "arguments": { "replacement": "[NAME]" } },
            "age": { "action": "offset", "arguments": { "interval": 5 } },
            "email": { "action": "omit" },
            "notes": { "action": "free_text_replacement" }
        }
    },
    "sources": [
        {
            "data_source": {
                "id": "clinic",
                "columns": [
                    { "name": "name", "data_type": "string", "semantic_type": "Name" },
                    { "name": "age", "data_type": "int", "semantic_type": "Age" },
                    { "name": "email", "data_type": "varchar", "semantic_type": "email address" },
                    { "name": "notes", "data_type": "string", "semantic_type": "Free Text" }
                ]
            },
            "input": "clinic.csv"
        },
        {
            "data_source": {
                "id": "registry",
                "columns": [
                    { "name": "name", "data_type": "string", "semantic_type": "Name" },
                    { "name": "age", "data_type": "int", "semantic_type": "Age" },
                    { "name": "email", "data_type": "string", "semantic_type": "Email" },
                    { "name": "notes", "data_type": "string", "semantic_type": "Free Text" }
                ]
            },
            "input": "missing.csv"
        }
    ]
}"#;

const CLINIC_CSV: &str = "\
name,age,email,notes
Ann Lee,40,ann@example.com,Ann Lee is 40
";

fn write_job(dir: &Path) -> JobManifest {
    fs::write(dir.join("clinic.csv"), CLINIC_CSV).unwrap();
    let path = dir.join("job.json");
    fs::write(&path, MANIFEST).unwrap();
    JobManifest::load(&path).unwrap()
}

fn settings(dir: &Path) -> RunSettings {
    RunSettings {
        output_dir: dir.join("out"),
        options: RunOptions::default()
            .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
            .with_seed(3),
        workers: 2,
    }
}

#[test]
fn manifest_inputs_resolve_next_to_the_manifest() {
    let dir = TempDir::new().unwrap();
    let manifest = write_job(dir.path());
    assert_eq!(manifest.sources[0].input, dir.path().join("clinic.csv"));
}

#[test]
fn check_reports_clean_sources() {
    let dir = TempDir::new().unwrap();
    let manifest = write_job(dir.path());
    let registry = TypeRegistry::builtin().unwrap();
    let checks = check_manifest(&registry, &manifest);
    assert_eq!(checks.len(), 2);
    assert!(checks.iter().all(|check| check.issues.is_empty()));
}

#[test]
fn check_reports_every_issue() {
    let dir = TempDir::new().unwrap();
    let mut manifest = write_job(dir.path());
    manifest.method.rules.insert(
        "ssn".into(),
        deid_model::ColumnRule::new(deid_model::ActionKind::Omit),
    );
    manifest.method.rules.insert(
        "name".into(),
        deid_model::ColumnRule::new(deid_model::ActionKind::Offset).with_argument("interval", 1),
    );
    let registry = TypeRegistry::builtin().unwrap();
    let checks = check_manifest(&registry, &manifest);
    let columns: Vec<&str> = checks[0].issues.iter().map(|issue| issue.column()).collect();
    assert_eq!(columns, vec!["name", "ssn"]);
}

#[test]
fn run_writes_tables_and_catalog() {
    let dir = TempDir::new().unwrap();
    let manifest = write_job(dir.path());
    let registry = TypeRegistry::builtin().unwrap();
    let settings = settings(dir.path());

    let report = run_manifest(&registry, &manifest, &settings).unwrap();

    let clinic = &report.units[0];
    assert_eq!(clinic.state, UnitState::Ready);
    assert_eq!(
        clinic.output,
        settings.output_dir.join("clinic__release__0.csv")
    );
    let output = fs::read_to_string(&clinic.output).unwrap();
    insta::assert_snapshot!(output.trim_end(), @r"
    name,age,notes
    [NAME],45,[NAME] is 45
    ");

    // the second source has no input file and fails on its own
    let registry_unit = &report.units[1];
    assert_eq!(registry_unit.state, UnitState::Error);
    assert!(registry_unit.error.as_deref().unwrap().contains("missing.csv"));
    assert!(!registry_unit.output.exists());

    assert_eq!(report.aggregate, UnitState::Ready);
    assert!(!report.all_ready());

    let catalog: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(settings.output_dir.join(CATALOG_FILE)).unwrap())
            .unwrap();
    let names: Vec<&str> = catalog
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["clinic__release__0"]);
}

#[test]
fn failed_transform_removes_partial_output() {
    let dir = TempDir::new().unwrap();
    let manifest = write_job(dir.path());
    fs::write(
        dir.path().join("clinic.csv"),
        "name,age,email,notes\nAnn,forty,a@example.com,hi\n",
    )
    .unwrap();
    let registry = TypeRegistry::builtin().unwrap();
    let settings = settings(dir.path());

    let report = run_manifest(&registry, &manifest, &settings).unwrap();
    let clinic = &report.units[0];
    assert_eq!(clinic.state, UnitState::Error);
    assert!(clinic.error.as_deref().unwrap().contains("age"));
    assert!(!clinic.output.exists());
    assert_eq!(report.aggregate, UnitState::Error);
}
