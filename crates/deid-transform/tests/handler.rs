//! End-to-end runs of the streaming transformer.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use deid_model::{
    ActionKind, ColumnDescriptor, ColumnRule, DataSource, MethodConfig, PrimitiveType, UnitOfWork,
    UnitState,
};
use deid_transform::{
    BatchRunner, CatalogError, DeidError, DerivedTable, DerivedTableCatalog, MethodHandler,
    NoopCatalog, RunOptions, TransformJob, ValidationError, salted_digest,
};
use deid_types::TypeRegistry;

/// Records every registered table name.
#[derive(Default)]
struct RecordingCatalog {
    tables: Mutex<Vec<String>>,
}

impl RecordingCatalog {
    fn names(&self) -> Vec<String> {
        self.tables.lock().unwrap().clone()
    }
}

impl DerivedTableCatalog for RecordingCatalog {
    fn register(&self, table: &DerivedTable) -> Result<(), CatalogError> {
        self.tables.lock().unwrap().push(table.name());
        Ok(())
    }
}

struct FailingCatalog;

impl DerivedTableCatalog for FailingCatalog {
    fn register(&self, table: &DerivedTable) -> Result<(), CatalogError> {
        Err(CatalogError {
            table: table.name(),
            message: "catalog unavailable".into(),
        })
    }
}

/// Fails the test if anything reads from it.
struct UntouchedReader;

impl Read for UntouchedReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        panic!("input was read before validation finished");
    }
}

fn registry() -> TypeRegistry {
    TypeRegistry::builtin().expect("builtin registry")
}

fn options() -> RunOptions {
    RunOptions::default()
        .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .with_seed(11)
}

fn patients() -> DataSource {
    DataSource::new("patients")
        .with_column(ColumnDescriptor::new("id", PrimitiveType::Int, "Identifier"))
        .with_column(ColumnDescriptor::new("name", PrimitiveType::String, "Name"))
        .with_column(ColumnDescriptor::new("age", PrimitiveType::Int, "Age"))
        .with_column(ColumnDescriptor::new("visit", PrimitiveType::Date, "Date"))
        .with_column(ColumnDescriptor::new("zip", PrimitiveType::String, "Zip Code"))
        .with_column(ColumnDescriptor::new("email", PrimitiveType::String, "Email"))
        .with_column(ColumnDescriptor::new("notes", PrimitiveType::String, "Free Text"))
}

const PATIENTS_CSV: &str = "\
id,name,age,visit,zip,email,notes
1,John Smith,28,2020-01-30,10001,john@example.com,John Smith visited on 2020-01-30
2,Mary Jones,95,1999-12-31,02139,,Mary Jones is 95
";

fn run(
    source: &DataSource,
    method: &MethodConfig,
    input: &str,
) -> (Result<String, DeidError>, UnitOfWork, RecordingCatalog) {
    let registry = registry();
    let unit = UnitOfWork::new(&method.id, &source.id);
    let catalog = RecordingCatalog::default();
    let mut output = Vec::new();
    let result = MethodHandler::new(&registry, source, method, 0)
        .with_options(options())
        .run(input.as_bytes(), &mut output, &unit, &catalog)
        .map(|_| String::from_utf8(output).unwrap());
    (result, unit, catalog)
}

#[test]
fn empty_method_passes_the_table_through() {
    let source = DataSource::new("ds")
        .with_column(ColumnDescriptor::new("a", PrimitiveType::String, "Name"))
        .with_column(ColumnDescriptor::new("b", PrimitiveType::Int, "Number"));
    let method = MethodConfig::new("noop");

    let (output, unit, catalog) = run(&source, &method, "a,b\n1,2\n");
    assert_eq!(output.unwrap(), "a,b\n1,2\n");
    assert_eq!(unit.state(), UnitState::Ready);
    assert_eq!(catalog.names(), vec!["ds__noop__0".to_string()]);
}

#[test]
fn quoted_input_stays_quoted() {
    let source = DataSource::new("ds");
    let method = MethodConfig::new("noop");
    let (output, _, _) = run(&source, &method, "\"a\",\"b\"\n\"1\",\"x, y\"\n");
    assert_eq!(output.unwrap(), "\"a\",\"b\"\n\"1\",\"x, y\"\n");
}

#[test]
fn full_method_over_patients() {
    let method = MethodConfig::new("safe")
        .with_rule(
            "name",
            ColumnRule::new(ActionKind::Mask).with_argument("replacement", "[NAME]"),
        )
        .with_rule(
            "age",
            ColumnRule::new(ActionKind::Offset).with_argument("interval", 5),
        )
        .with_rule(
            "visit",
            ColumnRule::new(ActionKind::Offset).with_argument("interval", 5),
        )
        .with_rule("zip", ColumnRule::new(ActionKind::LowerResolution))
        .with_rule("email", ColumnRule::new(ActionKind::Omit))
        .with_rule("notes", ColumnRule::new(ActionKind::FreeTextReplacement));

    let (output, unit, _) = run(&patients(), &method, PATIENTS_CSV);
    let output = output.unwrap();
    insta::assert_snapshot!(output.trim_end(), @r"
    id,name,age,visit,zip,notes
    1,[NAME],33,2020-02-04,100,[NAME] visited on 2020-02-04
    2,[NAME],100,2000-01-05,000,[NAME] is 100
    ");
    assert_eq!(unit.state(), UnitState::Ready);
}

#[test]
fn omitted_values_are_scrubbed_from_free_text() {
    let method = MethodConfig::new("m")
        .with_rule("email", ColumnRule::new(ActionKind::Omit))
        .with_rule("notes", ColumnRule::new(ActionKind::FreeTextReplacement));
    let source = DataSource::new("ds")
        .with_column(ColumnDescriptor::new("email", PrimitiveType::String, "Email"))
        .with_column(ColumnDescriptor::new("notes", PrimitiveType::String, "Free Text"));

    let (output, _, _) = run(
        &source,
        &method,
        "email,notes\njo@example.com,write to jo@example.com\n",
    );
    assert_eq!(
        output.unwrap(),
        "notes\nwrite to redacted@example.com\n"
    );
}

#[test]
fn row_values_do_not_leak_into_later_rows() {
    let method = MethodConfig::new("m")
        .with_rule(
            "name",
            ColumnRule::new(ActionKind::Mask).with_argument("replacement", "X7"),
        )
        .with_rule("notes", ColumnRule::new(ActionKind::FreeTextReplacement));
    let source = DataSource::new("ds")
        .with_column(ColumnDescriptor::new("name", PrimitiveType::String, "Name"))
        .with_column(ColumnDescriptor::new("notes", PrimitiveType::String, "Free Text"));

    let (output, _, _) = run(
        &source,
        &method,
        "name,notes\nJohn,John called\nMary,John called again\n",
    );
    assert_eq!(
        output.unwrap(),
        "name,notes\nX7,X7 called\nX7,John called again\n"
    );
}

fn masked_names() -> (DataSource, MethodConfig) {
    let method = MethodConfig::new("m")
        .with_rule(
            "name",
            ColumnRule::new(ActionKind::Mask).with_argument("replacement", "X7"),
        )
        .with_rule("notes", ColumnRule::new(ActionKind::FreeTextReplacement));
    let source = DataSource::new("ds")
        .with_column(ColumnDescriptor::new("name", PrimitiveType::String, "Name"))
        .with_column(ColumnDescriptor::new("notes", PrimitiveType::String, "Free Text"));
    (source, method)
}

#[test]
fn row_values_with_dotted_capitals_are_replaced() {
    let (source, method) = masked_names();
    let (output, _, _) = run(
        &source,
        &method,
        "name,notes\nİpek,İpek and İPEK called\n",
    );
    assert_eq!(output.unwrap(), "name,notes\nX7,X7 and X7 called\n");
}

#[test]
fn padded_row_values_match_the_bare_word() {
    let (source, method) = masked_names();
    let (output, _, _) = run(&source, &method, "name,notes\n\" John\",hi John\n");
    assert_eq!(output.unwrap(), "name,notes\nX7,hi X7\n");
}

#[test]
fn blank_lines_between_rows_are_kept() {
    let (source, method) = masked_names();
    let (output, unit, _) = run(
        &source,
        &method,
        "name,notes\n\nJohn,John called\n\n\nMary,ok\n",
    );
    assert_eq!(
        output.unwrap(),
        "name,notes\n\nX7,X7 called\n\n\nX7,ok\n"
    );
    assert_eq!(unit.state(), UnitState::Ready);
}

#[test]
fn configured_mapping_wins_over_row_values() {
    let mut mapping = BTreeMap::new();
    mapping.insert("john".to_string(), "[PERSON]".to_string());
    let method = MethodConfig::new("m")
        .with_rule("name", ColumnRule::new(ActionKind::SaltedMask))
        .with_rule(
            "notes",
            ColumnRule::new(ActionKind::FreeTextReplacement).with_argument("mapping", mapping),
        )
        .with_salt("s");
    let source = DataSource::new("ds")
        .with_column(ColumnDescriptor::new("name", PrimitiveType::String, "Name"))
        .with_column(ColumnDescriptor::new("notes", PrimitiveType::String, "Free Text"));

    let (output, _, _) = run(&source, &method, "name,notes\nJohn,JOHN called\n");
    let digest = salted_digest("John", "s");
    assert_eq!(
        output.unwrap(),
        format!("name,notes\n{digest},[PERSON] called\n")
    );
}

#[test]
fn empty_cells_stay_empty() {
    let method = MethodConfig::new("m")
        .with_rule(
            "age",
            ColumnRule::new(ActionKind::Offset).with_argument("interval", 5),
        )
        .with_rule("name", ColumnRule::new(ActionKind::SaltedMask));
    let (output, _, _) = run(
        &patients(),
        &method,
        "id,name,age\n1,,\n",
    );
    assert_eq!(output.unwrap(), "id,name,age\n1,,\n");
}

#[test]
fn validation_fails_before_reading_input() {
    let registry = registry();
    let source = patients();
    let method = MethodConfig::new("m").with_rule(
        "name",
        ColumnRule::new(ActionKind::Offset).with_argument("interval", 1),
    );
    let unit = UnitOfWork::new("m", "patients");
    let catalog = RecordingCatalog::default();

    let err = MethodHandler::new(&registry, &source, &method, 0)
        .with_options(options())
        .run(UntouchedReader, io::sink(), &unit, &catalog)
        .unwrap_err();

    assert!(matches!(
        err,
        DeidError::Validation(ValidationError::Type { .. })
    ));
    assert_eq!(unit.state(), UnitState::Error);
    assert!(catalog.names().is_empty());
}

#[test]
fn bad_cell_marks_the_unit_failed() {
    let method = MethodConfig::new("m").with_rule(
        "visit",
        ColumnRule::new(ActionKind::Offset).with_argument("interval", 1),
    );
    let (output, unit, catalog) = run(
        &patients(),
        &method,
        "id,visit\n1,2020-01-01\n2,someday\n",
    );
    match output.unwrap_err() {
        DeidError::Transform { column, row, .. } => {
            assert_eq!(column, "visit");
            assert_eq!(row, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(unit.state(), UnitState::Error);
    assert!(catalog.names().is_empty());
}

#[test]
fn configured_column_missing_from_header_fails() {
    let method = MethodConfig::new("m").with_rule("zip", ColumnRule::new(ActionKind::Omit));
    let (output, unit, _) = run(&patients(), &method, "id,name\n1,a\n");
    assert!(matches!(
        output.unwrap_err(),
        DeidError::UnknownHeaderColumn { column } if column == "zip"
    ));
    assert_eq!(unit.state(), UnitState::Error);
}

#[test]
fn ragged_rows_are_reported_with_their_row() {
    let method = MethodConfig::new("m");
    let (output, _, _) = run(&patients(), &method, "id,name\n1,a\n2\n");
    assert!(matches!(
        output.unwrap_err(),
        DeidError::Csv { row: 2, .. }
    ));
}

#[test]
fn empty_input_has_no_header() {
    let (output, unit, _) = run(&patients(), &MethodConfig::new("m"), "");
    assert!(matches!(output.unwrap_err(), DeidError::MissingHeader));
    assert_eq!(unit.state(), UnitState::Error);
}

#[test]
fn catalog_failure_leaves_the_unit_ready() {
    let registry = registry();
    let source = patients();
    let method = MethodConfig::new("m");
    let unit = UnitOfWork::new("m", "patients");

    let err = MethodHandler::new(&registry, &source, &method, 0)
        .with_options(options())
        .run("id\n1\n".as_bytes(), io::sink(), &unit, &FailingCatalog)
        .unwrap_err();
    assert!(matches!(err, DeidError::Catalog(_)));
    assert_eq!(unit.state(), UnitState::Ready);
}

#[test]
fn summary_reports_shape() {
    let registry = registry();
    let source = patients();
    let method = MethodConfig::new("m").with_rule("email", ColumnRule::new(ActionKind::Omit));
    let unit = UnitOfWork::new("m", "patients");
    let summary = MethodHandler::new(&registry, &source, &method, 4)
        .with_options(options())
        .run(PATIENTS_CSV.as_bytes(), io::sink(), &unit, &NoopCatalog)
        .unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.columns_in, 7);
    assert_eq!(summary.columns_out, 6);
    assert_eq!(summary.omitted, vec!["email".to_string()]);
    assert_eq!(summary.derived_table.name(), "patients__m__4");
}

#[test]
fn batch_results_follow_job_order() {
    let registry = registry();
    let method = MethodConfig::new("m").with_rule("zip", ColumnRule::new(ActionKind::LowerResolution));
    let catalog = RecordingCatalog::default();

    let inputs = ["id,zip\n1,10001\n", "id,zip\n1,", "id,zip\n1,94110\n2,55612\n"];
    let units: Vec<Arc<UnitOfWork>> = (0..inputs.len())
        .map(|i| Arc::new(UnitOfWork::new("m", format!("ds{i}"))))
        .collect();
    let jobs: Vec<TransformJob> = inputs
        .into_iter()
        .zip(&units)
        .enumerate()
        .map(|(i, (input, unit))| {
            let source = DataSource::new(format!("ds{i}"))
                .with_column(ColumnDescriptor::new("zip", PrimitiveType::String, "Zip Code"));
            TransformJob::new(i, source, input.as_bytes(), io::sink(), Arc::clone(unit))
        })
        .collect();

    let results = BatchRunner::new(&registry, &method, &catalog)
        .with_options(options())
        .with_workers(2)
        .run(jobs)
        .unwrap();

    let rows: Vec<u64> = results.iter().map(|r| r.as_ref().unwrap().rows).collect();
    assert_eq!(rows, vec![1, 1, 2]);
    assert!(units.iter().all(|u| u.state() == UnitState::Ready));

    let mut names = catalog.names();
    names.sort();
    assert_eq!(names, vec!["ds0__m__0", "ds1__m__1", "ds2__m__2"]);
}
