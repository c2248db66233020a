use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use deid_model::UnitState;
use deid_types::SemanticType;
use deid_transform::ValidationError;

use deid_cli::pipeline::{RunReport, SourceCheck, UnitReport};

pub fn print_types<'a, I>(types: I)
where
    I: IntoIterator<Item = &'a SemanticType>,
{
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Type"),
        header_cell("Aliases"),
        header_cell("Primitives"),
        header_cell("Actions"),
        header_cell("Fallback"),
    ]);
    apply_table_style(&mut table);
    for ty in types {
        let aliases = if ty.aliases().is_empty() {
            dim_cell("-")
        } else {
            Cell::new(ty.aliases().join(", "))
        };
        let primitives = ty
            .accepted_primitive_types()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let actions = ty
            .accepted_actions()
            .iter()
            .map(|(action, arguments)| match arguments {
                Some(names) if !names.is_empty() => format!(
                    "{action}({})",
                    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
                ),
                _ => action.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(ty.name())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            aliases,
            Cell::new(primitives),
            Cell::new(actions),
            dim_cell(ty.fallback_value()),
        ]);
    }
    println!("{table}");
}

/// Print validation issues; returns the number of issues.
pub fn print_check(method_id: &str, checks: &[SourceCheck]) -> usize {
    println!("Method: {method_id}");
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Data source"),
        header_cell("Column"),
        header_cell("Issue"),
    ]);
    apply_issue_table_style(&mut table);
    let mut total = 0usize;
    for check in checks {
        if check.issues.is_empty() {
            table.add_row(vec![
                source_cell(&check.data_source_id),
                dim_cell("-"),
                Cell::new("ok").fg(Color::Green),
            ]);
            continue;
        }
        for issue in &check.issues {
            total += 1;
            table.add_row(vec![
                source_cell(&check.data_source_id),
                Cell::new(issue.column()),
                issue_cell(issue),
            ]);
        }
    }
    println!("{table}");
    total
}

pub fn print_run(report: &RunReport) {
    println!("Method: {}", report.method_id);
    println!("Output: {}", report.output_dir.display());
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Data source"),
        header_cell("State"),
        header_cell("Rows"),
        header_cell("Columns"),
        header_cell("Omitted"),
        header_cell("Time (ms)"),
        header_cell("Derived table"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);

    let mut total_rows = 0u64;
    for unit in &report.units {
        table.add_row(unit_row(unit, &mut total_rows));
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        state_cell(report.aggregate).add_attribute(Attribute::Bold),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    println!("{table}");

    let failures: Vec<_> = report
        .units
        .iter()
        .filter_map(|unit| unit.error.as_ref().map(|error| (&unit.data_source_id, error)))
        .collect();
    if !failures.is_empty() {
        eprintln!("Errors:");
        for (source, error) in failures {
            eprintln!("- {source}: {error}");
        }
    }
}

fn unit_row(unit: &UnitReport, total_rows: &mut u64) -> Vec<Cell> {
    let Some(summary) = &unit.summary else {
        return vec![
            source_cell(&unit.data_source_id),
            state_cell(unit.state),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
        ];
    };
    *total_rows += summary.rows;
    let omitted = if summary.omitted.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(summary.omitted.join(", "))
    };
    vec![
        source_cell(&unit.data_source_id),
        state_cell(unit.state),
        Cell::new(summary.rows),
        Cell::new(format!("{} -> {}", summary.columns_in, summary.columns_out)),
        omitted,
        Cell::new(summary.elapsed.as_millis()),
        Cell::new(summary.derived_table.name()),
    ]
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn state_cell(state: UnitState) -> Cell {
    match state {
        UnitState::Ready => Cell::new("READY").fg(Color::Green),
        UnitState::Pending => Cell::new("PENDING").fg(Color::Yellow),
        UnitState::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    }
}

fn issue_cell(issue: &ValidationError) -> Cell {
    let message = match issue {
        ValidationError::MissingColumn { .. } => "not in data source".to_string(),
        ValidationError::Type { source, .. } => source.to_string(),
        ValidationError::InvalidArgument {
            action,
            argument,
            message,
            ..
        } => format!("{action}: {argument}: {message}"),
    };
    Cell::new(message).fg(Color::Red)
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn source_cell(id: &str) -> Cell {
    Cell::new(id).fg(Color::Blue).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
