use indexmap::IndexMap;
use recalc_core::{IssueKind, ValidationStatus, Validator};
use recalc_primitives::CellValue;
use recalc_sheet::Table;

fn table(columns: &[(&str, &[f64])]) -> Table {
    Table::from_columns(
        columns
            .iter()
            .map(|(name, values)| (*name, values.iter().map(|v| CellValue::Float(*v)).collect())),
    )
    .expect("table")
}

fn book(sheets: Vec<(&str, Table)>) -> IndexMap<String, Table> {
    sheets.into_iter().map(|(n, t)| (n.to_string(), t)).collect()
}

#[test]
fn identical_tables_are_a_success() {
    let original = book(vec![("S", table(&[("A", &[1.0, 2.0]), ("B", &[3.5, 4.5])]))]);
    let report = Validator::new(1e-10).validate(&original, &original.clone(), None);

    assert_eq!(report.status, ValidationStatus::Success);
    let sheet = &report.sheets["S"];
    for metrics in sheet.columns.values() {
        assert_eq!(metrics.max_abs_error, 0.0);
        assert_eq!(metrics.mean_abs_error, 0.0);
        assert_eq!(metrics.pct_within_tolerance, 100.0);
    }
    assert_eq!(sheet.columns.len(), 2);
    assert!(report.render_text().starts_with("Validation Report"));
}

#[test]
fn difference_above_tolerance_fails_the_sheet() {
    let original = book(vec![("S", table(&[("A", &[1.0, 2.0, 3.0, 4.0])]))]);
    let processed = book(vec![("S", table(&[("A", &[1.0, 2.5, 3.0, 4.0])]))]);
    let report = Validator::new(1e-6).validate(&original, &processed, None);

    assert_eq!(report.status, ValidationStatus::Failed);
    let sheet = &report.sheets["S"];
    assert_eq!(sheet.status, ValidationStatus::Failed);
    assert_eq!(sheet.issues[0].kind, IssueKind::ToleranceExceeded);
    assert_eq!(sheet.issues[0].column.as_deref(), Some("A"));
    assert!(sheet.errors[0].contains("column A"));
    assert_eq!(sheet.metrics.max_abs_error, 0.5);
    assert_eq!(sheet.metrics.pct_within_tolerance, 75.0);
    assert!(report.metrics.pct_within_tolerance < 100.0);
}

#[test]
fn sheets_fail_independently() {
    let original = book(vec![
        ("Missing", table(&[("A", &[1.0])])),
        ("Reshaped", table(&[("A", &[1.0]), ("B", &[2.0])])),
        ("Renamed", table(&[("A", &[1.0])])),
        ("Fine", table(&[("A", &[1.0])])),
    ]);
    let processed = book(vec![
        ("Reshaped", table(&[("A", &[1.0])])),
        ("Renamed", table(&[("Z", &[1.0])])),
        ("Fine", table(&[("A", &[1.0])])),
    ]);
    let report = Validator::new(1e-10).validate(&original, &processed, None);

    assert_eq!(report.sheets["Missing"].issues[0].kind, IssueKind::MissingSheet);
    assert_eq!(report.sheets["Reshaped"].issues[0].kind, IssueKind::StructuralMismatch);
    assert!(report.sheets["Reshaped"].errors[0].starts_with("Shape mismatch"));
    assert!(report.sheets["Renamed"].errors[0].contains("missing [\"A\"]"));
    assert_eq!(report.sheets["Fine"].status, ValidationStatus::Success);
    assert_eq!(report.status, ValidationStatus::Failed);
    assert_eq!(report.errors().len(), 3);
    assert!(report.errors()[0].starts_with("Missing: "));
}

#[test]
fn overall_metrics_combine_sheets() {
    let original = book(vec![
        ("One", table(&[("A", &[1.0, 1.0])])),
        ("Two", table(&[("A", &[1.0, 1.0])])),
    ]);
    let processed = book(vec![
        ("One", table(&[("A", &[1.0, 1.0])])),
        ("Two", table(&[("A", &[1.0, 2.0])])),
    ]);
    let report = Validator::new(0.1).validate(&original, &processed, None);

    assert_eq!(report.metrics.max_abs_error, 1.0);
    assert_eq!(report.metrics.mean_abs_error, 0.25);
    assert_eq!(report.metrics.pct_within_tolerance, 75.0);
    assert_eq!(report.metrics.compared, 4);
}

#[test]
fn report_serialises_to_json() {
    let original = book(vec![("S", table(&[("A", &[1.0])]))]);
    let processed = book(vec![("S", table(&[("A", &[2.0])]))]);
    let report = Validator::new(1e-10).validate(&original, &processed, None);

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["sheets"]["S"]["issues"][0]["kind"], "tolerance_exceeded");
    assert_eq!(json["sheets"]["S"]["columns"]["A"]["max_abs_error"], 1.0);
}
