//! Compare recomputed tables against the values cached in the workbook.

use indexmap::IndexMap;
use recalc_primitives::CellValue;
use recalc_sheet::Table;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use tracing::{debug, warn};

/// Outcome of a validation, ordered from best to worst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Success,
    CompletedWithErrors,
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// No recomputed table for an original sheet.
    MissingSheet,
    /// Shapes or column names differ.
    StructuralMismatch,
    /// A cell is blank on one side only.
    NullPattern,
    /// Numeric difference above the tolerance.
    ToleranceExceeded,
    /// A recomputed value is not numeric where the original is.
    NonNumeric,
}

impl IssueKind {
    /// Sheet status implied by an issue of this kind.
    pub fn status(&self) -> ValidationStatus {
        match self {
            Self::MissingSheet | Self::StructuralMismatch | Self::ToleranceExceeded => {
                ValidationStatus::Failed
            }
            Self::NullPattern | Self::NonNumeric => ValidationStatus::CompletedWithErrors,
        }
    }

    fn is_warning(&self) -> bool {
        matches!(self, Self::NonNumeric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

/// Error statistics over compared numeric cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub max_abs_error: f64,
    pub mean_abs_error: f64,
    pub pct_within_tolerance: f64,
    /// Number of cell pairs compared.
    pub compared: usize,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            max_abs_error: 0.0,
            mean_abs_error: 0.0,
            pct_within_tolerance: 100.0,
            compared: 0,
        }
    }
}

impl Metrics {
    fn from_diffs(diffs: &[f64], tolerance: f64) -> Self {
        if diffs.is_empty() {
            return Self::default();
        }
        let within = diffs.iter().filter(|d| **d <= tolerance).count();
        Self {
            max_abs_error: diffs.iter().copied().fold(0.0, f64::max),
            mean_abs_error: diffs.iter().sum::<f64>() / diffs.len() as f64,
            pct_within_tolerance: within as f64 / diffs.len() as f64 * 100.0,
            compared: diffs.len(),
        }
    }

    /// Max of maxima, mean of means and mean of percentages over the
    /// entries that compared anything.
    fn combine<'a>(all: impl IntoIterator<Item = &'a Metrics>) -> Self {
        let used: Vec<&Metrics> = all.into_iter().filter(|m| m.compared > 0).collect();
        if used.is_empty() {
            return Self::default();
        }
        let n = used.len() as f64;
        Self {
            max_abs_error: used.iter().map(|m| m.max_abs_error).fold(0.0, f64::max),
            mean_abs_error: used.iter().map(|m| m.mean_abs_error).sum::<f64>() / n,
            pct_within_tolerance: used.iter().map(|m| m.pct_within_tolerance).sum::<f64>() / n,
            compared: used.iter().map(|m| m.compared).sum(),
        }
    }
}

/// Validation result for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub status: ValidationStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub issues: Vec<ValidationIssue>,
    pub metrics: Metrics,
    /// Metrics per compared column.
    pub columns: IndexMap<String, Metrics>,
}

impl SheetReport {
    fn new(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, kind: IssueKind, column: Option<&str>, message: String) {
        warn!(sheet = %self.sheet, kind = ?kind, "{message}");
        self.status = self.status.max(kind.status());
        if kind.is_warning() {
            self.warnings.push(message.clone());
        } else {
            self.errors.push(message.clone());
        }
        self.issues.push(ValidationIssue {
            kind,
            column: column.map(str::to_string),
            message,
        });
    }
}

/// Validation result for a whole workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub tolerance: f64,
    pub metrics: Metrics,
    pub sheets: IndexMap<String, SheetReport>,
}

impl ValidationReport {
    pub fn is_success(&self) -> bool {
        self.status == ValidationStatus::Success
    }

    /// Every error, prefixed with its sheet name.
    pub fn errors(&self) -> Vec<String> {
        self.sheets
            .values()
            .flat_map(|sheet| sheet.errors.iter().map(move |e| format!("{}: {e}", sheet.sheet)))
            .collect()
    }

    /// Every error followed by every warning, prefixed with the sheet name.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = self.errors();
        messages.extend(self.sheets.values().flat_map(|sheet| {
            sheet.warnings.iter().map(move |w| format!("{}: {w}", sheet.sheet))
        }));
        messages
    }

    /// Human-readable report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Validation Report")?;
        writeln!(out, "=================")?;
        writeln!(out, "Status: {}", self.status)?;
        writeln!(out, "Tolerance: {:e}", self.tolerance)?;
        write_metrics(out, "", &self.metrics)?;
        for sheet in self.sheets.values() {
            writeln!(out)?;
            writeln!(out, "Sheet: {} [{}]", sheet.sheet, sheet.status)?;
            write_metrics(out, "  ", &sheet.metrics)?;
            if !sheet.errors.is_empty() {
                writeln!(out, "  Errors:")?;
                for error in &sheet.errors {
                    writeln!(out, "    - {error}")?;
                }
            }
            if !sheet.warnings.is_empty() {
                writeln!(out, "  Warnings:")?;
                for warning in &sheet.warnings {
                    writeln!(out, "    - {warning}")?;
                }
            }
        }
        Ok(())
    }
}

fn write_metrics(out: &mut String, indent: &str, metrics: &Metrics) -> fmt::Result {
    writeln!(out, "{indent}Compared values: {}", metrics.compared)?;
    writeln!(out, "{indent}Max absolute error: {:e}", metrics.max_abs_error)?;
    writeln!(out, "{indent}Mean absolute error: {:e}", metrics.mean_abs_error)?;
    writeln!(out, "{indent}Within tolerance: {:.2}%", metrics.pct_within_tolerance)
}

/// True when a column holds at least one number and nothing else besides
/// blanks and error values.
fn is_numeric_column(values: &[CellValue]) -> bool {
    let mut seen = false;
    for value in values {
        match value {
            CellValue::Int(_) | CellValue::Float(_) => seen = true,
            CellValue::Null | CellValue::Error(_) => {}
            _ => return false,
        }
    }
    seen
}

/// Compares original and recomputed tables with an absolute tolerance.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    tolerance: f64,
}

impl Validator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Validate every original sheet. With `formula_columns`, numeric
    /// comparison is limited to each sheet's formula columns.
    pub fn validate(
        &self,
        original: &IndexMap<String, Table>,
        processed: &IndexMap<String, Table>,
        formula_columns: Option<&IndexMap<String, Vec<String>>>,
    ) -> ValidationReport {
        let sheets: IndexMap<String, SheetReport> = original
            .iter()
            .map(|(name, table)| {
                let only = formula_columns.map(|map| map.get(name).map_or(&[][..], Vec::as_slice));
                let report = self.validate_sheet(name, table, processed.get(name), only);
                (name.clone(), report)
            })
            .collect();

        let status = sheets.values().map(|s| s.status).max().unwrap_or_default();
        let metrics = Metrics::combine(sheets.values().map(|s| &s.metrics));
        debug!(%status, sheets = sheets.len(), "validation finished");
        ValidationReport {
            status,
            tolerance: self.tolerance,
            metrics,
            sheets,
        }
    }

    fn validate_sheet(
        &self,
        name: &str,
        original: &Table,
        processed: Option<&Table>,
        only: Option<&[String]>,
    ) -> SheetReport {
        let mut report = SheetReport::new(name);
        let Some(processed) = processed else {
            report.record(
                IssueKind::MissingSheet,
                None,
                format!("Missing processed data for sheet {name}"),
            );
            return report;
        };
        if !check_structure(original, processed, &mut report) {
            return report;
        }

        for (column, values) in original.columns() {
            let Some(recomputed) = processed.column(column) else {
                continue;
            };
            check_nulls(column, values, recomputed, &mut report);
        }

        let mut pooled = Vec::new();
        for (column, values) in original.columns() {
            if only.is_some_and(|cols| !cols.iter().any(|c| c == column)) {
                continue;
            }
            let Some(recomputed) = processed.column(column) else {
                continue;
            };
            if !is_numeric_column(values) {
                continue;
            }
            let diffs = self.compare_column(column, values, recomputed, &mut report);
            report
                .columns
                .insert(column.to_string(), Metrics::from_diffs(&diffs, self.tolerance));
            pooled.extend(diffs);
        }
        report.metrics = Metrics::from_diffs(&pooled, self.tolerance);
        report
    }

    /// Absolute differences over positions where both sides are numbers.
    fn compare_column(
        &self,
        column: &str,
        original: &[CellValue],
        processed: &[CellValue],
        report: &mut SheetReport,
    ) -> Vec<f64> {
        let mut diffs = Vec::new();
        let mut non_numeric = 0;
        for (left, right) in original.iter().zip(processed) {
            let Some(expected) = left.as_f64() else {
                continue;
            };
            if right.is_null() {
                continue;
            }
            match right.as_f64() {
                Some(actual) => diffs.push((expected - actual).abs()),
                None => non_numeric += 1,
            }
        }

        if non_numeric > 0 {
            report.record(
                IssueKind::NonNumeric,
                Some(column),
                format!("Non-numeric values in column {column}: {non_numeric} cells"),
            );
        }
        let max = diffs.iter().copied().fold(0.0, f64::max);
        if max > self.tolerance {
            report.record(
                IssueKind::ToleranceExceeded,
                Some(column),
                format!("Value mismatch in column {column}: max diff {max}"),
            );
        }
        diffs
    }
}

fn check_structure(original: &Table, processed: &Table, report: &mut SheetReport) -> bool {
    let original_shape = (original.row_count(), original.column_count());
    let processed_shape = (processed.row_count(), processed.column_count());
    if original_shape != processed_shape {
        report.record(
            IssueKind::StructuralMismatch,
            None,
            format!("Shape mismatch: original {original_shape:?} vs processed {processed_shape:?}"),
        );
        return false;
    }

    let left: BTreeSet<&str> = original.column_names().into_iter().collect();
    let right: BTreeSet<&str> = processed.column_names().into_iter().collect();
    if left != right {
        let missing: Vec<&str> = left.difference(&right).copied().collect();
        let extra: Vec<&str> = right.difference(&left).copied().collect();
        report.record(
            IssueKind::StructuralMismatch,
            None,
            format!("Column mismatch: missing {missing:?}, extra {extra:?}"),
        );
        return false;
    }
    true
}

fn check_nulls(column: &str, original: &[CellValue], processed: &[CellValue], report: &mut SheetReport) {
    let mismatched: Vec<usize> = original
        .iter()
        .zip(processed)
        .enumerate()
        .filter(|(_, (left, right))| left.is_null() != right.is_null())
        .map(|(row, _)| row)
        .collect();
    if let Some(first) = mismatched.first() {
        report.record(
            IssueKind::NullPattern,
            Some(column),
            format!(
                "Null pattern mismatch in column {column}: {} cells differ, first at row {}",
                mismatched.len(),
                first + 2
            ),
        );
    }
}
