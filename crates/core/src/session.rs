//! Session orchestration: translate, build the graph, evaluate, validate.

use crate::config::RecalcConfig;
use crate::engine::Engine;
use crate::error::{GraphError, RecalcError, Result};
use crate::graph::{DependencyGraph, GraphIssue};
use crate::validator::{ValidationReport, ValidationStatus, Validator};
use indexmap::IndexMap;
use recalc_formulas::{Formula, FormulaCategory, FormulaTranslator};
use recalc_sheet::{Table, Workbook, Worksheet};
use serde::Serialize;
use tracing::{info, warn};

/// Result of [`Session::run`].
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    /// Recomputed tables, keyed by sheet name.
    pub tables: IndexMap<String, Table>,
    /// Formula nodes evaluated, in order.
    pub evaluated: Vec<String>,
    /// Present when validation is enabled.
    pub report: Option<ValidationReport>,
    pub status: ValidationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaSummary {
    pub formula: String,
    pub category: FormulaCategory,
    pub is_array: bool,
    /// Reference tokens as written.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSummary {
    pub input_columns: Vec<String>,
    pub formula_columns: IndexMap<String, FormulaSummary>,
    pub row_count: usize,
    pub column_count: usize,
}

/// Formula column that reads other sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReference {
    pub from_sheet: String,
    pub from_column: String,
    pub references: Vec<String>,
}

/// Structure of a workbook as seen by the recalculation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub sheets: IndexMap<String, SheetSummary>,
    pub cross_references: Vec<CrossReference>,
    /// Empty when the graph has a cycle.
    pub processing_order: Vec<String>,
    pub issues: Vec<GraphIssue>,
}

/// One recalculation session. Translated formulas are cached per sheet
/// and reused while the sheet's formula text is unchanged.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: RecalcConfig,
    formulas: IndexMap<String, Vec<Formula>>,
}

impl Session {
    pub fn new(config: RecalcConfig) -> Self {
        Self {
            config,
            formulas: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &RecalcConfig {
        &self.config
    }

    /// Translate every formula column of `workbook`.
    pub fn translate(&mut self, workbook: &Workbook) -> Result<&IndexMap<String, Vec<Formula>>> {
        let catalog = workbook.catalog();
        let translator = FormulaTranslator::new(&catalog);
        self.formulas.retain(|sheet, _| workbook.sheet(sheet).is_some());

        for worksheet in workbook.sheets() {
            if self
                .formulas
                .get(worksheet.name())
                .is_some_and(|cached| is_current(cached, worksheet))
            {
                continue;
            }
            let translated = worksheet
                .formulas()
                .iter()
                .map(|(column, raw)| translator.translate(raw, worksheet.name(), column))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            self.formulas.insert(worksheet.name().to_string(), translated);
        }
        Ok(&self.formulas)
    }

    /// Translate and build the dependency graph of `workbook`.
    pub fn build_graph(&mut self, workbook: &Workbook) -> Result<DependencyGraph> {
        self.translate(workbook)?;
        Ok(graph_for(workbook, &self.formulas)?)
    }

    /// Recompute every formula column and, when enabled, validate the
    /// result against the workbook's cached values.
    pub fn run(&mut self, workbook: &Workbook) -> Result<ProcessingOutcome> {
        info!(sheets = workbook.len(), "starting recalculation");
        let graph = self.build_graph(workbook)?;
        let engine = Engine::new(&graph, &self.formulas, self.config.processing.clone())?;
        let original = workbook.tables();
        let processed = engine.process(&original)?;

        let report = self.config.validation.enabled.then(|| {
            Validator::new(self.config.validation.tolerance).validate(
                &original,
                &processed.tables,
                Some(&workbook.formula_columns()),
            )
        });

        let status = match &report {
            None => ValidationStatus::Success,
            Some(report) if report.status.is_failed() => {
                if self.config.validation.abort_on_failure {
                    return Err(RecalcError::ValidationFailed {
                        errors: report.errors(),
                    });
                }
                warn!("validation failed; continuing");
                ValidationStatus::CompletedWithErrors
            }
            Some(report) => report.status,
        };

        info!(
            %status,
            formulas = processed.evaluated.len(),
            "recalculation finished"
        );
        Ok(ProcessingOutcome {
            tables: processed.tables,
            evaluated: processed.evaluated,
            report,
            status,
        })
    }

    /// Describe sheets, formulas, cross-sheet references and the
    /// processing order without evaluating anything.
    pub fn analyze(&mut self, workbook: &Workbook) -> Result<AnalysisReport> {
        let graph = self.build_graph(workbook)?;
        let issues = graph.validate();
        let processing_order = match graph.processing_order() {
            Ok(order) => order,
            Err(GraphError::Dag(e)) => {
                warn!(error = %e, "no processing order");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut sheets = IndexMap::new();
        let mut cross_references = Vec::new();
        for worksheet in workbook.sheets() {
            let formulas = self.formulas.get(worksheet.name()).map_or(&[][..], Vec::as_slice);
            let mut formula_columns = IndexMap::new();
            for formula in formulas {
                formula_columns.insert(
                    formula.column.clone(),
                    FormulaSummary {
                        formula: formula.raw.clone(),
                        category: formula.category,
                        is_array: formula.is_array,
                        dependencies: formula.dependency_tokens(),
                    },
                );
                let references: Vec<String> = formula
                    .dependencies
                    .iter()
                    .filter(|r| r.sheet.as_deref().is_some_and(|s| s != formula.sheet))
                    .map(ToString::to_string)
                    .collect();
                if !references.is_empty() {
                    cross_references.push(CrossReference {
                        from_sheet: formula.sheet.clone(),
                        from_column: formula.column.clone(),
                        references,
                    });
                }
            }
            sheets.insert(
                worksheet.name().to_string(),
                SheetSummary {
                    input_columns: worksheet.input_columns().to_vec(),
                    formula_columns,
                    row_count: worksheet.row_count(),
                    column_count: worksheet.table().column_count(),
                },
            );
        }

        Ok(AnalysisReport {
            sheets,
            cross_references,
            processing_order,
            issues,
        })
    }
}

fn is_current(cached: &[Formula], worksheet: &Worksheet) -> bool {
    cached.len() == worksheet.formulas().len()
        && cached
            .iter()
            .all(|f| worksheet.formula(&f.column) == Some(f.raw.as_str()))
}

fn graph_for(
    workbook: &Workbook,
    formulas: &IndexMap<String, Vec<Formula>>,
) -> std::result::Result<DependencyGraph, GraphError> {
    let mut graph = DependencyGraph::new();
    for worksheet in workbook.sheets() {
        let sheet_formulas = formulas.get(worksheet.name()).map_or(&[][..], Vec::as_slice);
        graph.add_worksheet(worksheet, sheet_formulas)?;
    }
    Ok(graph)
}
