//! Evaluation engine: recomputes every formula column in dependency order.

use crate::config::ProcessingConfig;
use crate::error::EngineError;
use crate::eval::helpers::{broadcast, first_error};
use crate::eval::{evaluate, EvalContext, Value};
use crate::graph::DependencyGraph;
use indexmap::IndexMap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use recalc_formulas::Formula;
use recalc_primitives::CellValue;
use recalc_sheet::Table;
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of one [`Engine::process`] pass.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Recomputed tables, keyed by sheet name in input order.
    pub tables: IndexMap<String, Table>,
    /// Formula nodes evaluated, in evaluation order.
    pub evaluated: Vec<String>,
}

/// Walks the processing order of a [`DependencyGraph`] and evaluates each
/// formula node over the current state of the tables.
///
/// The graph and formulas are borrowed for the engine's lifetime and never
/// modified; each `process` call works on its own copy of the input.
pub struct Engine<'a> {
    graph: &'a DependencyGraph,
    formulas: HashMap<String, &'a Formula>,
    config: ProcessingConfig,
    pool: Option<ThreadPool>,
}

impl<'a> Engine<'a> {
    /// Build an engine. With `config.parallel` a worker pool of
    /// `max_workers` threads is created up front.
    pub fn new(
        graph: &'a DependencyGraph,
        formulas: &'a IndexMap<String, Vec<Formula>>,
        config: ProcessingConfig,
    ) -> Result<Self, EngineError> {
        let formulas = formulas
            .values()
            .flatten()
            .map(|formula| (formula.node_id(), formula))
            .collect();
        let pool = if config.parallel {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.max_workers)
                .thread_name(|i| format!("recalc-worker-{i}"))
                .build()
                .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            graph,
            formulas,
            config,
            pool,
        })
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Recompute every formula column of `tables`.
    ///
    /// Nodes are evaluated in topological order and each result is written
    /// back before the next node runs, so downstream formulas see
    /// recomputed inputs. The first failure aborts the pass.
    pub fn process(&self, tables: &IndexMap<String, Table>) -> Result<Processed, EngineError> {
        if tables.is_empty() {
            return Err(EngineError::InvalidInput("no tables to process".to_string()));
        }
        for sheet in self.graph.sheet_names() {
            let table = tables.get(sheet).ok_or_else(|| {
                EngineError::InvalidInput(format!("sheet {sheet} is missing from the input"))
            })?;
            if table.is_empty() {
                return Err(EngineError::InvalidInput(format!("sheet {sheet} has no data")));
            }
        }

        let order = self.graph.processing_order()?;
        let mut output = tables.clone();
        let mut evaluated = Vec::new();

        for id in order {
            let Some(formula) = self.formulas.get(&id).copied() else {
                continue;
            };
            let values = self.evaluate_node(formula, &output)?;
            let table = output
                .get_mut(&formula.sheet)
                .ok_or_else(|| EngineError::InvalidInput(format!("sheet {} is missing from the input", formula.sheet)))?;
            table
                .set_column(&formula.column, values)
                .map_err(|e| EngineError::ShapeMismatch {
                    formula: formula.raw.clone(),
                    message: e.to_string(),
                })?;
            debug!(node = %id, category = %formula.category, "evaluated formula");
            evaluated.push(id);
        }

        info!(
            formulas = evaluated.len(),
            sheets = output.len(),
            parallel = self.is_parallel(),
            "recalculation complete"
        );
        Ok(Processed {
            tables: output,
            evaluated,
        })
    }

    fn evaluate_node(
        &self,
        formula: &Formula,
        tables: &IndexMap<String, Table>,
    ) -> Result<Vec<CellValue>, EngineError> {
        let current = tables.get(&formula.sheet).ok_or_else(|| {
            EngineError::InvalidInput(format!("sheet {} is missing from the input", formula.sheet))
        })?;
        match &self.pool {
            Some(pool) if formula.is_row_wise() && current.row_count() > self.config.chunk_size => {
                self.evaluate_chunked(pool, formula, tables, current)
            }
            _ => evaluate_rows(formula, tables, current),
        }
    }

    /// Evaluate contiguous row chunks on the pool and concatenate the
    /// results in row order. Only used for row-wise formulas.
    fn evaluate_chunked(
        &self,
        pool: &ThreadPool,
        formula: &Formula,
        tables: &IndexMap<String, Table>,
        current: &Table,
    ) -> Result<Vec<CellValue>, EngineError> {
        let size = self.config.chunk_size;
        let chunks: Vec<Table> = (0..current.row_count())
            .step_by(size)
            .map(|start| current.slice_rows(start, start + size))
            .collect();
        debug!(node = %formula.node_id(), chunks = chunks.len(), "evaluating in chunks");

        let parts = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| evaluate_rows(formula, tables, chunk))
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(parts.concat())
    }
}

/// Evaluate `formula` over every row of `current`.
fn evaluate_rows(
    formula: &Formula,
    tables: &IndexMap<String, Table>,
    current: &Table,
) -> Result<Vec<CellValue>, EngineError> {
    let ctx = EvalContext::new(tables, &formula.sheet, current);
    let value = evaluate(&formula.expr, &ctx).map_err(|e| EngineError::Evaluation {
        formula: formula.raw.clone(),
        message: e.to_string(),
    })?;
    normalize(formula, value, current.row_count())
}

fn shape_mismatch(formula: &Formula, message: impl Into<String>) -> EngineError {
    EngineError::ShapeMismatch {
        formula: formula.raw.clone(),
        message: message.into(),
    }
}

/// Pad with blanks or truncate to exactly `rows` values.
fn fit(mut values: Vec<CellValue>, rows: usize) -> Vec<CellValue> {
    values.resize(rows, CellValue::Null);
    values
}

/// Repeat a single value, otherwise [`fit`].
fn align(values: Vec<CellValue>, rows: usize) -> Vec<CellValue> {
    match values.as_slice() {
        [single] => vec![single.clone(); rows],
        _ => fit(values, rows),
    }
}

/// Sum each row of a computed array; an error anywhere in the row wins.
fn sum_rows(rows: Vec<Vec<CellValue>>) -> Vec<CellValue> {
    rows.into_iter()
        .map(|row| match first_error(&row) {
            Some(e) => CellValue::Error(e),
            None => CellValue::number(row.iter().filter_map(CellValue::as_f64).sum()),
        })
        .collect()
}

/// Turn an evaluation result into exactly one value per row.
fn normalize(formula: &Formula, value: Value, rows: usize) -> Result<Vec<CellValue>, EngineError> {
    if let Some(spread) = broadcast(&value, rows) {
        return Ok(spread);
    }
    match value {
        Value::Scalar(cell) => Ok(vec![cell; rows]),
        Value::Column(values) => Ok(fit(values, rows)),
        Value::Table(mut columns) => {
            if columns.len() != 1 {
                return Err(shape_mismatch(formula, "formula resulted in multiple columns"));
            }
            Ok(align(columns.remove(0), rows))
        }
        Value::Matrix(data) if formula.sums_rows() => {
            Ok(align(sum_rows(data), rows))
        }
        Value::Matrix(data) => {
            let flat: Vec<CellValue> = data.into_iter().flatten().collect();
            if flat.len() == rows || flat.len() == 1 {
                Ok(align(flat, rows))
            } else {
                Err(shape_mismatch(
                    formula,
                    format!("result has {} values for {} rows", flat.len(), rows),
                ))
            }
        }
    }
}
