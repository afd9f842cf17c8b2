//! Dependency graph over the columns of registered worksheets.

use crate::error::GraphError;
use indexmap::IndexMap;
use recalc_dag::{Dag, DagError};
use recalc_formulas::{ColumnKey, Formula};
use recalc_sheet::Worksheet;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// A problem found by [`DependencyGraph::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    /// Closed path, e.g. `["S.A", "S.B", "S.A"]`.
    Cycle { path: Vec<String> },
    MissingSheet { node: String, sheet: String },
    MissingColumn { node: String, sheet: String, column: String },
    MissingDependency { node: String, dependency: String },
}

impl GraphIssue {
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { path } => write!(f, "Circular dependency: {}", path.join(" -> ")),
            Self::MissingSheet { sheet, .. } => write!(f, "Missing sheet: {sheet}"),
            Self::MissingColumn { sheet, column, .. } => {
                write!(f, "Missing column: {column} in sheet {sheet}")
            }
            Self::MissingDependency { node, dependency } => write!(
                f,
                "Formula in {node} references non-existent dependency: {dependency}"
            ),
        }
    }
}

/// Node details for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDetails {
    pub id: String,
    pub sheet: String,
    pub column: String,
    pub is_formula: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Direct dependencies.
    pub dependencies: Vec<String>,
    /// Direct dependents.
    pub dependents: Vec<String>,
}

#[derive(Debug, Clone)]
struct PendingLink {
    from: String,
    target: ColumnKey,
}

/// Directed graph of `"sheet.column"` nodes. An edge runs from a formula
/// column to each column it reads.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dag: Dag,
    sheets: IndexMap<String, Vec<String>>,
    owners: IndexMap<String, (String, String)>,
    pending: Vec<PendingLink>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dag.is_empty()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dag.contains(id)
    }

    /// Registered sheets, in registration order.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// Add a single node.
    pub fn add_node(&mut self, id: &str, is_formula: bool, formula: Option<&str>) -> Result<(), GraphError> {
        self.dag.add_node(id, is_formula, formula.map(str::to_string))?;
        Ok(())
    }

    /// Add an edge: `from` reads `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.dag.add_dependency(from, to)?;
        Ok(())
    }

    /// Register one node per column of `worksheet`, then link each of its
    /// translated formulas to the distinct columns it reads.
    ///
    /// Links into sheets that are not registered yet are kept and made once
    /// that sheet arrives; anything still unlinked shows up in
    /// [`DependencyGraph::validate`].
    pub fn add_worksheet(&mut self, worksheet: &Worksheet, formulas: &[Formula]) -> Result<(), GraphError> {
        let sheet = worksheet.name();
        if let Some(formula) = formulas.iter().find(|f| f.sheet != sheet) {
            return Err(GraphError::ForeignFormula {
                node: formula.node_id(),
                sheet: sheet.to_string(),
            });
        }

        let columns = worksheet.column_names();
        for column in &columns {
            let id = node_id(sheet, column);
            let formula = worksheet.formula(column);
            self.add_node(&id, formula.is_some(), formula)?;
            self.owners.insert(id, (sheet.to_string(), column.clone()));
        }
        self.sheets.insert(sheet.to_string(), columns);

        let waiting = std::mem::take(&mut self.pending);
        for link in waiting {
            if link.target.sheet == sheet {
                self.link(link.from, link.target)?;
            } else {
                self.pending.push(link);
            }
        }

        for formula in formulas {
            let from = formula.node_id();
            if !self.dag.contains(&from) {
                return Err(DagError::UnknownNode { id: from }.into());
            }
            for target in &formula.columns {
                self.link(from.clone(), target.clone())?;
            }
        }

        debug!(
            sheet,
            nodes = self.dag.len(),
            edges = self.dag.edge_count(),
            pending = self.pending.len(),
            "registered worksheet"
        );
        Ok(())
    }

    fn link(&mut self, from: String, target: ColumnKey) -> Result<(), GraphError> {
        let to = target.node_id();
        if self.dag.contains(&to) {
            self.dag.add_dependency(&from, &to)?;
        } else {
            self.pending.push(PendingLink { from, target });
        }
        Ok(())
    }

    /// Collect cycles, references to unregistered sheets or columns, and
    /// dependencies on nodes that were never added.
    pub fn validate(&self) -> Vec<GraphIssue> {
        let mut issues: Vec<GraphIssue> = self
            .dag
            .find_cycles()
            .into_iter()
            .map(|path| GraphIssue::Cycle { path })
            .collect();

        for link in &self.pending {
            let sheet = &link.target.sheet;
            match self.sheets.get(sheet) {
                None => issues.push(GraphIssue::MissingSheet {
                    node: link.from.clone(),
                    sheet: sheet.clone(),
                }),
                Some(columns) if !columns.contains(&link.target.name) => {
                    issues.push(GraphIssue::MissingColumn {
                        node: link.from.clone(),
                        sheet: sheet.clone(),
                        column: link.target.name.clone(),
                    });
                }
                Some(_) => {}
            }
            issues.push(GraphIssue::MissingDependency {
                node: link.from.clone(),
                dependency: link.target.node_id(),
            });
        }
        issues
    }

    /// Topological order with dependencies first. Fails on the first cycle;
    /// other validation issues are logged and ordering continues.
    pub fn processing_order(&self) -> Result<Vec<String>, GraphError> {
        let issues = self.validate();
        if let Some(GraphIssue::Cycle { path }) = issues.iter().find(|issue| issue.is_cycle()) {
            return Err(DagError::CircularDependency { cycle: path.clone() }.into());
        }
        for issue in &issues {
            warn!(%issue, "dependency graph issue");
        }
        Ok(self.dag.topological_order()?)
    }

    /// Every node `id` transitively reads.
    pub fn dependencies(&self, id: &str) -> Result<Vec<String>, GraphError> {
        Ok(self.dag.dependencies_of(id)?)
    }

    /// Every node that transitively reads `id`.
    pub fn dependents(&self, id: &str) -> Result<Vec<String>, GraphError> {
        Ok(self.dag.dependents_of(id)?)
    }

    pub fn node(&self, id: &str) -> Result<NodeDetails, GraphError> {
        let info = self.dag.node_info(id)?;
        let (sheet, column) = self.owners.get(id).cloned().unwrap_or_default();
        Ok(NodeDetails {
            id: info.id,
            sheet,
            column,
            is_formula: info.is_formula,
            formula: info.formula,
            dependencies: info.dependencies,
            dependents: info.dependents,
        })
    }

    /// Details of every node, in registration order.
    pub fn nodes(&self) -> Vec<NodeDetails> {
        self.dag
            .nodes()
            .filter_map(|node| self.node(&node.id).ok())
            .collect()
    }

    /// Graphviz rendering.
    pub fn to_dot(&self) -> String {
        self.dag.to_dot()
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DependencyGraph with {} nodes and {} dependencies",
            self.dag.len(),
            self.dag.edge_count()
        )
    }
}

fn node_id(sheet: &str, column: &str) -> String {
    format!("{sheet}.{column}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_errors() {
        let mut graph = DependencyGraph::new();
        graph.add_node("S.A", false, None).unwrap();
        assert!(matches!(
            graph.add_node("S.A", false, None),
            Err(GraphError::Dag(DagError::DuplicateNode { .. }))
        ));
        assert!(matches!(
            graph.add_dependency("S.A", "S.B"),
            Err(GraphError::Dag(DagError::UnknownNode { .. }))
        ));
    }

    #[test]
    fn test_cycle_fails_ordering() {
        let mut graph = DependencyGraph::new();
        graph.add_node("A", true, Some("=B")).unwrap();
        graph.add_node("B", true, Some("=A")).unwrap();
        graph.add_dependency("A", "B").unwrap();
        graph.add_dependency("B", "A").unwrap();

        let issues = graph.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].to_string(), "Circular dependency: A -> B -> A");

        let err = graph.processing_order().unwrap_err();
        assert!(err.to_string().contains("A -> B -> A"));
    }

    #[test]
    fn test_display_summary() {
        let mut graph = DependencyGraph::new();
        graph.add_node("S.A", false, None).unwrap();
        graph.add_node("S.B", true, Some("=A*2")).unwrap();
        graph.add_dependency("S.B", "S.A").unwrap();
        assert_eq!(graph.to_string(), "DependencyGraph with 2 nodes and 1 dependencies");
    }
}
