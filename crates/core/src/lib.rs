//! # recalc-core
//!
//! Recomputes the formula columns of a workbook.
//!
//! A [`Session`] translates every column formula, registers the columns of
//! each sheet in a [`DependencyGraph`], evaluates formula columns in
//! dependency order with the [`Engine`] and compares the result with the
//! workbook's cached values using the [`Validator`].
//!
//! ```
//! use recalc_core::{RecalcConfig, Session};
//! use recalc_primitives::CellValue;
//! use recalc_sheet::{Workbook, Worksheet};
//!
//! let sheet = Worksheet::from_grid(
//!     "Sheet1",
//!     vec!["A".into(), "B".into(), "C".into()],
//!     vec![
//!         vec![1.into(), 4.into(), 5.into()],
//!         vec![2.into(), 5.into(), 7.into()],
//!     ],
//!     vec![vec![None, None, Some("=A1+B1".into())]; 2],
//! )
//! .unwrap();
//! let workbook: Workbook = [sheet].into_iter().collect();
//!
//! let outcome = Session::new(RecalcConfig::default()).run(&workbook).unwrap();
//! assert_eq!(
//!     outcome.tables["Sheet1"].column("C").unwrap(),
//!     &[CellValue::Float(5.0), CellValue::Float(7.0)]
//! );
//! assert!(outcome.status == recalc_core::ValidationStatus::Success);
//! ```

pub mod config;
pub mod engine;
mod error;
pub mod eval;
pub mod graph;
pub mod session;
pub mod validator;

pub use config::{LogLevel, ProcessingConfig, RecalcConfig};
pub use engine::{Engine, Processed};
pub use error::{ConfigError, EngineError, GraphError, RecalcError, Result};
pub use graph::{DependencyGraph, GraphIssue, NodeDetails};
pub use session::{AnalysisReport, CrossReference, ProcessingOutcome, Session, SheetSummary};
pub use validator::{IssueKind, Metrics, ValidationReport, ValidationStatus, Validator};
