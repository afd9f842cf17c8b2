//! Formula translation: raw column formula text to a typed [`Formula`].

use crate::error::{FormulaError, Result};
use crate::expr::FormulaExpr;
use crate::parser::{parse_tokens, tokenize};
use crate::refs::{references_in, ColumnKey, Reference, ReferenceResolver, SheetCatalog};
use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Broad kind of a formula, used for result normalization and to decide
/// whether a formula may be evaluated in row chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaCategory {
    Arithmetic,
    Logical,
    Lookup,
    Aggregate,
    Text,
    Date,
    /// Not produced by keyword classification. Braced formulas keep their
    /// keyword category (Arithmetic when none matches) and are marked by
    /// [`Formula::is_array`] instead.
    Array,
    /// Reserved for host-registered functions; never assigned by the
    /// built-in translator.
    Custom,
}

impl FormulaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic",
            Self::Logical => "logical",
            Self::Lookup => "lookup",
            Self::Aggregate => "aggregate",
            Self::Text => "text",
            Self::Date => "date",
            Self::Array => "array",
            Self::Custom => "custom",
        }
    }

    /// Classify formula text by keyword, in fixed priority order:
    /// Aggregate, Logical, Lookup, Text, Date, falling back to Arithmetic.
    pub fn classify(text: &str) -> Self {
        let upper = text.to_ascii_uppercase();
        keyword_patterns()
            .iter()
            .find(|(_, pattern)| pattern.is_match(&upper))
            .map(|(category, _)| *category)
            .unwrap_or(Self::Arithmetic)
    }

    /// Categories whose functions never look beyond the current row.
    pub fn is_row_wise(&self) -> bool {
        matches!(
            self,
            Self::Arithmetic | Self::Logical | Self::Text | Self::Date
        )
    }
}

impl fmt::Display for FormulaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn keyword_patterns() -> &'static [(FormulaCategory, Regex)] {
    static PATTERNS: OnceLock<Vec<(FormulaCategory, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (FormulaCategory::Aggregate, "SUM|AVERAGE|COUNT|MAX|MIN"),
            (FormulaCategory::Logical, "IF|AND|OR|NOT"),
            (FormulaCategory::Lookup, "VLOOKUP|HLOOKUP|INDEX|MATCH"),
            (FormulaCategory::Text, "CONCATENATE|LEFT|RIGHT|MID"),
            (FormulaCategory::Date, "DATE|EDATE|TODAY"),
        ]
        .into_iter()
        .map(|(category, pattern)| (category, Regex::new(pattern).expect("valid regex")))
        .collect()
    })
}

/// A translated column formula. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Formula text exactly as ingested.
    pub raw: String,
    pub sheet: String,
    pub column: String,
    pub category: FormulaCategory,
    /// Written as `{=...}`.
    pub is_array: bool,
    /// Reference tokens in order of appearance.
    pub dependencies: Vec<Reference>,
    /// Distinct columns those tokens cover.
    pub columns: Vec<ColumnKey>,
    pub expr: FormulaExpr,
}

impl Formula {
    pub fn node_id(&self) -> String {
        format!("{}.{}", self.sheet, self.column)
    }

    /// Dependency tokens as written, e.g. `["A1", "Sheet2!B1:B9"]`.
    pub fn dependency_tokens(&self) -> Vec<String> {
        self.dependencies.iter().map(ToString::to_string).collect()
    }

    /// Node ids of every column this formula reads.
    pub fn dependency_ids(&self) -> Vec<String> {
        self.columns.iter().map(ColumnKey::node_id).collect()
    }

    /// Safe to evaluate independently on contiguous row chunks.
    pub fn is_row_wise(&self) -> bool {
        self.category.is_row_wise() && self.expr.is_row_wise()
    }

    /// Two-dimensional results collapse to one value per row.
    pub fn sums_rows(&self) -> bool {
        self.is_array || self.category == FormulaCategory::Array
    }
}

/// Split off `=` and array braces; returns the body and the array flag.
fn split_formula(raw: &str) -> Result<(&str, bool)> {
    let trimmed = raw.trim();
    let (inner, mut is_array) = match trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        Some(inner) => (inner.trim(), true),
        None => (trimmed, false),
    };
    let mut body = inner
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::malformed(raw, "formula must start with '='"))?
        .trim();
    if let Some(braced) = body.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        body = braced.trim();
        is_array = true;
    }
    if body.is_empty() {
        return Err(FormulaError::malformed(raw, "empty formula"));
    }
    Ok((body, is_array))
}

/// Translates raw formula text against the sheets of one workbook.
#[derive(Debug, Clone, Copy)]
pub struct FormulaTranslator<'a> {
    resolver: ReferenceResolver<'a>,
}

impl<'a> FormulaTranslator<'a> {
    pub fn new(catalog: &'a SheetCatalog) -> Self {
        Self {
            resolver: ReferenceResolver::new(catalog),
        }
    }

    /// Translate the formula shared by `sheet`.`column`.
    pub fn translate(&self, raw: &str, sheet: &str, column: &str) -> Result<Formula> {
        let (body, is_array) = split_formula(raw)?;
        let tokens = tokenize(body).map_err(|e| e.with_formula(raw))?;

        let dependencies = references_in(&tokens);
        let mut columns: IndexSet<ColumnKey> = IndexSet::new();
        for reference in &dependencies {
            columns.extend(self.resolver.resolve(reference, sheet)?);
        }

        let expr = parse_tokens(tokens, body, self.resolver, sheet).map_err(|e| e.with_formula(raw))?;
        let category = FormulaCategory::classify(body);
        debug!(sheet, column, %category, formula = raw, "translated formula");

        Ok(Formula {
            raw: raw.to_string(),
            sheet: sheet.to_string(),
            column: column.to_string(),
            category,
            is_array,
            dependencies,
            columns: columns.into_iter().collect(),
            expr,
        })
    }
}
