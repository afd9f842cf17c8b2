//! Reference extraction and resolution.
//!
//! A token is either bare ("A1", "A1:B10", "Price") and belongs to the
//! formula's own sheet, or sheet-qualified ("Sheet2!A1", "'My Sheet'!A:B").
//! Formulas are column-wide, so every token resolves to whole columns: the
//! row part of an A1 token is ignored.

use crate::error::{FormulaError, Result};
use crate::parser::{tokenize, Token, TokenKind};
use indexmap::IndexMap;
use recalc_primitives::{column_index_to_letter, column_letter_to_index, sanitize_sheet_name, CellAddress};
use serde::Serialize;
use std::fmt;

/// What a reference token points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    /// Single cell, e.g. `B2`.
    Cell(CellAddress),
    /// Rectangular span, e.g. `A1:C10`.
    Range { start: CellAddress, end: CellAddress },
    /// Whole columns, e.g. `A:C`.
    Columns { start: u32, end: u32 },
    /// Column header name, e.g. `Price`.
    Name(String),
}

/// A reference token found in formula text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Explicit sheet qualifier, quotes stripped.
    pub sheet: Option<String>,
    pub target: RefTarget,
}

impl Reference {
    pub fn local(target: RefTarget) -> Self {
        Self {
            sheet: None,
            target,
        }
    }

    pub fn qualified(sheet: impl Into<String>, target: RefTarget) -> Self {
        Self {
            sheet: Some(sheet.into()),
            target,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.sheet.is_some()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sanitize_sheet_name(sheet))?;
        }
        match &self.target {
            RefTarget::Cell(addr) => write!(f, "{}", addr),
            RefTarget::Range { start, end } => write!(f, "{}:{}", start, end),
            RefTarget::Columns { start, end } => write!(
                f,
                "{}:{}",
                column_index_to_letter(*start),
                column_index_to_letter(*end)
            ),
            RefTarget::Name(name) => f.write_str(name),
        }
    }
}

/// Extract every reference token from formula text.
///
/// A leading `=` and surrounding array braces are ignored. Tokens are
/// returned in order of appearance, duplicates removed.
pub fn extract_references(formula: &str) -> Result<Vec<Reference>> {
    let body = formula.trim();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .unwrap_or(body);
    let body = body.trim_start().strip_prefix('=').unwrap_or(body);
    let tokens = tokenize(body)?;
    Ok(references_in(&tokens))
}

pub(crate) fn references_in(tokens: &[Token]) -> Vec<Reference> {
    let mut found: Vec<Reference> = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        match read_reference(tokens, idx) {
            Some((reference, next)) => {
                if !found.contains(&reference) {
                    found.push(reference);
                }
                idx = next;
            }
            None => idx += 1,
        }
    }
    found
}

fn kind_at(tokens: &[Token], idx: usize) -> Option<&TokenKind> {
    tokens.get(idx).map(|token| &token.kind)
}

/// Try to read one reference starting at `idx`; returns it with the index
/// of the first token after it.
pub(crate) fn read_reference(tokens: &[Token], idx: usize) -> Option<(Reference, usize)> {
    let qualified = matches!(kind_at(tokens, idx + 1), Some(TokenKind::Bang));
    let sheet = match kind_at(tokens, idx)? {
        TokenKind::SheetName(name) if qualified => Some(name.clone()),
        TokenKind::Identifier(name) if qualified => Some(name.clone()),
        TokenKind::SheetName(_) => return None,
        _ => None,
    };
    let start = if sheet.is_some() { idx + 2 } else { idx };
    let (target, next) = read_target(tokens, start)?;
    Some((Reference { sheet, target }, next))
}

fn read_target(tokens: &[Token], idx: usize) -> Option<(RefTarget, usize)> {
    match kind_at(tokens, idx)? {
        TokenKind::CellRef(text) => {
            let start = CellAddress::from_a1(text).ok()?;
            if let (Some(TokenKind::Colon), Some(TokenKind::CellRef(end_text))) =
                (kind_at(tokens, idx + 1), kind_at(tokens, idx + 2))
            {
                let end = CellAddress::from_a1(end_text).ok()?;
                return Some((RefTarget::Range { start, end }, idx + 3));
            }
            Some((RefTarget::Cell(start), idx + 1))
        }
        TokenKind::Identifier(name) => {
            match (kind_at(tokens, idx + 1), kind_at(tokens, idx + 2)) {
                (Some(TokenKind::LParen), _) => return None,
                (Some(TokenKind::Colon), Some(TokenKind::Identifier(end))) => {
                    let start = column_letter_to_index(name).ok()?;
                    let end = column_letter_to_index(end).ok()?;
                    return Some((RefTarget::Columns { start, end }, idx + 3));
                }
                _ => {}
            }
            if name.eq_ignore_ascii_case("TRUE") || name.eq_ignore_ascii_case("FALSE") {
                return None;
            }
            Some((RefTarget::Name(name.clone()), idx + 1))
        }
        _ => None,
    }
}

/// Sheet names and their ordered column headers.
#[derive(Debug, Clone, Default)]
pub struct SheetCatalog {
    sheets: IndexMap<String, Vec<String>>,
}

impl SheetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a sheet's column headers.
    pub fn insert(&mut self, sheet: impl Into<String>, columns: Vec<String>) {
        self.sheets.insert(sheet.into(), columns);
    }

    pub fn contains(&self, sheet: &str) -> bool {
        self.sheets.contains_key(sheet)
    }

    pub fn columns(&self, sheet: &str) -> Option<&[String]> {
        self.sheets.get(sheet).map(Vec::as_slice)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for SheetCatalog {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            sheets: iter.into_iter().collect(),
        }
    }
}

/// A resolved (sheet, column) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnKey {
    pub sheet: String,
    pub index: usize,
    pub name: String,
}

impl ColumnKey {
    /// Dependency-graph node id, `"sheet.column"`.
    pub fn node_id(&self) -> String {
        format!("{}.{}", self.sheet, self.name)
    }
}

/// Resolves reference tokens against a [`SheetCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    catalog: &'a SheetCatalog,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(catalog: &'a SheetCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a SheetCatalog {
        self.catalog
    }

    /// Resolve a token to the columns it covers, in left-to-right order.
    pub fn resolve(&self, reference: &Reference, owning_sheet: &str) -> Result<Vec<ColumnKey>> {
        let sheet = reference.sheet.as_deref().unwrap_or(owning_sheet);
        let columns =
            self.catalog
                .columns(sheet)
                .ok_or_else(|| FormulaError::UnknownSheetReference {
                    sheet: sheet.to_string(),
                    reference: reference.to_string(),
                })?;

        let indices: Vec<usize> = match &reference.target {
            RefTarget::Cell(addr) => vec![addr.col as usize],
            RefTarget::Range { start, end } => span(start.col, end.col),
            RefTarget::Columns { start, end } => span(*start, *end),
            RefTarget::Name(name) => vec![find_column(columns, sheet, name)?],
        };

        indices
            .into_iter()
            .map(|index| {
                let name = columns
                    .get(index)
                    .ok_or_else(|| FormulaError::UnknownColumnReference {
                        sheet: sheet.to_string(),
                        column: column_index_to_letter(index as u32),
                    })?;
                Ok(ColumnKey {
                    sheet: sheet.to_string(),
                    index,
                    name: name.clone(),
                })
            })
            .collect()
    }
}

fn span(a: u32, b: u32) -> Vec<usize> {
    (a.min(b)..=a.max(b)).map(|col| col as usize).collect()
}

/// Header lookup: exact, then case-insensitive, then as column letters.
fn find_column(columns: &[String], sheet: &str, name: &str) -> Result<usize> {
    if let Some(index) = columns.iter().position(|c| c == name) {
        return Ok(index);
    }
    if let Some(index) = columns.iter().position(|c| c.eq_ignore_ascii_case(name)) {
        return Ok(index);
    }
    column_letter_to_index(name)
        .ok()
        .map(|index| index as usize)
        .filter(|index| *index < columns.len())
        .ok_or_else(|| FormulaError::UnknownColumnReference {
            sheet: sheet.to_string(),
            column: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SheetCatalog {
        let mut catalog = SheetCatalog::new();
        catalog.insert("Sheet1", vec!["A".into(), "B".into(), "Total".into()]);
        catalog.insert("My Sheet", vec!["Key".into(), "Value".into()]);
        catalog
    }

    #[test]
    fn test_extract_cell_and_range_tokens() {
        let refs = extract_references("=SUM(A1:A3) + B2 * 2").unwrap();
        let text: Vec<String> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["A1:A3", "B2"]);
        assert!(refs.iter().all(|r| !r.is_qualified()));
    }

    #[test]
    fn test_extract_qualified_tokens() {
        let refs = extract_references("='My Sheet'!A1:B2 + Sheet2!C5").unwrap();
        assert_eq!(refs[0].sheet.as_deref(), Some("My Sheet"));
        assert_eq!(refs[1].sheet.as_deref(), Some("Sheet2"));
        assert_eq!(refs[0].to_string(), "'My Sheet'!A1:B2");
        assert_eq!(refs[1].to_string(), "Sheet2!C5");
    }

    #[test]
    fn test_extract_skips_functions_strings_and_booleans() {
        let refs = extract_references("=IF(Total > 0, \"A1\", TRUE)").unwrap();
        assert_eq!(refs, vec![Reference::local(RefTarget::Name("Total".into()))]);

        let refs = extract_references("=LOG10(A1) + ATAN2 (B2, B2)").unwrap();
        let text: Vec<String> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["A1", "B2"]);
    }

    #[test]
    fn test_extract_deduplicates_and_reads_column_ranges() {
        let refs = extract_references("{=SUM(A:B) + A:B + $A$1 + A1}").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target, RefTarget::Columns { start: 0, end: 1 });
        assert_eq!(refs[1].target, RefTarget::Cell(CellAddress::new(0, 0)));
    }

    #[test]
    fn test_resolve_ranges_to_columns() {
        let catalog = catalog();
        let resolver = ReferenceResolver::new(&catalog);
        let reference = Reference::local(RefTarget::Range {
            start: CellAddress::new(0, 0),
            end: CellAddress::new(9, 2),
        });
        let keys = resolver.resolve(&reference, "Sheet1").unwrap();
        let names: Vec<&str> = keys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "Total"]);
        assert_eq!(keys[2].node_id(), "Sheet1.Total");
    }

    #[test]
    fn test_resolve_names_and_letters() {
        let catalog = catalog();
        let resolver = ReferenceResolver::new(&catalog);
        let by_name = Reference::local(RefTarget::Name("total".into()));
        assert_eq!(resolver.resolve(&by_name, "Sheet1").unwrap()[0].index, 2);

        let by_letter = Reference::qualified("My Sheet", RefTarget::Name("B".into()));
        let key = &resolver.resolve(&by_letter, "Sheet1").unwrap()[0];
        assert_eq!((key.sheet.as_str(), key.name.as_str()), ("My Sheet", "Value"));
    }

    #[test]
    fn test_resolve_failures() {
        let catalog = catalog();
        let resolver = ReferenceResolver::new(&catalog);

        let missing_sheet = Reference::qualified("Nope", RefTarget::Cell(CellAddress::new(0, 0)));
        let err = resolver.resolve(&missing_sheet, "Sheet1").unwrap_err();
        assert!(matches!(err, FormulaError::UnknownSheetReference { ref sheet, .. } if sheet == "Nope"));

        let too_wide = Reference::local(RefTarget::Cell(CellAddress::new(0, 7)));
        let err = resolver.resolve(&too_wide, "Sheet1").unwrap_err();
        assert!(matches!(err, FormulaError::UnknownColumnReference { ref column, .. } if column == "H"));

        let unknown_name = Reference::local(RefTarget::Name("Quantity".into()));
        assert!(resolver.resolve(&unknown_name, "Sheet1").is_err());
    }
}
