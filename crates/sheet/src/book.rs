use crate::error::{Result, SheetError};
use crate::table::Table;
use crate::worksheet::Worksheet;
use indexmap::IndexMap;
use recalc_formulas::SheetCatalog;

/// Worksheets processed together, in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: IndexMap<String, Worksheet>,
}

impl Workbook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet; names are unique.
    pub fn add_sheet(&mut self, sheet: Worksheet) -> Result<()> {
        if self.sheets.contains_key(sheet.name()) {
            return Err(SheetError::SheetAlreadyExists {
                name: sheet.name().to_string(),
            });
        }
        self.sheets.insert(sheet.name().to_string(), sheet);
        Ok(())
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.get(name)
    }

    pub fn get_sheet(&self, name: &str) -> Result<&Worksheet> {
        self.sheet(name).ok_or_else(|| SheetError::SheetNotFound {
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.sheets.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sheet names and column headers, for reference resolution.
    #[must_use]
    pub fn catalog(&self) -> SheetCatalog {
        self.sheets
            .values()
            .map(|sheet| (sheet.name().to_string(), sheet.column_names()))
            .collect()
    }

    /// Copy of every sheet's data keyed by sheet name.
    #[must_use]
    pub fn tables(&self) -> IndexMap<String, Table> {
        self.sheets
            .iter()
            .map(|(name, sheet)| (name.clone(), sheet.table().clone()))
            .collect()
    }

    /// Formula column names per sheet.
    #[must_use]
    pub fn formula_columns(&self) -> IndexMap<String, Vec<String>> {
        self.sheets
            .iter()
            .map(|(name, sheet)| (name.clone(), sheet.formulas().keys().cloned().collect()))
            .collect()
    }

    /// Same workbook with sheet data swapped for `tables`; sheets missing
    /// from `tables` keep their data.
    #[must_use]
    pub fn with_tables(&self, tables: &IndexMap<String, Table>) -> Self {
        Self {
            sheets: self
                .sheets
                .iter()
                .map(|(name, sheet)| {
                    let sheet = tables
                        .get(name)
                        .map_or_else(|| sheet.clone(), |table| sheet.with_table(table.clone()));
                    (name.clone(), sheet)
                })
                .collect(),
        }
    }
}

impl FromIterator<Worksheet> for Workbook {
    /// Later sheets with a repeated name replace earlier ones.
    fn from_iter<I: IntoIterator<Item = Worksheet>>(iter: I) -> Self {
        Self {
            sheets: iter
                .into_iter()
                .map(|sheet| (sheet.name().to_string(), sheet))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recalc_primitives::CellValue;

    fn sheet(name: &str, columns: &[&str]) -> Worksheet {
        let table = Table::from_columns(columns.iter().map(|c| (*c, vec![CellValue::Int(1)]))).unwrap();
        Worksheet::new(name, table, IndexMap::new()).unwrap()
    }

    #[test]
    fn test_add_and_lookup() {
        let mut book = Workbook::new();
        book.add_sheet(sheet("One", &["A"])).unwrap();
        book.add_sheet(sheet("Two", &["X", "Y"])).unwrap();
        assert!(matches!(
            book.add_sheet(sheet("One", &["B"])),
            Err(SheetError::SheetAlreadyExists { .. })
        ));
        assert_eq!(book.sheet_names(), vec!["One", "Two"]);
        assert!(book.get_sheet("Three").is_err());
    }

    #[test]
    fn test_catalog_lists_headers() {
        let book: Workbook = [sheet("One", &["A"]), sheet("Two", &["X", "Y"])].into_iter().collect();
        let catalog = book.catalog();
        assert_eq!(catalog.columns("Two"), Some(&["X".to_string(), "Y".to_string()][..]));
        assert!(!catalog.contains("Three"));
    }

    #[test]
    fn test_with_tables_replaces_data() {
        let book: Workbook = [sheet("One", &["A"])].into_iter().collect();
        let mut tables = book.tables();
        tables["One"].set_column("A", vec![CellValue::Int(42)]).unwrap();
        let updated = book.with_tables(&tables);
        assert_eq!(
            updated.sheet("One").unwrap().table().column("A").unwrap(),
            &[CellValue::Int(42)]
        );
        assert_eq!(
            book.sheet("One").unwrap().table().column("A").unwrap(),
            &[CellValue::Int(1)]
        );
    }
}
