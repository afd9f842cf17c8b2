use crate::error::{Result, SheetError};
use indexmap::IndexMap;
use recalc_primitives::CellValue;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Column-oriented table: ordered named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Vec<CellValue>>,
    rows: usize,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, values)` pairs; every column must have the same length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<CellValue>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<CellValue>) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(SheetError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows or no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Column by position.
    #[must_use]
    pub fn column_at(&self, index: usize) -> Option<(&str, &[CellValue])> {
        self.columns
            .get_index(index)
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[CellValue])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Replace an existing column's values.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) -> Result<()> {
        let rows = self.rows;
        let slot = self
            .columns
            .get_mut(name)
            .ok_or_else(|| SheetError::ColumnNotFound {
                sheet: String::new(),
                name: name.to_string(),
            })?;
        if values.len() != rows {
            return Err(SheetError::LengthMismatch {
                column: name.to_string(),
                expected: rows,
                actual: values.len(),
            });
        }
        *slot = values;
        Ok(())
    }

    /// One row, in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<&CellValue>> {
        (index < self.rows).then(|| self.columns.values().map(|col| &col[index]).collect())
    }

    /// Copy of rows `start..end` (clamped to the table).
    #[must_use]
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.rows);
        let start = start.min(end);
        Self {
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[start..end].to_vec()))
                .collect(),
            rows: end - start,
        }
    }
}

/// Serialises as a list of row objects keyed by column name.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Record<'a>(&'a Table, usize);

        impl Serialize for Record<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.column_count()))?;
                for (name, values) in &self.0.columns {
                    map.serialize_entry(name, &values[self.1])?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows))?;
        for row in 0..self.rows {
            seq.serialize_element(&Record(self, row))?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns([
            ("A", vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)]),
            ("B", vec![CellValue::from("x"), CellValue::Null, CellValue::from("z")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_checks_lengths() {
        let err = Table::from_columns([
            ("A", vec![CellValue::Int(1)]),
            ("B", vec![CellValue::Int(1), CellValue::Int(2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, SheetError::LengthMismatch { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_set_column() {
        let mut table = sample();
        table
            .set_column("A", vec![CellValue::Int(9), CellValue::Int(8), CellValue::Int(7)])
            .unwrap();
        assert_eq!(table.column("A").unwrap()[0], CellValue::Int(9));
        assert!(table.set_column("A", vec![]).is_err());
        assert!(table.set_column("Z", vec![]).is_err());
    }

    #[test]
    fn test_slice_rows() {
        let table = sample();
        let slice = table.slice_rows(1, 10);
        assert_eq!(slice.row_count(), 2);
        assert_eq!(slice.column("A").unwrap(), &[CellValue::Int(2), CellValue::Int(3)]);
        assert_eq!(table.slice_rows(5, 9).row_count(), 0);
    }

    #[test]
    fn test_row_and_empty() {
        let table = sample();
        assert_eq!(table.row(2).unwrap(), vec![&CellValue::Int(3), &CellValue::from("z")]);
        assert!(table.row(3).is_none());
        assert!(Table::new().is_empty());
    }

    #[test]
    fn test_serialize_records() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json[0]["A"], 1);
        assert_eq!(json[1]["B"], serde_json::Value::Null);
        assert_eq!(json.as_array().unwrap().len(), 3);
    }
}
