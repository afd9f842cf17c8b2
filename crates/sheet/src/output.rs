//! Writers for recomputed tables.

use crate::error::Result;
use crate::table::Table;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One CSV file per sheet.
    #[default]
    Csv,
    /// A single workbook with one worksheet per sheet.
    Xlsx,
    /// A single JSON document keyed by sheet name.
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// File-system safe stem for a sheet name.
pub fn file_stem(sheet: &str) -> String {
    let stem: String = sheet
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "sheet".to_string()
    } else {
        stem
    }
}

/// Write `tables` into `directory` (created if missing). `stem` names the
/// single-file formats; CSV output uses one file per sheet.
pub fn write_tables(
    directory: &Path,
    stem: &str,
    format: OutputFormat,
    tables: &IndexMap<String, Table>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)?;

    let written = match format {
        OutputFormat::Csv => {
            let mut paths = Vec::with_capacity(tables.len());
            for (sheet, table) in tables {
                let path = directory.join(format!("{}.csv", file_stem(sheet)));
                crate::csv::write_table(&path, table)?;
                paths.push(path);
            }
            paths
        }
        OutputFormat::Xlsx => {
            let path = directory.join(format!("{}.xlsx", file_stem(stem)));
            crate::xlsx::write_workbook(&path, tables)?;
            vec![path]
        }
        OutputFormat::Json => {
            let path = directory.join(format!("{}.json", file_stem(stem)));
            let writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(writer, tables)?;
            vec![path]
        }
    };

    info!(format = %format, files = written.len(), directory = %directory.display(), "wrote output");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recalc_primitives::CellValue;
    use tempfile::tempdir;

    fn tables() -> IndexMap<String, Table> {
        let mut tables = IndexMap::new();
        tables.insert(
            "Sheet 1".to_string(),
            Table::from_columns([("A", vec![CellValue::Int(1)])]).unwrap(),
        );
        tables.insert(
            "Totals".to_string(),
            Table::from_columns([("S", vec![CellValue::Float(6.0)])]).unwrap(),
        );
        tables
    }

    #[test]
    fn test_csv_writes_one_file_per_sheet() {
        let dir = tempdir().unwrap();
        let paths = write_tables(dir.path(), "book", OutputFormat::Csv, &tables()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("Sheet_1.csv"));
        let text = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(text, "S\n6\n");
    }

    #[test]
    fn test_json_keyed_by_sheet() {
        let dir = tempdir().unwrap();
        let paths = write_tables(dir.path(), "book", OutputFormat::Json, &tables()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(json["Totals"][0]["S"], 6.0);
        assert_eq!(json["Sheet 1"][0]["A"], 1);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(OutputFormat::default(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Xlsx.to_string(), "xlsx");
        let parsed: OutputFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(parsed, OutputFormat::Json);
    }
}
