use crate::error::Result;
use crate::table::Table;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a table as CSV with a header row.
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let file = File::create(path)?;
    write_table_to(BufWriter::new(file), table)
}

/// Write a table as CSV to any writer.
pub fn write_table_to<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);

    csv_writer.write_record(table.column_names())?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .map(|(_, values)| values[row].to_string())
            .collect();
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Render a table as a CSV string.
pub fn table_to_string(table: &Table) -> Result<String> {
    let mut buffer = Vec::new();
    write_table_to(&mut buffer, table)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recalc_primitives::{CellValue, ErrorValue};

    #[test]
    fn test_csv_text() {
        let table = Table::from_columns([
            ("A", vec![CellValue::Int(1), CellValue::Float(2.5)]),
            ("B", vec![CellValue::from("x,y"), CellValue::Error(ErrorValue::Div0)]),
            ("C", vec![CellValue::Null, CellValue::Float(3.0)]),
        ])
        .unwrap();
        let text = table_to_string(&table).unwrap();
        assert_eq!(text, "A,B,C\n1,\"x,y\",\n2.5,#DIV/0!,3\n");
    }
}
