use super::traits::ArtifactFile;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {row}: column '{column}' holds '{value}', which is not a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Row {row} has {found} values, the header names {expected} columns")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Per-hit (or per-particle) records with named numeric columns, stored column-wise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitTable {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl HitTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let values = vec![Vec::new(); columns.len()];
        Self { columns, values }
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowLength {
                row: self.len() + 1,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        for (column, &v) in self.values.iter_mut().zip(row) {
            column.push(v);
        }
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }
}

/// CSV encoding of a [`HitTable`]: one header row, then one row per hit.
///
/// Lines starting with `#` are comments; surrounding whitespace is trimmed.
pub struct HitTableFile;

impl ArtifactFile for HitTableFile {
    type Artifact = HitTable;
    type Error = TableError;

    fn read_from(reader: &mut impl BufRead) -> Result<HitTable, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut table = HitTable::new(headers.iter());
        let mut row = Vec::with_capacity(headers.len());

        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(TableError::RowLength {
                    row: index + 1,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            row.clear();
            for (field, column) in record.iter().zip(headers.iter()) {
                let v: f64 = field.parse().map_err(|_| TableError::InvalidNumber {
                    row: index + 1,
                    column: column.to_string(),
                    value: field.to_string(),
                })?;
                row.push(v);
            }
            table.push_row(&row)?;
        }
        Ok(table)
    }

    fn write_to(table: &HitTable, writer: &mut impl Write) -> Result<(), TableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(table.column_names())?;
        for i in 0..table.len() {
            csv_writer.write_record(table.values.iter().map(|c| c[i].to_string()))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_named_columns() {
        let csv = "# phase space\nKineticEnergy, Weight\n1.5, 1\n0.25, 0.5\n";
        let table = HitTableFile::read_from(&mut Cursor::new(csv)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("KineticEnergy"), Some(&[1.5, 0.25][..]));
        assert!(table.column("PDGCode").is_none());
    }

    #[test]
    fn non_numeric_cell_names_row_and_column() {
        let csv = "a,b\n1,2\n3,x\n";
        let err = HitTableFile::read_from(&mut Cursor::new(csv)).unwrap_err();
        match err {
            TableError::InvalidNumber { row, column, value } => {
                assert_eq!((row, column.as_str(), value.as_str()), (2, "b", "x"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_rows_are_rejected() {
        let err = HitTableFile::read_from(&mut Cursor::new("a,b\n1\n")).unwrap_err();
        assert!(matches!(err, TableError::RowLength { row: 1, expected: 2, found: 1 }));
    }

    #[test]
    fn table_survives_a_file_round_trip() {
        let mut table = HitTable::new(["x", "y"]);
        table.push_row(&[1.0, -2.5]).unwrap();
        table.push_row(&[3.0, 1e-7]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.csv");
        HitTableFile::write_to_path(&table, &path).unwrap();
        assert_eq!(HitTableFile::read_from_path(&path).unwrap(), table);
    }
}
