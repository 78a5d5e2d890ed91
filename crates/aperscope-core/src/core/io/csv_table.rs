use super::table::{Cell, ColumnTable};
use super::traits::TableFile;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvTableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
}

/// Comma-separated tables with a header row. Numeric-looking fields become numbers.
pub struct CsvFile;

impl TableFile for CsvFile {
    type Table = ColumnTable;
    type Error = CsvTableError;

    fn read_from(reader: &mut impl BufRead) -> Result<ColumnTable, CsvTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);
        let columns = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut table = ColumnTable::new(columns);
        for record in csv_reader.records() {
            let record = record?;
            table.push_row(
                record
                    .iter()
                    .map(|field| match field.parse::<f64>() {
                        Ok(v) => Cell::Number(v),
                        Err(_) => Cell::Text(field.to_string()),
                    })
                    .collect(),
            );
        }
        Ok(table)
    }
}
