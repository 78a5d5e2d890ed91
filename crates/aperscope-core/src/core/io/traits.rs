use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading tabular machine-description files.
///
/// Implementors handle format-specific parsing and produce a format-neutral
/// table that the loaders in this module turn into typed rows.
pub trait TableFile {
    /// The parsed representation of the file.
    type Table;

    /// The error type for read operations.
    type Error: Error + From<io::Error>;

    /// Reads a table from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Table, Self::Error>;

    /// Reads a table from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Table, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}
