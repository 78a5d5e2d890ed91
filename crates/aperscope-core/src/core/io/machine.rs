use super::csv_table::{CsvFile, CsvTableError};
use super::table::{ColumnError, ColumnTable};
use super::tfs::{TfsError, TfsFile};
use super::traits::TableFile;
use crate::core::models::aperture::ApertureRow;
use crate::core::models::elements::ElementRow;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableLoadError {
    #[error("File '{path}' not found")]
    NotFound { path: PathBuf },
    #[error("TFS error in '{path}': {source}")]
    Tfs { path: PathBuf, source: TfsError },
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        source: CsvTableError,
    },
    #[error("Schema error in '{path}': {source}")]
    Schema { path: PathBuf, source: ColumnError },
    #[error("Unsupported table extension for '{path}' (expected .tfs or .csv)")]
    UnsupportedExtension { path: PathBuf },
}

fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Reads a `.tfs` or `.csv` table, chosen by file extension.
pub fn read_table(path: &Path) -> Result<ColumnTable, TableLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("tfs") => TfsFile::read_from_path(path).map_err(|source| match source {
            TfsError::Io(ref e) if is_not_found(e) => TableLoadError::NotFound {
                path: path.to_path_buf(),
            },
            source => TableLoadError::Tfs {
                path: path.to_path_buf(),
                source,
            },
        }),
        Some("csv") => CsvFile::read_from_path(path).map_err(|source| match source {
            CsvTableError::Io(ref e) if is_not_found(e) => TableLoadError::NotFound {
                path: path.to_path_buf(),
            },
            source => TableLoadError::Csv {
                path: path.to_path_buf(),
                source,
            },
        }),
        _ => Err(TableLoadError::UnsupportedExtension {
            path: path.to_path_buf(),
        }),
    }
}

/// Path of the beam-2 aperture file that accompanies a beam-1 file.
///
/// Beam 2 apertures are published as `B4` tables, which describe beam 2 in the
/// beam-1 direction. Only the file name is rewritten.
pub fn companion_aperture_path(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };
    let renamed = file_name.replace("B1", "B4").replace("b1", "b4");
    path.with_file_name(renamed)
}

/// Reads raw aperture rows (`S, NAME, APER_1, APER_2` and optionally `APER_3, APER_4`).
pub fn read_aperture(path: &Path) -> Result<Vec<ApertureRow>, TableLoadError> {
    let table = read_table(path)?;
    let schema = |source| TableLoadError::Schema {
        path: path.to_path_buf(),
        source,
    };

    let s = table.number_column("S").map_err(schema)?;
    let names = table.text_column("NAME").map_err(schema)?;
    let aper_1 = table.number_column("APER_1").map_err(schema)?;
    let aper_2 = table.number_column("APER_2").map_err(schema)?;
    let aper_3 = table.optional_number_column("APER_3").map_err(schema)?;
    let aper_4 = table.optional_number_column("APER_4").map_err(schema)?;

    Ok((0..table.len())
        .map(|i| ApertureRow {
            s: s[i],
            name: names[i].clone(),
            aper_1: aper_1[i],
            aper_2: aper_2[i],
            aper_3: aper_3.as_ref().map(|col| col[i]),
            aper_4: aper_4.as_ref().map(|col| col[i]),
        })
        .collect())
}

/// Reads machine components (`S, NAME, KEYWORD, L, K1L`).
pub fn read_elements(path: &Path) -> Result<Vec<ElementRow>, TableLoadError> {
    let table = read_table(path)?;
    let schema = |source| TableLoadError::Schema {
        path: path.to_path_buf(),
        source,
    };

    let s = table.number_column("S").map_err(schema)?;
    let names = table.text_column("NAME").map_err(schema)?;
    let keywords = table.text_column("KEYWORD").map_err(schema)?;
    let lengths = table.number_column("L").map_err(schema)?;
    let k1l = table
        .optional_number_column("K1L")
        .map_err(schema)?
        .unwrap_or_else(|| vec![0.0; table.len()]);

    Ok((0..table.len())
        .map(|i| ElementRow {
            s: s[i],
            name: names[i].clone(),
            keyword: keywords[i].clone(),
            length: lengths[i],
            k1l: k1l[i],
        })
        .collect())
}
