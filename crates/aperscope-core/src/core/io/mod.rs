//! # Core I/O Module
//!
//! Readers for every file the optics model consumes.
//!
//! ## Supported Inputs
//!
//! - **TFS / CSV tables** - [`tfs::TfsFile`] and [`csv_table::CsvFile`] read into a
//!   shared [`table::ColumnTable`]; [`machine`] turns those into aperture and
//!   machine-component rows.
//! - **Line files** - JSON lattice descriptions consumed by the linear lattice
//!   ([`line`]).
//! - **Collimator databases** - YAML settings per beam ([`collimator_db`]).
//! - **Measurement snapshots** - JSON extracts of a time-series archive served
//!   through [`timeseries::TimeSeriesSource`].

pub mod collimator_db;
pub mod csv_table;
pub mod line;
pub mod machine;
pub mod table;
pub mod tfs;
pub mod timeseries;
pub mod traits;
