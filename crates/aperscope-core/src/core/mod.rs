//! # Core Module
//!
//! Stateless building blocks of the optics model: per-beam tables, file
//! readers, the twiss oracle and its linear implementation, and the geometry
//! and naming helpers the engine relies on.
//!
//! ## Architecture
//!
//! - **Tables** ([`models`]) - Optics, nominal orbit, aperture, collimators, machine elements and BPMs
//! - **File I/O** ([`io`]) - TFS/CSV tables, JSON line files, YAML collimator databases and measurement snapshots
//! - **Twiss oracle** ([`lattice`]) - The [`lattice::handle::LineHandle`] boundary and a thin-element ring behind it
//! - **Utilities** ([`utils`]) - Aperture shapes, normalised margins and corrector naming conventions
//!
//! Nothing in this module holds mutable state across calls; the
//! [`crate::engine`] layer owns the lines and tables and keeps them coherent.

pub mod io;
pub mod lattice;
pub mod models;
pub mod utils;
