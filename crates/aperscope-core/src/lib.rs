//! # aperscope Core Library
//!
//! Linear optics, aperture margins and orbit fitting for the two counter-rotating
//! beams of a circular collider.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that file formats, the
//! stateful model and the end-to-end procedures can be tested in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless tables (`OpticsTable`,
//!   `ApertureTable`, `CollimatorTable`), file readers, the thin-element linear
//!   lattice that computes twiss and matches bumps, and chamber geometry.
//!
//! - **[`engine`]: The Logic Core.** The stateful `OpticsModel` with its knob
//!   lifecycle, the bump registry, the bounded least-squares fitter and the
//!   cross-section / n1 calculation.
//!
//! - **[`workflows`]: The Public API.** Opens a configured session and fits
//!   knobs or bump amplitudes against recorded BPM readings.

pub mod core;
pub mod engine;
pub mod workflows;
