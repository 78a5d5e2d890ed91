//! # Workflows Module
//!
//! High-level entry points that take a validated configuration and drive the
//! engine from input files to a ready model or a finished fit.
//!
//! ## Overview
//!
//! Front-ends (the command line, notebooks, a future GUI) should not have to
//! know in which order lines, tables, knob overrides and the reference origin
//! are applied. Each workflow performs its phases in a fixed order, reports
//! them through a [`ProgressReporter`](crate::engine::progress::ProgressReporter)
//! and returns the engine error of the first phase that fails.
//!
//! ## Architecture
//!
//! - **Session Workflow** ([`session`]) - Opens both beam lines, applies knob
//!   overrides, loads the machine tables and cycles to the configured anchor.
//! - **Fit Workflow** ([`fit`]) - Loads a BPM snapshot at a point in time and
//!   fits a knob or a set of bump amplitudes to it.

pub mod fit;
pub mod session;
