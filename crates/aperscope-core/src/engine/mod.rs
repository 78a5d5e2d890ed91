//! # Engine Module
//!
//! Stateful layer of aperscope: the two-beam optics model and everything that
//! mutates or interrogates it.
//!
//! ## Overview
//!
//! An [`model::OpticsModel`] owns one [`LineHandle`](crate::core::lattice::handle::LineHandle)
//! per beam and keeps the optics, nominal orbit, aperture, collimator, element
//! and BPM tables coherent with the knob values and the chosen reference
//! origin. Knob writes only mark the model dirty; any query that feeds a plot
//! or an aperture margin recomputes the optics first.
//!
//! ## Architecture
//!
//! - **Model** ([`model`]) - Twiss, knobs, cycling, local bumps and table loading
//! - **Knobs & State** ([`knobs`], [`state`]) - Current/initial knob values, the Fresh/Dirty/Faulted lifecycle and pending knob changes
//! - **Bumps** ([`bumps`]) - Named corrector sets applied with an amplitude
//! - **Fitter** ([`fitter`]) - Bounded least squares of knobs or bump amplitudes against BPM readings
//! - **Cross-section** ([`cross_section`]) - Envelope and chamber at one element, and the n1 margin
//! - **Plot data** ([`plot`]) - Series consumed by orbit, aperture and collimator plots
//! - **Measurements** ([`measurement`]) - Archive keys and readers for BPM orbits and collimator gaps
//! - **Configuration** ([`config`]) - Model, fit and error-budget settings with validating builders
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - The engine error kinds every operation reports

pub mod bumps;
pub mod config;
pub mod cross_section;
pub mod error;
pub mod fitter;
pub mod knobs;
pub mod measurement;
pub mod model;
pub mod plot;
pub mod progress;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
