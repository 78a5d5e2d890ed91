//! # Core Models Module
//!
//! Per-beam tables that describe the machine as the optics model sees it.
//!
//! ## Overview
//!
//! Every table is an ordered sequence of rows carrying a longitudinal position
//! `s` (metres, along the beam-1 direction) and a lowercased element name.
//! Tables are aligned to the [`optics::OpticsTable`] of their beam by name, and
//! all of them move together when the model changes its reference origin.
//!
//! ## Key Components
//!
//! - [`beam`] - Beam and plane identifiers and the [`beam::BeamPair`] container
//! - [`optics`] - Optical functions, beam sizes, envelopes and distance to nominal
//! - [`aperture`] - Vacuum chamber half-gaps
//! - [`collimator`] - Collimator jaw positions in metres
//! - [`elements`] - Machine components used for drawing
//! - [`bpm`] - Measured beam positions
//! - [`ring`] - Wrapping and re-origin helpers shared by every table

pub mod aperture;
pub mod beam;
pub mod bpm;
pub mod collimator;
pub mod elements;
pub mod optics;
pub mod ring;
