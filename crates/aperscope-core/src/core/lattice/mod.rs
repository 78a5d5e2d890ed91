//! # Lattice Module
//!
//! The twiss oracle boundary and a linear thin-element implementation of it.
//!
//! The optics model only talks to a [`handle::LineHandle`]; [`thin::Lattice`]
//! answers twiss and match requests for rings described by a JSON line file,
//! with strengths written as linear expressions of named knobs ([`expr`]).

pub mod expr;
pub mod handle;
pub mod matching;
pub mod thin;
pub mod twiss;
