use crate::core::models::beam::Beam;
use std::fmt;

/// Lifecycle of the optics held by an [`OpticsModel`](super::model::OpticsModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Optics reflect every knob value.
    Fresh,
    /// A knob changed since the last twiss.
    Dirty,
    /// The last twiss failed; the previous optics are still served.
    Faulted,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelState::Fresh => "fresh",
            ModelState::Dirty => "dirty",
            ModelState::Faulted => "faulted",
        })
    }
}

/// One knob write on one line, kept until the next successful twiss.
#[derive(Debug, Clone, PartialEq)]
pub struct KnobChange {
    pub knob: String,
    pub beam: Beam,
    pub old: f64,
    pub new: f64,
}

impl fmt::Display for KnobChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {} -> {}",
            self.knob, self.beam, self.old, self.new
        )
    }
}
