use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// One of the two counter-rotating beams.
///
/// Beam 2 optics are always expressed in the beam-1 direction, so both beams
/// share a common longitudinal axis once they reach an [`OpticsTable`](super::optics::OpticsTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Beam {
    B1,
    B2,
}

impl Beam {
    pub const ALL: [Beam; 2] = [Beam::B1, Beam::B2];

    /// Lowercase suffix used in element and corrector names (`b1`, `b2`).
    pub fn suffix(self) -> &'static str {
        match self {
            Beam::B1 => "b1",
            Beam::B2 => "b2",
        }
    }

    /// Beam 2 is tracked against the beam-1 direction and has to be reversed.
    pub fn is_reversed(self) -> bool {
        matches!(self, Beam::B2)
    }
}

impl fmt::Display for Beam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Beam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b1" | "1" | "beam1" => Ok(Beam::B1),
            "b2" | "2" | "beam2" => Ok(Beam::B2),
            other => Err(format!("unknown beam '{}'", other)),
        }
    }
}

/// Transverse plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Horizontal,
    Vertical,
}

impl Plane {
    /// Single-letter plane tag as it appears in corrector names (`h`, `v`).
    pub fn letter(self) -> char {
        match self {
            Plane::Horizontal => 'h',
            Plane::Vertical => 'v',
        }
    }

    /// Name of the coordinate in this plane (`x`, `y`).
    pub fn axis(self) -> &'static str {
        match self {
            Plane::Horizontal => "x",
            Plane::Vertical => "y",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.axis())
    }
}

impl FromStr for Plane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "x" | "horizontal" => Ok(Plane::Horizontal),
            "v" | "y" | "vertical" => Ok(Plane::Vertical),
            other => Err(format!("unknown plane '{}'", other)),
        }
    }
}

/// A value held once per beam.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeamPair<T> {
    pub b1: T,
    pub b2: T,
}

impl<T> BeamPair<T> {
    pub fn new(b1: T, b2: T) -> Self {
        Self { b1, b2 }
    }

    pub fn get(&self, beam: Beam) -> &T {
        match beam {
            Beam::B1 => &self.b1,
            Beam::B2 => &self.b2,
        }
    }

    pub fn get_mut(&mut self, beam: Beam) -> &mut T {
        match beam {
            Beam::B1 => &mut self.b1,
            Beam::B2 => &mut self.b2,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Beam, T) -> U) -> BeamPair<U> {
        BeamPair {
            b1: f(Beam::B1, self.b1),
            b2: f(Beam::B2, self.b2),
        }
    }

    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(Beam, T) -> Result<U, E>,
    ) -> Result<BeamPair<U>, E> {
        Ok(BeamPair {
            b1: f(Beam::B1, self.b1)?,
            b2: f(Beam::B2, self.b2)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Beam, &T)> {
        [(Beam::B1, &self.b1), (Beam::B2, &self.b2)].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Beam, &mut T)> {
        [(Beam::B1, &mut self.b1), (Beam::B2, &mut self.b2)].into_iter()
    }
}
