use super::error::EngineError;
use super::model::OpticsModel;
use crate::core::lattice::handle::LineHandle;
use crate::core::models::beam::{Beam, Plane};
use crate::core::models::elements::ElementShape;

/// Orbit and envelope along the ring in one plane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub s: Vec<f64>,
    pub name: Vec<String>,
    pub orbit: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    /// `NaN` where the element has no nominal counterpart.
    pub nominal: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureProfile {
    pub s: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Jaw {
    pub name: String,
    pub s: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpmPoint {
    pub name: String,
    pub s: f64,
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnobReading {
    pub name: String,
    pub current: f64,
    pub initial: f64,
}

impl<L: LineHandle> OpticsModel<L> {
    pub fn trajectory(&mut self, beam: Beam, plane: Plane) -> Result<Trajectory, EngineError> {
        self.ensure_fresh()?;
        let nominal = self.nominal(beam);
        let mut out = Trajectory::default();
        for row in self.snapshot(beam).rows() {
            let (lower, upper) = row.envelope(plane);
            out.s.push(row.s);
            out.name.push(row.name.clone());
            out.orbit.push(row.orbit(plane));
            out.upper.push(upper);
            out.lower.push(lower);
            out.nominal.push(nominal.get(&row.name).map_or(f64::NAN, |n| match plane {
                Plane::Horizontal => n.x,
                Plane::Vertical => n.y,
            }));
        }
        Ok(out)
    }

    /// Chamber walls along the ring; empty until an aperture is loaded.
    pub fn aperture_profile(&self, beam: Beam, plane: Plane) -> ApertureProfile {
        let mut out = ApertureProfile::default();
        for row in self.aperture(beam).map(|t| t.rows()).unwrap_or_default() {
            let half = row.half_gap(plane);
            out.s.push(row.s);
            out.upper.push(half);
            out.lower.push(-half);
        }
        out
    }

    pub fn collimator_jaws(&mut self, beam: Beam, plane: Plane) -> Result<Vec<Jaw>, EngineError> {
        self.ensure_fresh()?;
        Ok(self
            .collimators(beam)
            .map(|c| {
                c.plane(plane)
                    .rows()
                    .iter()
                    .map(|row| Jaw {
                        name: row.name.clone(),
                        s: row.s,
                        top: row.top_gap,
                        bottom: row.bottom_gap,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn bpm_positions(&self, beam: Beam, plane: Plane) -> Vec<BpmPoint> {
        self.bpm(beam)
            .map(|t| {
                t.rows()
                    .iter()
                    .map(|row| BpmPoint {
                        name: row.name.clone(),
                        s: row.s,
                        position: row.position(plane),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn element_shapes(&self, beam: Beam) -> Vec<ElementShape> {
        self.elements(beam).map(|t| t.shapes()).unwrap_or_default()
    }

    pub fn knob_values(&self) -> Vec<KnobReading> {
        self.knobs()
            .iter()
            .map(|(name, value)| KnobReading {
                name: name.to_string(),
                current: value.current,
                initial: value.initial,
            })
            .collect()
    }
}
