use super::beam::Plane;
use super::optics::OpticsTable;
use super::ring::{self, Longitudinal};
use tracing::debug;

const ANGLE_TOLERANCE_DEG: f64 = 1e-6;

/// Collimator setting as stored in a collimator database.
#[derive(Debug, Clone, PartialEq)]
pub struct CollimatorSetting {
    pub name: String,
    /// Half-gap in units of the local beam sigma.
    pub gap: f64,
    /// Jaw rotation in degrees: 0 is horizontal, 90 is vertical.
    pub angle: f64,
}

impl CollimatorSetting {
    /// Plane the jaws cut in, or `None` for skew collimators.
    pub fn plane(&self) -> Option<Plane> {
        let angle = self.angle.rem_euclid(180.0);
        if angle.abs() < ANGLE_TOLERANCE_DEG || (angle - 180.0).abs() < ANGLE_TOLERANCE_DEG {
            Some(Plane::Horizontal)
        } else if (angle - 90.0).abs() < ANGLE_TOLERANCE_DEG {
            Some(Plane::Vertical)
        } else {
            None
        }
    }
}

/// Jaw positions of one collimator in physical units (metres).
#[derive(Debug, Clone, PartialEq)]
pub struct CollimatorRow {
    pub name: String,
    pub angle: f64,
    pub gap_sigma: f64,
    pub s: f64,
    /// Closed orbit at the collimator in the table's plane.
    pub orbit: f64,
    /// Beam sigma at the collimator in the table's plane.
    pub sigma: f64,
    pub top_gap: f64,
    pub bottom_gap: f64,
}

impl CollimatorRow {
    /// Opens the jaws to a measured full gap in metres around the orbit.
    pub fn set_measured_gap(&mut self, full_gap: f64) {
        let half = full_gap / 2.0;
        self.top_gap = self.orbit + half;
        self.bottom_gap = self.orbit - half;
        self.gap_sigma = if self.sigma > 0.0 {
            half / self.sigma
        } else {
            f64::NAN
        };
    }

    fn place(&mut self, orbit: f64, sigma: f64) {
        self.orbit = orbit;
        self.sigma = sigma;
        self.top_gap = sigma * self.gap_sigma + orbit;
        self.bottom_gap = -sigma * self.gap_sigma + orbit;
    }
}

impl Longitudinal for CollimatorRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

/// Collimators of one beam that cut in a single plane.
#[derive(Debug, Clone, PartialEq)]
pub struct CollimatorTable {
    plane: Plane,
    rows: Vec<CollimatorRow>,
}

impl CollimatorTable {
    /// Keeps the settings that cut in `plane` and places their jaws using the
    /// orbit and sigma of the matching optics rows.
    pub fn build(settings: &[CollimatorSetting], optics: &OpticsTable, plane: Plane) -> Self {
        let mut rows = Vec::new();
        for setting in settings.iter().filter(|c| c.plane() == Some(plane)) {
            let name = setting.name.to_ascii_lowercase();
            let Some(optics_row) = optics.get(&name) else {
                debug!(collimator = %name, "Collimator not found in optics table, skipping.");
                continue;
            };
            let mut row = CollimatorRow {
                name,
                angle: setting.angle,
                gap_sigma: setting.gap,
                s: optics_row.s,
                orbit: 0.0,
                sigma: 0.0,
                top_gap: 0.0,
                bottom_gap: 0.0,
            };
            row.place(optics_row.orbit(plane), optics_row.sigma(plane));
            rows.push(row);
        }
        rows.sort_by(|a, b| a.s.total_cmp(&b.s));
        Self { plane, rows }
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn rows(&self) -> &[CollimatorRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [CollimatorRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CollimatorRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Re-places the jaws after the optics changed, keeping the gaps in sigma.
    pub fn refresh(&mut self, optics: &OpticsTable) {
        for row in &mut self.rows {
            if let Some(optics_row) = optics.get(&row.name) {
                row.place(optics_row.orbit(self.plane), optics_row.sigma(self.plane));
            }
        }
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
    }
}

/// Horizontal and vertical collimator tables of one beam.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamCollimators {
    pub x: CollimatorTable,
    pub y: CollimatorTable,
}

impl BeamCollimators {
    pub fn build(settings: &[CollimatorSetting], optics: &OpticsTable) -> Self {
        Self {
            x: CollimatorTable::build(settings, optics, Plane::Horizontal),
            y: CollimatorTable::build(settings, optics, Plane::Vertical),
        }
    }

    pub fn plane(&self, plane: Plane) -> &CollimatorTable {
        match plane {
            Plane::Horizontal => &self.x,
            Plane::Vertical => &self.y,
        }
    }

    pub fn plane_mut(&mut self, plane: Plane) -> &mut CollimatorTable {
        match plane {
            Plane::Horizontal => &mut self.x,
            Plane::Vertical => &mut self.y,
        }
    }

    pub fn refresh(&mut self, optics: &OpticsTable) {
        self.x.refresh(optics);
        self.y.refresh(optics);
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        self.x.shift(origin, length);
        self.y.shift(origin, length);
    }
}
