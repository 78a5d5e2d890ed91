use super::beam::Plane;
use super::ring::{self, Longitudinal};
use std::collections::HashMap;

/// One element reference of an [`OpticsTable`].
///
/// The identity and optics columns come from the twiss oracle; the remaining
/// columns are derived by the table and refreshed whenever the emittance, the
/// envelope size or the nominal reference changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpticsRow {
    pub s: f64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub betx: f64,
    pub bety: f64,
    pub dx: f64,
    pub dy: f64,

    pub sigma_x: f64,
    pub sigma_y: f64,
    pub x_up: f64,
    pub x_down: f64,
    pub y_up: f64,
    pub y_down: f64,
    /// Upper horizontal envelope edge relative to the nominal orbit, in millimetres.
    pub x_from_nom_to_top: f64,
    /// Nominal orbit relative to the lower horizontal envelope edge, in millimetres.
    pub x_from_nom_to_bottom: f64,
    pub y_from_nom_to_top: f64,
    pub y_from_nom_to_bottom: f64,
}

impl OpticsRow {
    pub fn new(name: impl Into<String>, s: f64, x: f64, y: f64, betx: f64, bety: f64) -> Self {
        Self {
            s,
            name: name.into(),
            x,
            y,
            betx,
            bety,
            x_up: x,
            x_down: x,
            y_up: y,
            y_down: y,
            ..Default::default()
        }
    }

    pub fn orbit(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.x,
            Plane::Vertical => self.y,
        }
    }

    pub fn beta(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.betx,
            Plane::Vertical => self.bety,
        }
    }

    pub fn dispersion(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.dx,
            Plane::Vertical => self.dy,
        }
    }

    pub fn sigma(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.sigma_x,
            Plane::Vertical => self.sigma_y,
        }
    }

    /// Lower and upper envelope edges in `plane`.
    pub fn envelope(&self, plane: Plane) -> (f64, f64) {
        match plane {
            Plane::Horizontal => (self.x_down, self.x_up),
            Plane::Vertical => (self.y_down, self.y_up),
        }
    }
}

impl Longitudinal for OpticsRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

/// Snapshot of the orbit at model construction, used as the reference for the
/// distance-to-nominal columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NominalRow {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub s: f64,
}

impl Longitudinal for NominalRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NominalTable {
    rows: Vec<NominalRow>,
    index: HashMap<String, usize>,
}

impl NominalTable {
    pub fn from_rows(rows: Vec<NominalRow>) -> Self {
        let index = build_index(rows.iter().map(|r| r.name.as_str()));
        Self { rows, index }
    }

    pub fn rows(&self) -> &[NominalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&NominalRow> {
        self.index.get(name).map(|&i| &self.rows[i])
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
        self.index = build_index(self.rows.iter().map(|r| r.name.as_str()));
    }
}

/// Per-beam optics, ordered by `s` and indexed by element name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpticsTable {
    rows: Vec<OpticsRow>,
    index: HashMap<String, usize>,
}

impl OpticsTable {
    /// Number of columns a row exposes (identity, optics and derived).
    pub const COLUMNS: usize = 18;

    pub fn from_rows(rows: Vec<OpticsRow>) -> Self {
        let index = build_index(rows.iter().map(|r| r.name.as_str()));
        Self { rows, index }
    }

    pub fn rows(&self) -> &[OpticsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&OpticsRow> {
        self.index.get(name).map(|&i| &self.rows[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn nearest(&self, s: f64) -> Option<&OpticsRow> {
        ring::nearest_index(&self.rows, s).map(|i| &self.rows[i])
    }

    /// Rows whose `s` lies in the closed interval `[s_min, s_max]`.
    pub fn window(&self, s_min: f64, s_max: f64) -> impl Iterator<Item = &OpticsRow> {
        self.rows
            .iter()
            .filter(move |row| row.s >= s_min && row.s <= s_max)
    }

    /// Recomputes `sigma = sqrt(beta * emittance_n / gamma)` in both planes.
    pub fn compute_sigma(&mut self, emittance_n: f64, gamma: f64) {
        let emittance = emittance_n / gamma;
        for row in &mut self.rows {
            row.sigma_x = (row.betx.max(0.0) * emittance).sqrt();
            row.sigma_y = (row.bety.max(0.0) * emittance).sqrt();
        }
    }

    pub fn compute_envelope(&mut self, n: f64) {
        for row in &mut self.rows {
            row.x_up = row.x + n * row.sigma_x;
            row.x_down = row.x - n * row.sigma_x;
            row.y_up = row.y + n * row.sigma_y;
            row.y_down = row.y - n * row.sigma_y;
        }
    }

    /// Distance of the envelope edges from the nominal orbit, in millimetres.
    ///
    /// Rows without a nominal counterpart get `NaN`.
    pub fn compute_distance_to_nominal(&mut self, nominal: &NominalTable) {
        for row in &mut self.rows {
            let (x_nom, y_nom) = nominal
                .get(&row.name)
                .map(|n| (n.x, n.y))
                .unwrap_or((f64::NAN, f64::NAN));
            row.x_from_nom_to_top = (row.x_up - x_nom) * 1e3;
            row.x_from_nom_to_bottom = (x_nom - row.x_down) * 1e3;
            row.y_from_nom_to_top = (row.y_up - y_nom) * 1e3;
            row.y_from_nom_to_bottom = (y_nom - row.y_down) * 1e3;
        }
    }

    pub fn nominal_snapshot(&self) -> NominalTable {
        NominalTable::from_rows(
            self.rows
                .iter()
                .map(|r| NominalRow {
                    name: r.name.clone(),
                    x: r.x,
                    y: r.y,
                    s: r.s,
                })
                .collect(),
        )
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
        self.index = build_index(self.rows.iter().map(|r| r.name.as_str()));
    }
}

fn build_index<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, name) in names.enumerate() {
        index.entry(name.to_string()).or_insert(i);
    }
    index
}
