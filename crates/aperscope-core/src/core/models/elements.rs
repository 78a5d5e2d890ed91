use super::ring::{self, Longitudinal};
use phf::{Map, phf_map};

/// How a machine component is drawn next to the optics plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKind {
    Bend,
    Quadrupole,
    Sextupole,
    Collimator,
}

static RENDER_KINDS: Map<&'static str, RenderKind> = phf_map! {
    "SBEND" => RenderKind::Bend,
    "RBEND" => RenderKind::Bend,
    "QUADRUPOLE" => RenderKind::Quadrupole,
    "SEXTUPOLE" => RenderKind::Sextupole,
    "COLLIMATOR" => RenderKind::Collimator,
};

pub fn render_kind(keyword: &str) -> Option<RenderKind> {
    RENDER_KINDS.get(keyword.to_ascii_uppercase().as_str()).copied()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementRow {
    pub s: f64,
    pub name: String,
    pub keyword: String,
    pub length: f64,
    pub k1l: f64,
}

impl Longitudinal for ElementRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

/// A drawable machine component.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementShape {
    pub name: String,
    /// Start of the element; the table stores element exits.
    pub s_start: f64,
    pub length: f64,
    pub kind: RenderKind,
    /// +1 for focusing quadrupoles, -1 for defocusing, 0 otherwise.
    pub polarity: i8,
}

/// Machine components of one beam, as read from a components table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementTable {
    rows: Vec<ElementRow>,
}

impl ElementTable {
    pub fn from_rows(rows: Vec<ElementRow>) -> Self {
        let mut rows: Vec<ElementRow> = rows
            .into_iter()
            .map(|mut r| {
                r.name = r.name.to_ascii_lowercase();
                r.keyword = r.keyword.to_ascii_uppercase();
                r
            })
            .collect();
        rows.sort_by(|a, b| a.s.total_cmp(&b.s));
        Self { rows }
    }

    pub fn rows(&self) -> &[ElementRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
    }

    pub fn shapes(&self) -> Vec<ElementShape> {
        self.rows
            .iter()
            .filter_map(|row| {
                let kind = render_kind(&row.keyword)?;
                let polarity = match kind {
                    RenderKind::Quadrupole if row.k1l > 0.0 => 1,
                    RenderKind::Quadrupole if row.k1l < 0.0 => -1,
                    _ => 0,
                };
                Some(ElementShape {
                    name: row.name.clone(),
                    s_start: row.s - row.length,
                    length: row.length,
                    kind,
                    polarity,
                })
            })
            .collect()
    }
}
