use super::beam::{Beam, Plane};
use super::optics::OpticsTable;
use super::ring::{self, Longitudinal};
use tracing::debug;

/// A measured beam position, aligned to the optics of its beam.
#[derive(Debug, Clone, PartialEq)]
pub struct BpmRow {
    pub name: String,
    pub s: f64,
    pub x: f64,
    pub y: f64,
}

impl BpmRow {
    pub fn position(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.x,
            Plane::Vertical => self.y,
        }
    }
}

impl Longitudinal for BpmRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BpmTable {
    rows: Vec<BpmRow>,
}

impl BpmTable {
    /// Selects the monitors of `beam` from a full acquisition (positions in
    /// metres) and places them at the `s` of the matching optics rows.
    ///
    /// Monitors without an optics counterpart or with non-finite readings are
    /// dropped.
    pub fn from_acquisition(
        names: &[String],
        h: &[f64],
        v: &[f64],
        beam: Beam,
        optics: &OpticsTable,
    ) -> Self {
        let suffix = format!(".{}", beam.suffix());
        let mut rows: Vec<BpmRow> = names
            .iter()
            .zip(h.iter().zip(v.iter()))
            .filter_map(|(name, (&x, &y))| {
                let name = name.to_ascii_lowercase();
                if !name.ends_with(&suffix) {
                    return None;
                }
                if !x.is_finite() || !y.is_finite() {
                    debug!(bpm = %name, "Discarding BPM with invalid reading.");
                    return None;
                }
                let Some(row) = optics.get(&name) else {
                    debug!(bpm = %name, "BPM not found in optics table, skipping.");
                    return None;
                };
                Some(BpmRow { s: row.s, name, x, y })
            })
            .collect();
        rows.sort_by(|a, b| a.s.total_cmp(&b.s));
        Self { rows }
    }

    pub fn rows(&self) -> &[BpmRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn window(&self, s_min: f64, s_max: f64) -> impl Iterator<Item = &BpmRow> {
        self.rows
            .iter()
            .filter(move |row| row.s >= s_min && row.s <= s_max)
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
    }
}
