use super::beam::Plane;
use super::optics::OpticsTable;
use super::ring::{self, Longitudinal};
use std::collections::HashSet;

/// Largest physical half-gap accepted from an aperture description, in metres.
pub const MAX_HALF_GAP: f64 = 0.2;

/// Vacuum chamber cross-section at one element.
///
/// The chamber is the intersection of the rectangle `|x| <= aper_1, |y| <= aper_2`
/// with the ellipse of semi-axes `aper_3`, `aper_4`. Tables that only describe
/// the rectangle leave the ellipse unset.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureRow {
    pub s: f64,
    pub name: String,
    pub aper_1: f64,
    pub aper_2: f64,
    pub aper_3: Option<f64>,
    pub aper_4: Option<f64>,
}

impl ApertureRow {
    fn is_valid(&self) -> bool {
        let in_range = |v: f64| v > 0.0 && v < MAX_HALF_GAP;
        in_range(self.aper_1)
            && in_range(self.aper_2)
            && self.aper_3.map_or(true, in_range)
            && self.aper_4.map_or(true, in_range)
    }

    /// Half-gap on the plane's axis through the chamber centre.
    pub fn half_gap(&self, plane: Plane) -> f64 {
        match plane {
            Plane::Horizontal => self.aper_3.map_or(self.aper_1, |a| a.min(self.aper_1)),
            Plane::Vertical => self.aper_4.map_or(self.aper_2, |b| b.min(self.aper_2)),
        }
    }
}

impl Longitudinal for ApertureRow {
    fn s(&self) -> f64 {
        self.s
    }
    fn set_s(&mut self, s: f64) {
        self.s = s;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureTable {
    rows: Vec<ApertureRow>,
}

impl ApertureTable {
    /// Builds a table from raw rows, lowercasing names and dropping rows with
    /// half-gaps outside `(0, MAX_HALF_GAP)`.
    pub fn from_raw(rows: Vec<ApertureRow>) -> Self {
        let rows = rows
            .into_iter()
            .filter(ApertureRow::is_valid)
            .map(|mut row| {
                row.name = row.name.to_ascii_lowercase();
                row
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[ApertureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ApertureRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    pub fn nearest(&self, s: f64) -> Option<&ApertureRow> {
        ring::nearest_index(&self.rows, s).map(|i| &self.rows[i])
    }

    /// Inner-joins the table with `optics` on element name, takes `s` from the
    /// optics rows and drops rows whose `s` was already seen.
    pub fn align_to(self, optics: &OpticsTable) -> Self {
        let mut seen = HashSet::new();
        let mut rows: Vec<ApertureRow> = self
            .rows
            .into_iter()
            .filter_map(|mut row| {
                let optics_row = optics.get(&row.name)?;
                row.s = optics_row.s;
                Some(row)
            })
            .filter(|row| seen.insert(row.s.to_bits()))
            .collect();
        rows.sort_by(|a, b| a.s.total_cmp(&b.s));
        Self { rows }
    }

    pub fn shift(&mut self, origin: f64, length: f64) {
        ring::shift_rows(&mut self.rows, origin, length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::optics::OpticsRow;

    fn row(name: &str, s: f64, a1: f64, a2: f64) -> ApertureRow {
        ApertureRow {
            s,
            name: name.to_string(),
            aper_1: a1,
            aper_2: a2,
            aper_3: Some(a1),
            aper_4: Some(a2),
        }
    }

    #[test]
    fn from_raw_discards_out_of_range_half_gaps() {
        let table = ApertureTable::from_raw(vec![
            row("MQ.1", 1.0, 0.02, 0.02),
            row("MQ.2", 2.0, 0.0, 0.02),
            row("MQ.3", 3.0, 0.02, 0.25),
            ApertureRow {
                aper_3: Some(0.0),
                ..row("MQ.4", 4.0, 0.02, 0.02)
            },
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].name, "mq.1");
    }

    #[test]
    fn align_to_takes_optics_positions_and_drops_duplicates() {
        let optics = OpticsTable::from_rows(vec![
            OpticsRow::new("mq.1", 10.0, 0.0, 0.0, 1.0, 1.0),
            OpticsRow::new("mq.1.a", 10.0, 0.0, 0.0, 1.0, 1.0),
            OpticsRow::new("mq.2", 30.0, 0.0, 0.0, 1.0, 1.0),
        ]);
        let table = ApertureTable::from_raw(vec![
            row("MQ.2", 29.5, 0.02, 0.02),
            row("MQ.1", 9.0, 0.03, 0.03),
            row("MQ.1.A", 9.1, 0.03, 0.03),
            row("MISSING", 5.0, 0.03, 0.03),
        ])
        .align_to(&optics);

        assert_eq!(table.len(), 2);
        for r in table.rows() {
            assert_eq!(r.s, optics.get(&r.name).unwrap().s);
        }
        assert_eq!(table.rows()[0].name, "mq.1");
    }

    #[test]
    fn half_gap_takes_the_tighter_of_rectangle_and_ellipse() {
        let r = ApertureRow {
            aper_3: Some(0.015),
            aper_4: None,
            ..row("mq", 0.0, 0.02, 0.018)
        };
        assert_eq!(r.half_gap(Plane::Horizontal), 0.015);
        assert_eq!(r.half_gap(Plane::Vertical), 0.018);
    }
}
