use super::config::{ErrorBudget, ModelConfig};
use super::error::EngineError;
use super::knobs::{KnobState, KnobValue};
use super::measurement;
use super::state::{KnobChange, ModelState};
use crate::core::io::collimator_db::CollimatorDatabase;
use crate::core::io::line::companion_line_path;
use crate::core::io::machine::{self, companion_aperture_path};
use crate::core::io::timeseries::TimeSeriesSource;
use crate::core::lattice::handle::{
    LineHandle, MatchOutcome, MatchRequest, MatchTarget, OracleError, OrbitQuantity,
    TwissOptions,
};
use crate::core::lattice::thin::Lattice;
use crate::core::models::aperture::ApertureTable;
use crate::core::models::beam::{Beam, BeamPair, Plane};
use crate::core::models::bpm::BpmTable;
use crate::core::models::collimator::BeamCollimators;
use crate::core::models::elements::ElementTable;
use crate::core::models::optics::{NominalTable, OpticsRow, OpticsTable};
use crate::core::models::ring::wrap_s;
use crate::core::utils::naming;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Rows produced by the oracle for aperture markers and drifts carry no
/// physical element and are dropped.
fn is_synthetic(name: &str) -> bool {
    name.contains("aper") || name.contains("drift")
}

/// Shortest run of rows around a ring of `n` rows that contains every index
/// in `indices`, as `(first, last)`; `first > last` when it wraps past row 0.
/// `None` when fewer than two rows lie outside it.
fn enclosing_arc(indices: &[usize], n: usize) -> Option<(usize, usize)> {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let (&lowest, &highest) = (sorted.first()?, sorted.last()?);
    // (gap to the next index, index after the gap, index before it)
    let mut widest = (n + lowest - highest, lowest, highest);
    for pair in sorted.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest.0 {
            widest = (gap, pair[1], pair[0]);
        }
    }
    let (gap, first, last) = widest;
    (gap > 2).then_some((first, last))
}

/// Both beams of a ring, their optics and every table aligned to them.
///
/// Knob writes only mark the model dirty. Queries that serve plots or
/// margins recompute the optics first; [`OpticsModel::twiss`] can also be
/// called explicitly.
pub struct OpticsModel<L: LineHandle = Lattice> {
    config: ModelConfig,
    lines: BeamPair<L>,
    gamma: f64,
    length: f64,

    optics: BeamPair<OpticsTable>,
    nominal: BeamPair<NominalTable>,
    aperture: Option<BeamPair<ApertureTable>>,
    elements: Option<BeamPair<ElementTable>>,
    collimators: Option<BeamPair<BeamCollimators>>,
    bpm: Option<BeamPair<BpmTable>>,

    knobs: KnobState,
    anchor: Option<String>,
    origin: BeamPair<f64>,
    state: ModelState,
    pending: Vec<KnobChange>,
}

impl<L: LineHandle> fmt::Debug for OpticsModel<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpticsModel")
            .field("gamma", &self.gamma)
            .field("length", &self.length)
            .field("rows", &(self.optics.b1.len(), self.optics.b2.len()))
            .field("anchor", &self.anchor)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl OpticsModel<Lattice> {
    /// Opens the beam-1 line at `line_path` and its beam-2 companion (`b1`
    /// replaced by `b2` in the file name).
    #[instrument(skip_all, name = "open_model")]
    pub fn open(line_path: &Path, config: ModelConfig) -> Result<Self, EngineError> {
        let b2_path = companion_line_path(line_path);
        if b2_path == line_path {
            return Err(EngineError::FormatMismatch(format!(
                "cannot derive the beam-2 line from '{}' (no 'b1' in the file name)",
                line_path.display()
            )));
        }
        let b1 = Lattice::open(line_path)?;
        let b2 = Lattice::open(&b2_path)?;
        Self::new(BeamPair::new(b1, b2), config)
    }
}

impl<L: LineHandle> OpticsModel<L> {
    pub fn new(lines: BeamPair<L>, config: ModelConfig) -> Result<Self, EngineError> {
        let gamma = lines.b1.gamma0();
        let length = config.length.unwrap_or_else(|| lines.b1.length());
        let knobs = KnobState::from_lines(&lines);
        let mut model = Self {
            config,
            lines,
            gamma,
            length,
            optics: BeamPair::default(),
            nominal: BeamPair::default(),
            aperture: None,
            elements: None,
            collimators: None,
            bpm: None,
            knobs,
            anchor: None,
            origin: BeamPair::new(0.0, 0.0),
            state: ModelState::Fresh,
            pending: Vec::new(),
        };
        model.twiss()?;
        model.renominalise();
        info!(
            gamma = model.gamma,
            length = model.length,
            rows_b1 = model.optics.b1.len(),
            rows_b2 = model.optics.b2.len(),
            knobs = model.knobs.iter().count(),
            "Optics model initialised."
        );
        Ok(model)
    }

    // --- Twiss ---

    /// Recomputes both optics tables and every derived column.
    ///
    /// On failure the model becomes [`ModelState::Faulted`], keeps the last
    /// good optics and reports the knob writes made since then.
    pub fn twiss(&mut self) -> Result<(), EngineError> {
        let b1 = self.compute_optics(Beam::B1);
        let b2 = self.compute_optics(Beam::B2);
        let ((b1, origin_b1), (b2, origin_b2)) = match (b1, b2) {
            (Ok(b1), Ok(b2)) => (b1, b2),
            (Err(reason), _) => return Err(self.fault(Beam::B1, reason)),
            (_, Err(reason)) => return Err(self.fault(Beam::B2, reason)),
        };
        self.optics = BeamPair::new(b1, b2);
        self.origin = BeamPair::new(origin_b1, origin_b2);
        self.derive_columns();
        self.pending.clear();
        self.state = ModelState::Fresh;
        debug!("Twiss complete.");
        Ok(())
    }

    /// Optics of `beam` in the cycled frame, with the oracle-frame position of
    /// its origin. The anchor is located by name so it lands exactly on `s = 0`.
    fn compute_optics(&self, beam: Beam) -> Result<(OpticsTable, f64), OracleError> {
        let table = self.lines.get(beam).twiss(&TwissOptions {
            reverse: beam.is_reversed(),
            skip_global_quantities: true,
        })?;
        let origin = self
            .anchor
            .as_deref()
            .and_then(|anchor| table.find(&naming::element_on_beam(anchor, beam)))
            .map_or(*self.origin.get(beam), |(_, row)| row.s);
        let rows = table
            .rows
            .into_iter()
            .filter(|r| !is_synthetic(&r.name))
            .map(|r| {
                let mut row = OpticsRow::new(r.name, r.s, r.x, r.y, r.betx, r.bety);
                row.dx = r.dx;
                row.dy = r.dy;
                row
            })
            .collect();
        let mut optics = OpticsTable::from_rows(rows);
        optics.shift(origin, self.length);
        Ok((optics, origin))
    }

    fn fault(&mut self, beam: Beam, reason: OracleError) -> EngineError {
        self.state = ModelState::Faulted;
        warn!(%beam, %reason, pending = self.pending.len(), "Twiss failed, keeping previous optics.");
        EngineError::TwissFailure {
            beam,
            reason,
            pending: self.pending.clone(),
        }
    }

    fn derive_columns(&mut self) {
        for beam in Beam::ALL {
            let optics = self.optics.get_mut(beam);
            optics.compute_sigma(self.config.emittance_n, self.gamma);
            optics.compute_envelope(self.config.envelope_n);
            optics.compute_distance_to_nominal(self.nominal.get(beam));
            if let Some(collimators) = &mut self.collimators {
                collimators.get_mut(beam).refresh(self.optics.get(beam));
            }
        }
    }

    /// Twisses when a knob changed since the last twiss. A faulted model keeps
    /// serving its retained optics.
    pub fn ensure_fresh(&mut self) -> Result<(), EngineError> {
        match self.state {
            ModelState::Dirty => self.twiss(),
            ModelState::Fresh | ModelState::Faulted => Ok(()),
        }
    }

    /// Takes the current orbit as the new nominal reference.
    pub fn renominalise(&mut self) {
        for beam in Beam::ALL {
            let nominal = self.optics.get(beam).nominal_snapshot();
            self.optics
                .get_mut(beam)
                .compute_distance_to_nominal(&nominal);
            *self.nominal.get_mut(beam) = nominal;
        }
    }

    /// Sets the envelope half-width (in sigma) and refreshes the envelope and
    /// distance-to-nominal columns.
    pub fn envelope(&mut self, n: f64) -> Result<(), EngineError> {
        if !n.is_finite() {
            return Err(EngineError::Domain(format!(
                "envelope size must be finite, got {}",
                n
            )));
        }
        self.config.envelope_n = n;
        for beam in Beam::ALL {
            let optics = self.optics.get_mut(beam);
            optics.compute_envelope(n);
            optics.compute_distance_to_nominal(self.nominal.get(beam));
        }
        Ok(())
    }

    // --- Cycling ---

    /// Moves the origin of every table to `element`, wrapping `s` into `[0, L)`.
    ///
    /// A beam-specific name such as `tcp.c6l7.b1` anchors the other beam at
    /// its own counterpart (`tcp.c6l7.b2`).
    pub fn cycle(&mut self, element: &str) -> Result<(), EngineError> {
        let element = element.to_ascii_lowercase();
        let shift_of = |beam: Beam| {
            let name = naming::element_on_beam(&element, beam);
            self.optics
                .get(beam)
                .get(&name)
                .map(|row| row.s)
                .ok_or_else(|| {
                    EngineError::Domain(format!(
                        "anchor '{}' is not an element of the {} ring",
                        name, beam
                    ))
                })
        };
        let shifts = BeamPair::new(shift_of(Beam::B1)?, shift_of(Beam::B2)?);

        for beam in Beam::ALL {
            let shift = *shifts.get(beam);
            if shift != 0.0 {
                self.shift_tables(beam, shift);
            }
            let origin = self.origin.get_mut(beam);
            *origin = wrap_s(*origin + shift, self.length);
        }
        info!(anchor = %element, "Cycled reference origin.");
        self.anchor = Some(element);
        Ok(())
    }

    fn shift_tables(&mut self, beam: Beam, shift: f64) {
        let length = self.length;
        self.optics.get_mut(beam).shift(shift, length);
        self.nominal.get_mut(beam).shift(shift, length);
        if let Some(aperture) = &mut self.aperture {
            aperture.get_mut(beam).shift(shift, length);
        }
        if let Some(collimators) = &mut self.collimators {
            collimators.get_mut(beam).shift(shift, length);
        }
        if let Some(elements) = &mut self.elements {
            elements.get_mut(beam).shift(shift, length);
        }
        if let Some(bpm) = &mut self.bpm {
            bpm.get_mut(beam).shift(shift, length);
        }
    }

    // --- Knobs ---

    fn write_knob(&mut self, beam: Beam, knob: &str, value: f64) -> Result<(), EngineError> {
        let line = self.lines.get_mut(beam);
        let old = line.var(knob).ok_or_else(|| {
            EngineError::Domain(format!("unknown knob '{}' on {}", knob, beam))
        })?;
        line.set_var(knob, value)
            .map_err(EngineError::from_oracle)?;
        self.pending.push(KnobChange {
            knob: knob.to_string(),
            beam,
            old,
            new: value,
        });
        self.knobs.set_current(knob, value);
        self.state = ModelState::Dirty;
        Ok(())
    }

    /// Writes `value` to `knob` on every line that defines it.
    pub fn change_knob(&mut self, knob: &str, value: f64) -> Result<(), EngineError> {
        let beams: Vec<Beam> = Beam::ALL
            .into_iter()
            .filter(|&b| self.lines.get(b).var(knob).is_some())
            .collect();
        if beams.is_empty() {
            return Err(EngineError::Domain(format!("unknown knob '{}'", knob)));
        }
        for beam in beams {
            self.write_knob(beam, knob, value)?;
        }
        debug!(knob, value, "Knob changed.");
        Ok(())
    }

    /// Restores every knob to its initial value, twisses and re-takes the
    /// nominal reference.
    pub fn reset_knobs(&mut self) -> Result<(), EngineError> {
        let initial: Vec<(String, f64)> = self
            .knobs
            .iter()
            .map(|(name, value)| (name.to_string(), value.initial))
            .collect();
        for (name, value) in initial {
            for beam in Beam::ALL {
                if self
                    .lines
                    .get(beam)
                    .var(&name)
                    .is_some_and(|current| current != value)
                {
                    self.write_knob(beam, &name, value)?;
                }
            }
        }
        self.twiss()?;
        self.renominalise();
        info!("Knobs reset to their initial values.");
        Ok(())
    }

    /// Sets a corrector strength on one beam only.
    pub fn change_acb_knob(&mut self, knob: &str, value: f64, beam: Beam) -> Result<(), EngineError> {
        self.write_knob(beam, knob, value)
    }

    /// Zeroes every corrector strength (`acb*` knobs) on both beams.
    pub fn reset_all_acb_knobs(&mut self) -> Result<(), EngineError> {
        for beam in Beam::ALL {
            let line = self.lines.get(beam);
            let correctors: Vec<String> = line
                .knobs()
                .into_iter()
                .filter(|k| k.starts_with("acb") && line.var(k).is_some_and(|v| v != 0.0))
                .collect();
            for knob in correctors {
                self.write_knob(beam, &knob, 0.0)?;
            }
        }
        Ok(())
    }

    /// Undoes the knob writes made since the last successful twiss, newest
    /// first, and twisses.
    pub fn revert_pending(&mut self) -> Result<(), EngineError> {
        let pending = std::mem::take(&mut self.pending);
        for change in pending.iter().rev() {
            self.lines
                .get_mut(change.beam)
                .set_var(&change.knob, change.old)
                .map_err(EngineError::from_oracle)?;
            self.knobs.set_current(&change.knob, change.old);
        }
        info!(reverted = pending.len(), "Reverted pending knob changes.");
        self.twiss()
    }

    pub fn sort_acb_knobs_by_region(&self, beam: Beam, plane: Plane, region: &str) -> Vec<String> {
        let knobs = self.lines.get(beam).knobs();
        naming::select_by_region(
            knobs.iter().map(String::as_str),
            naming::parse_acb_knob,
            beam,
            plane,
            region,
        )
    }

    pub fn sort_mcbs_by_region(&self, beam: Beam, plane: Plane, region: &str) -> Vec<String> {
        naming::select_by_region(
            self.optics.get(beam).rows().iter().map(|r| r.name.as_str()),
            naming::parse_mcb_element,
            beam,
            plane,
            region,
        )
    }

    /// `[s_min, s_max]` of interaction region `ir` in the current frame.
    ///
    /// An interval with `s_min > s_max` straddles the origin.
    pub fn get_ir_boundries(&self, beam: Beam, ir: u8) -> Result<(f64, f64), EngineError> {
        let optics = self.optics.get(beam);
        let (start, end) = naming::ir_markers(ir, beam);
        if let (Some(start), Some(end)) = (optics.get(&start), optics.get(&end)) {
            return Ok((start.s, end.s));
        }
        let side_extreme = |side: char, init: f64, pick: fn(f64, f64) -> f64| {
            optics
                .rows()
                .iter()
                .filter(|r| naming::ir_side(&r.name, ir) == Some(side))
                .map(|r| r.s)
                .fold(init, pick)
        };
        let s_min = side_extreme('l', f64::INFINITY, f64::min);
        let s_max = side_extreme('r', f64::NEG_INFINITY, f64::max);
        if !s_min.is_finite() || !s_max.is_finite() {
            return Err(EngineError::Domain(format!(
                "no elements of IR{} found for {}",
                ir, beam
            )));
        }
        Ok((s_min, s_max))
    }

    // --- Local bumps ---

    /// Matches `correctors` so the orbit at `element` is `size_mm` millimetres
    /// while the orbit and angle just outside the correctors keep their
    /// current values. The bump spans the shortest stretch of ring holding the
    /// element and every driven corrector, so it may cross the line's start.
    pub fn match_local_bump(
        &mut self,
        element: &str,
        correctors: &[String],
        size_mm: f64,
        beam: Beam,
        plane: Plane,
    ) -> Result<MatchOutcome, EngineError> {
        if correctors.is_empty() {
            return Err(EngineError::Domain("empty correctors list".to_string()));
        }
        let element = element.to_ascii_lowercase();
        let line = self.lines.get(beam);
        let old = correctors
            .iter()
            .map(|c| {
                line.var(c).ok_or_else(|| {
                    EngineError::Domain(format!("unknown corrector '{}' on {}", c, beam))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let table = line
            .twiss(&TwissOptions {
                reverse: beam.is_reversed(),
                skip_global_quantities: true,
            })
            .map_err(|reason| EngineError::TwissFailure {
                beam,
                reason,
                pending: self.pending.clone(),
            })?;
        let Some((element_index, _)) = table.find(&element) else {
            return Err(EngineError::Domain(format!(
                "element '{}' not found in {}",
                element, beam
            )));
        };
        let mut span: Vec<usize> = correctors
            .iter()
            .flat_map(|c| line.dependent_elements(c))
            .filter_map(|name| table.find(&name).map(|(i, _)| i))
            .collect();
        if span.is_empty() {
            return Err(EngineError::Domain(
                "the correctors drive no element of the line".to_string(),
            ));
        }
        span.push(element_index);
        let n = table.rows.len();
        let Some((first, last)) = enclosing_arc(&span, n) else {
            return Err(EngineError::Domain(format!(
                "bump at '{}' leaves no element outside its correctors",
                element
            )));
        };
        let before = &table.rows[(first + n - 1) % n];
        let after = &table.rows[(last + 1) % n];

        let position = OrbitQuantity::position(plane);
        let angle = OrbitQuantity::angle(plane);
        let mut targets = vec![MatchTarget {
            element: element.clone(),
            quantity: position,
            value: size_mm * 1e-3,
        }];
        for row in [before, after] {
            for quantity in [position, angle] {
                targets.push(MatchTarget {
                    element: row.name.clone(),
                    quantity,
                    value: row.quantity(quantity),
                });
            }
        }
        let request = MatchRequest {
            targets,
            vary: correctors.to_vec(),
            tolerance: self.config.match_tolerance,
            max_iterations: self.config.match_max_iterations,
            reverse: beam.is_reversed(),
        };

        let outcome = self
            .lines
            .get_mut(beam)
            .match_targets(&request)
            .map_err(EngineError::from_oracle)?;
        if !outcome.converged {
            return Err(EngineError::MatchFailure {
                reason: format!(
                    "bump at '{}' not matched within {} after {} iterations",
                    element, request.tolerance, outcome.iterations
                ),
                residuals: outcome.residuals,
            });
        }
        for ((knob, new), old) in outcome.values.iter().zip(old) {
            self.pending.push(KnobChange {
                knob: knob.clone(),
                beam,
                old,
                new: *new,
            });
            self.knobs.set_current(knob, *new);
        }
        self.state = ModelState::Dirty;
        info!(%element, %beam, %plane, size_mm, iterations = outcome.iterations, "Local bump matched.");
        Ok(outcome)
    }

    // --- Error budgets ---

    /// Beam size in both planes inflated by beta-beating and momentum spread:
    /// `sigma * (1 + delta_beta) + |D * delta|`.
    pub fn calculate_sigma_with_error(&self, row: &OpticsRow, budget: &ErrorBudget) -> (f64, f64) {
        let inflate = |sigma: f64, dispersion: f64| {
            sigma * (1.0 + budget.delta_beta) + (dispersion * budget.delta).abs()
        };
        (
            inflate(row.sigma_x, row.dx),
            inflate(row.sigma_y, row.dy),
        )
    }

    /// Horizontal and vertical shrinkage of the aperture from the mechanical
    /// and closed-orbit tolerances.
    pub fn calculate_aper_error(&self, budget: &ErrorBudget) -> (f64, f64) {
        (
            budget.rtol + budget.xtol + budget.delta_co,
            budget.rtol + budget.ytol + budget.delta_co,
        )
    }

    // --- Loading ---

    /// Loads the beam-1 aperture at `path` and its `B4` companion for beam 2,
    /// aligned to the optics by name.
    pub fn load_aperture(&mut self, path: &Path) -> Result<(), EngineError> {
        let b4_path = companion_aperture_path(path);
        if b4_path == path {
            return Err(EngineError::FormatMismatch(format!(
                "cannot derive the beam-2 aperture from '{}' (no 'B1' in the file name)",
                path.display()
            )));
        }
        let raw = BeamPair::new(
            machine::read_aperture(path)?,
            machine::read_aperture(&b4_path)?,
        );
        let tables = raw.map(|beam, rows| ApertureTable::from_raw(rows).align_to(self.optics.get(beam)));
        info!(
            rows_b1 = tables.b1.len(),
            rows_b2 = tables.b2.len(),
            "Aperture loaded."
        );
        self.aperture = Some(tables);
        Ok(())
    }

    /// Loads the machine components drawn under the plots, from the same
    /// beam-1/`B4` file pair as the aperture.
    pub fn load_elements(&mut self, path: &Path) -> Result<(), EngineError> {
        let b4_path = companion_aperture_path(path);
        let raw = BeamPair::new(
            machine::read_elements(path)?,
            machine::read_elements(&b4_path)?,
        );
        let length = self.length;
        let origin = self.origin.clone();
        let tables = raw.map(|beam, rows| {
            let mut table = ElementTable::from_rows(rows);
            table.shift(*origin.get(beam), length);
            table
        });
        self.elements = Some(tables);
        Ok(())
    }

    /// Loads collimator settings and places their jaws on the current optics.
    pub fn load_collimators(&mut self, path: &Path) -> Result<(), EngineError> {
        let db = CollimatorDatabase::load(path)?;
        self.ensure_fresh()?;
        let tables = BeamPair::new(
            BeamCollimators::build(db.beam(Beam::B1), &self.optics.b1),
            BeamCollimators::build(db.beam(Beam::B2), &self.optics.b2),
        );
        for (beam, t) in tables.iter() {
            info!(%beam, horizontal = t.x.len(), vertical = t.y.len(), "Collimators loaded.");
        }
        self.collimators = Some(tables);
        Ok(())
    }

    /// Replaces the collimator gaps by the jaw gaps measured at `time`.
    pub fn load_collimator_gaps(
        &mut self,
        source: &impl TimeSeriesSource,
        time: f64,
    ) -> Result<(), EngineError> {
        let Some(collimators) = &self.collimators else {
            return Err(EngineError::Domain(
                "collimators must be loaded before their gaps".to_string(),
            ));
        };
        let mut gaps = Vec::new();
        for (beam, tables) in collimators.iter() {
            for plane in [Plane::Horizontal, Plane::Vertical] {
                for (i, row) in tables.plane(plane).rows().iter().enumerate() {
                    let gap = measurement::read_gap(source, &row.name, time)?;
                    gaps.push((beam, plane, i, gap));
                }
            }
        }
        if let Some(collimators) = &mut self.collimators {
            for (beam, plane, i, gap) in gaps {
                collimators.get_mut(beam).plane_mut(plane).rows_mut()[i].set_measured_gap(gap);
            }
        }
        Ok(())
    }

    /// Loads the BPM readings recorded at `time` for both beams.
    pub fn load_bpm(&mut self, source: &impl TimeSeriesSource, time: f64) -> Result<(), EngineError> {
        let acquisition = measurement::read_bpm(source, time)?;
        let tables = BeamPair::new(
            acquisition.table(Beam::B1, &self.optics.b1),
            acquisition.table(Beam::B2, &self.optics.b2),
        );
        info!(
            timestamp = acquisition.timestamp,
            bpm_b1 = tables.b1.len(),
            bpm_b2 = tables.b2.len(),
            "BPM readings loaded."
        );
        self.bpm = Some(tables);
        Ok(())
    }

    // --- Accessors ---

    /// Optics of `beam`, recomputed first when a knob changed.
    pub fn optics(&mut self, beam: Beam) -> Result<&OpticsTable, EngineError> {
        self.ensure_fresh()?;
        Ok(self.optics.get(beam))
    }

    /// Optics as last computed, without twissing.
    pub fn snapshot(&self, beam: Beam) -> &OpticsTable {
        self.optics.get(beam)
    }

    pub fn nominal(&self, beam: Beam) -> &NominalTable {
        self.nominal.get(beam)
    }

    pub fn aperture(&self, beam: Beam) -> Option<&ApertureTable> {
        self.aperture.as_ref().map(|t| t.get(beam))
    }

    pub fn collimators(&self, beam: Beam) -> Option<&BeamCollimators> {
        self.collimators.as_ref().map(|t| t.get(beam))
    }

    pub fn elements(&self, beam: Beam) -> Option<&ElementTable> {
        self.elements.as_ref().map(|t| t.get(beam))
    }

    pub fn bpm(&self, beam: Beam) -> Option<&BpmTable> {
        self.bpm.as_ref().map(|t| t.get(beam))
    }

    pub fn line(&self, beam: Beam) -> &L {
        self.lines.get(beam)
    }

    pub fn knob(&self, name: &str) -> Option<&KnobValue> {
        self.knobs.get(name)
    }

    pub fn knobs(&self) -> &KnobState {
        &self.knobs
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn pending(&self) -> &[KnobChange] {
        &self.pending
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn emittance_n(&self) -> f64 {
        self.config.emittance_n
    }

    pub fn envelope_n(&self) -> f64 {
        self.config.envelope_n
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::timeseries::SnapshotFile;
    use crate::engine::testing;
    use tempfile::tempdir;

    fn assert_sorted_in_ring(table: &OpticsTable, length: f64) {
        for pair in table.rows().windows(2) {
            assert!(pair[0].s < pair[1].s, "{} !< {}", pair[0].s, pair[1].s);
        }
        assert!(table.rows().iter().all(|r| r.s >= 0.0 && r.s < length));
    }

    #[test]
    fn construction_twisses_and_takes_the_nominal() {
        let model = testing::model();
        assert_eq!(model.state(), ModelState::Fresh);
        assert_eq!(model.gamma(), testing::GAMMA);
        assert_eq!(model.length(), testing::LENGTH);
        assert_eq!(model.emittance_n(), 3.5e-6);
        for beam in Beam::ALL {
            let optics = model.snapshot(beam);
            assert_eq!(optics.len(), model.nominal(beam).len());
            assert!(optics.rows().iter().all(|r| !is_synthetic(&r.name)));
            for row in optics.rows() {
                assert_eq!(row.x_from_nom_to_top, 0.0);
                assert_eq!(row.x_from_nom_to_bottom, 0.0);
                assert_eq!(row.y_from_nom_to_top, 0.0);
                assert_eq!(row.y_from_nom_to_bottom, 0.0);
            }
            assert_sorted_in_ring(optics, model.length());
        }
        assert_eq!(model.snapshot(Beam::B1).rows()[0].name, "ip1");
        assert_eq!(model.snapshot(Beam::B2).rows()[0].name, "ip1");
    }

    #[test]
    fn opens_both_lines_from_disk() {
        let dir = tempdir().unwrap();
        let path = testing::write_lines(dir.path());
        let model = OpticsModel::open(&path, ModelConfig::default()).unwrap();
        assert!(model.snapshot(Beam::B2).get("bpm.2r5.b2").is_some());

        let err = OpticsModel::open(&dir.path().join("ring.json"), ModelConfig::default());
        assert!(matches!(err, Err(EngineError::FormatMismatch(_))));

        std::fs::remove_file(dir.path().join("ring_b2.json")).unwrap();
        let err = OpticsModel::open(&path, ModelConfig::default());
        assert!(matches!(err, Err(EngineError::MissingResource(_))));
    }

    #[test]
    fn restoring_a_knob_restores_the_optics() {
        let mut model = testing::model();
        let before = model.snapshot(Beam::B1).clone();
        model.change_knob("on_x5", 30.0).unwrap();
        assert_eq!(model.state(), ModelState::Dirty);
        assert_ne!(model.optics(Beam::B1).unwrap(), &before);

        model.change_knob("on_x5", 0.0).unwrap();
        let after = model.optics(Beam::B1).unwrap();
        for (a, b) in after.rows().iter().zip(before.rows()) {
            assert_eq!(a.name, b.name);
            assert!((a.y - b.y).abs() < 1e-15);
            assert!((a.bety - b.bety).abs() < 1e-9);
        }
    }

    #[test]
    fn crossing_knob_moves_the_orbit_away_from_nominal() {
        let mut model = testing::model();
        model.change_knob("on_x5", 50.0).unwrap();
        let ip5 = model.optics(Beam::B1).unwrap().get("ip5").unwrap();
        assert!(ip5.y.abs() > 1e-7);
        assert!((ip5.y_from_nom_to_top - ip5.y * 1e3).abs() < 1e-12);
        assert!((ip5.y_from_nom_to_bottom + ip5.y * 1e3).abs() < 1e-12);
        assert_eq!(model.knob("on_x5").unwrap().current, 50.0);
        assert_eq!(model.knob("on_x5").unwrap().initial, 0.0);
    }

    #[test]
    fn unknown_knobs_are_domain_errors() {
        let mut model = testing::model();
        assert!(matches!(
            model.change_knob("on_x9", 1.0),
            Err(EngineError::Domain(_))
        ));
        assert!(matches!(
            model.change_acb_knob("acbh3.r5b1", 1.0, Beam::B2),
            Err(EngineError::Domain(_))
        ));
        assert_eq!(model.state(), ModelState::Fresh);
    }

    #[test]
    fn acb_knobs_change_one_beam_and_reset_to_zero() {
        let mut model = testing::model();
        model.change_acb_knob("acbxh1.l5", 1e-5, Beam::B2).unwrap();
        model.change_acb_knob("acbh3.r5b1", 2e-5, Beam::B1).unwrap();
        assert_eq!(model.line(Beam::B1).var("acbxh1.l5"), Some(0.0));
        assert_eq!(model.line(Beam::B2).var("acbxh1.l5"), Some(1e-5));
        assert_eq!(model.pending().len(), 2);

        model.reset_all_acb_knobs().unwrap();
        for beam in Beam::ALL {
            let line = model.line(beam);
            for knob in line.knobs().iter().filter(|k| k.starts_with("acb")) {
                assert_eq!(line.var(knob), Some(0.0), "{knob} on {beam}");
            }
        }
    }

    #[test]
    fn reset_restores_initial_values_and_nominal() {
        let mut model = testing::model();
        model.change_knob("on_x5", 25.0).unwrap();
        model.change_knob("kqf", 0.021).unwrap();
        model.twiss().unwrap();
        model.reset_knobs().unwrap();
        assert_eq!(model.knob("kqf").unwrap().current, testing::KQF);
        assert_eq!(model.line(Beam::B2).var("on_x5"), Some(0.0));
        assert_eq!(model.knobs().modified().count(), 0);
        assert!(model
            .snapshot(Beam::B1)
            .rows()
            .iter()
            .all(|r| r.y_from_nom_to_top == 0.0));
    }

    #[test]
    fn failed_twiss_faults_and_can_be_reverted() {
        let mut model = testing::model();
        let before = model.snapshot(Beam::B1).clone();
        model.change_knob("kqf", 1.0).unwrap();

        let err = model.optics(Beam::B1).unwrap_err();
        match &err {
            EngineError::TwissFailure { pending, .. } => {
                assert!(pending.iter().all(|c| c.knob == "kqf" && c.new == 1.0));
                assert_eq!(pending.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(model.state(), ModelState::Faulted);
        assert_eq!(model.optics(Beam::B1).unwrap(), &before);

        model.revert_pending().unwrap();
        assert_eq!(model.state(), ModelState::Fresh);
        assert_eq!(model.knob("kqf").unwrap().current, testing::KQF);
        assert_eq!(model.snapshot(Beam::B1), &before);
    }

    #[test]
    fn envelope_brackets_the_orbit() {
        let mut model = testing::model();
        model.change_knob("on_x5", 40.0).unwrap();
        model.twiss().unwrap();
        model.envelope(11.0).unwrap();
        let eps = model.emittance_n() / model.gamma();
        for beam in Beam::ALL {
            for row in model.snapshot(beam).rows() {
                assert!(row.x_down <= row.x && row.x <= row.x_up);
                assert!(row.y_down <= row.y && row.y <= row.y_up);
                assert!((row.sigma_y - (row.bety * eps).sqrt()).abs() < 1e-15);
                assert!((row.y_up - row.y - 11.0 * row.sigma_y).abs() < 1e-15);
            }
        }
        assert!(model.envelope(f64::NAN).is_err());
    }

    #[test]
    fn cycle_moves_the_origin_and_is_idempotent() {
        let mut model = testing::model();
        let rows = model.snapshot(Beam::B1).len();
        model.cycle("IP5").unwrap();
        assert_eq!(model.anchor(), Some("ip5"));
        for beam in Beam::ALL {
            let optics = model.snapshot(beam);
            assert_eq!(optics.rows()[0].name, "ip5");
            assert_eq!(optics.rows()[0].s, 0.0);
            assert_sorted_in_ring(optics, model.length());
        }
        assert_eq!(model.snapshot(Beam::B1).len(), rows);

        let once = model.snapshot(Beam::B1).clone();
        model.cycle("ip5").unwrap();
        assert_eq!(model.snapshot(Beam::B1), &once);

        model.change_knob("on_x5", 10.0).unwrap();
        let optics = model.optics(Beam::B1).unwrap();
        assert_eq!(optics.rows()[0].name, "ip5");
        assert_eq!(optics.get("ip1").unwrap().s, 200.0);

        assert!(matches!(model.cycle("ip9"), Err(EngineError::Domain(_))));
    }

    #[test]
    fn repeated_cycles_keep_the_anchor_at_the_origin() {
        let mut model = testing::scaled_model(1.0000001234567);
        let length = model.length();
        model.cycle("ip3").unwrap();
        model.cycle("mcbxh.1l1").unwrap();
        model.change_knob("on_x5", 10.0).unwrap();
        for beam in Beam::ALL {
            let optics = model.optics(beam).unwrap();
            assert_eq!(optics.rows()[0].name, "mcbxh.1l1", "{beam}");
            assert_eq!(optics.rows()[0].s, 0.0);
            assert_sorted_in_ring(optics, length);
        }

        model.cycle("ip7").unwrap();
        model.twiss().unwrap();
        assert_eq!(model.snapshot(Beam::B1).rows()[0].name, "ip7");
        assert_eq!(model.snapshot(Beam::B1).rows()[0].s, 0.0);
    }

    #[test]
    fn beam_specific_anchor_cycles_each_beam_on_its_own_element() {
        let mut model = testing::model();
        model.cycle("TCP.C6R5.B1").unwrap();
        assert_eq!(model.anchor(), Some("tcp.c6r5.b1"));
        for beam in Beam::ALL {
            let first = &model.snapshot(beam).rows()[0];
            assert_eq!(first.name, format!("tcp.c6r5.{}", beam.suffix()));
            assert_eq!(first.s, 0.0);
        }
        model.change_knob("on_x5", 5.0).unwrap();
        assert_eq!(model.optics(Beam::B2).unwrap().rows()[0].name, "tcp.c6r5.b2");
    }

    #[test]
    fn debug_output_summarises_the_model() {
        let mut model = testing::model();
        model.cycle("ip5").unwrap();
        let text = format!("{:?}", model);
        assert!(text.starts_with("OpticsModel"));
        assert!(text.contains("anchor: Some(\"ip5\")"));
        assert!(text.contains("state: Fresh"));
    }

    #[test]
    fn corrector_lists_are_sorted_by_position() {
        let model = testing::model();
        assert_eq!(
            model.sort_acb_knobs_by_region(Beam::B1, Plane::Horizontal, "l5"),
            vec!["acbxh1.l5", "acbh3.l5b1"]
        );
        assert_eq!(
            model.sort_acb_knobs_by_region(Beam::B2, Plane::Vertical, "r5"),
            vec!["acbv3.r5b2"]
        );
        assert_eq!(
            model.sort_mcbs_by_region(Beam::B1, Plane::Horizontal, "l5"),
            vec!["mcbxh.1l5", "mcbh.3l5.b1"]
        );
        assert!(model
            .sort_mcbs_by_region(Beam::B1, Plane::Vertical, "l8")
            .is_empty());
    }

    #[test]
    fn ir_boundaries_follow_the_cycle() {
        let mut model = testing::model();
        assert_eq!(model.get_ir_boundries(Beam::B1, 5).unwrap(), (155.0, 245.0));
        let (lo, hi) = model.get_ir_boundries(Beam::B1, 1).unwrap();
        assert!(lo > hi);

        model.cycle("ip3").unwrap();
        let (lo, hi) = model.get_ir_boundries(Beam::B1, 1).unwrap();
        assert!((lo - 255.0).abs() < 1e-9 && (hi - 345.0).abs() < 1e-9);
        assert!(model.get_ir_boundries(Beam::B1, 2).is_err());
    }

    #[test]
    fn local_bump_is_closed_outside_the_correctors() {
        let mut model = testing::model();
        let correctors: Vec<String> = ["acbh3.l5b1", "acbxh1.l5", "acbh3.r5b1"]
            .into_iter()
            .map(String::from)
            .collect();
        let outcome = model
            .match_local_bump("ip5", &correctors, 1.0, Beam::B1, Plane::Horizontal)
            .unwrap();
        assert!(outcome.converged);
        assert_eq!(model.state(), ModelState::Dirty);
        assert_eq!(model.pending().len(), 3);

        let optics = model.optics(Beam::B1).unwrap();
        assert!((optics.get("ip5").unwrap().x - 1e-3).abs() < 1e-9);
        for name in ["ip1", "ip3", "ip7", "bpm.2r7.b1"] {
            assert!(optics.get(name).unwrap().x.abs() < 1e-9, "{name}");
        }
    }

    #[test]
    fn local_bump_across_the_line_start_is_closed() {
        let mut model = testing::model();
        let correctors: Vec<String> = ["acbh3.l1b1", "acbxh1.l1", "acbh3.r1b1"]
            .into_iter()
            .map(String::from)
            .collect();
        let outcome = model
            .match_local_bump("ip1", &correctors, 1.0, Beam::B1, Plane::Horizontal)
            .unwrap();
        assert!(outcome.converged);

        let optics = model.optics(Beam::B1).unwrap();
        assert!((optics.get("ip1").unwrap().x - 1e-3).abs() < 1e-9);
        for name in ["ip3", "ip5", "ip7", "bpm.2r3.b1", "bpm.2l7.b1"] {
            assert!(optics.get(name).unwrap().x.abs() < 1e-9, "{name}");
        }
    }

    #[test]
    fn enclosing_arc_takes_the_short_way_round() {
        assert_eq!(enclosing_arc(&[10, 20, 15], 100), Some((10, 20)));
        assert_eq!(enclosing_arc(&[95, 0, 3], 100), Some((95, 3)));
        assert_eq!(enclosing_arc(&[7], 100), Some((7, 7)));
        assert_eq!(enclosing_arc(&[0, 2, 4, 6], 8), None);
        assert_eq!(enclosing_arc(&[], 8), None);
    }

    #[test]
    fn local_bump_rejects_bad_input() {
        let mut model = testing::model();
        assert!(matches!(
            model.match_local_bump("ip5", &[], 1.0, Beam::B1, Plane::Horizontal),
            Err(EngineError::Domain(_))
        ));
        assert!(matches!(
            model.match_local_bump(
                "nowhere",
                &["acbh3.l5b1".to_string()],
                1.0,
                Beam::B1,
                Plane::Horizontal
            ),
            Err(EngineError::Domain(_))
        ));
    }

    #[test]
    fn error_budgets_inflate_sigma_and_shrink_aperture() {
        let model = testing::model();
        let row = model.snapshot(Beam::B1).get("mq.1r5.b1").unwrap();
        let budget = ErrorBudget::builder()
            .delta_beta(0.1)
            .delta(1e-3)
            .delta_co(2e-3)
            .rtol(1e-3)
            .xtol(5e-4)
            .ytol(2.5e-4)
            .build()
            .unwrap();
        let (sx, sy) = model.calculate_sigma_with_error(row, &budget);
        assert!((sx - (row.sigma_x * 1.1 + (row.dx * 1e-3).abs())).abs() < 1e-15);
        assert!((sy - row.sigma_y * 1.1).abs() < 1e-15);
        let (dx, dy) = model.calculate_aper_error(&budget);
        assert!((dx - 3.5e-3).abs() < 1e-15);
        assert!((dy - 3.25e-3).abs() < 1e-15);
        assert_eq!(
            model.calculate_aper_error(&ErrorBudget::default()),
            (0.0, 0.0)
        );
    }

    #[test]
    fn aperture_aligns_to_optics_and_follows_the_cycle() {
        let dir = tempdir().unwrap();
        let path = testing::write_aperture(dir.path());
        let mut model = testing::model();
        model.load_aperture(&path).unwrap();
        model.cycle("ip7").unwrap();
        for beam in Beam::ALL {
            let aperture = model.aperture(beam).unwrap();
            let optics = model.snapshot(beam);
            assert_eq!(aperture.len(), optics.len());
            for row in aperture.rows() {
                assert_eq!(row.s, optics.get(&row.name).unwrap().s);
            }
        }
        assert!(model.aperture(Beam::B1).unwrap().get("void.1").is_none());

        let err = model.load_aperture(&dir.path().join("aperture.tfs"));
        assert!(matches!(err, Err(EngineError::FormatMismatch(_))));
        let err = model.load_aperture(&dir.path().join("missing_B1.tfs"));
        assert!(matches!(err, Err(EngineError::MissingResource(_))));
    }

    #[test]
    fn elements_are_loaded_in_the_current_frame() {
        let dir = tempdir().unwrap();
        let path = testing::write_components(dir.path());
        let mut model = testing::model();
        model.cycle("ip5").unwrap();
        model.load_elements(&path).unwrap();
        let elements = model.elements(Beam::B1).unwrap();
        let ip5 = elements.rows().iter().find(|r| r.name == "ip5").unwrap();
        assert_eq!(ip5.s, 0.0);
        let shapes = model.element_shapes(Beam::B1);
        assert!(shapes.iter().any(|s| s.name == "mq.1r5.b1" && s.polarity == 1));
        assert!(shapes.iter().any(|s| s.name == "mq.1l5.b1" && s.polarity == -1));
    }

    #[test]
    fn collimators_follow_the_optics() {
        let dir = tempdir().unwrap();
        let path = testing::write_collimators(dir.path());
        let mut model = testing::model();
        model.load_collimators(&path).unwrap();

        let b1 = model.collimators(Beam::B1).unwrap();
        assert_eq!(b1.x.len(), 2);
        assert_eq!(b1.y.len(), 1);
        assert!(b1.x.rows().iter().all(|r| r.angle == 0.0));
        assert!(b1.y.rows().iter().all(|r| r.angle == 90.0));
        let b2 = model.collimators(Beam::B2).unwrap();
        assert_eq!((b2.x.len(), b2.y.len()), (1, 1));

        model.change_knob("on_x5", 60.0).unwrap();
        model.twiss().unwrap();
        let optics_row = model.snapshot(Beam::B1).get("tcp.c6r5.b1").unwrap().clone();
        let col = model.collimators(Beam::B1).unwrap().y.get("tcp.c6r5.b1").unwrap();
        assert_eq!(col.gap_sigma, 6.0);
        assert!((col.top_gap - (optics_row.y + 6.0 * optics_row.sigma_y)).abs() < 1e-15);
        assert!((col.bottom_gap - (optics_row.y - 6.0 * optics_row.sigma_y)).abs() < 1e-15);
    }

    #[test]
    fn measured_gaps_replace_the_settings() {
        let dir = tempdir().unwrap();
        let path = testing::write_collimators(dir.path());
        let mut model = testing::model();

        let gaps = SnapshotFile::parse(
            r#"{
            "TCL.4L5.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[4.0]]},
            "TCL.4L1.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[6.0]]},
            "TCP.C6R5.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[3.0]]},
            "TCL.4L5.B2:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[4.0]]}
        }"#,
        )
        .unwrap();
        assert!(matches!(
            model.load_collimator_gaps(&gaps, 1.0),
            Err(EngineError::Domain(_))
        ));

        model.load_collimators(&path).unwrap();
        let before = model.collimators(Beam::B1).cloned();
        assert!(matches!(
            model.load_collimator_gaps(&gaps, 1.0),
            Err(EngineError::MissingResource(_))
        ));
        assert_eq!(model.collimators(Beam::B1).cloned(), before);

        let complete = SnapshotFile::parse(
            r#"{
            "TCL.4L5.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[4.0]]},
            "TCL.4L1.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[6.0]]},
            "TCP.C6R5.B1:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[3.0]]},
            "TCL.4L5.B2:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[4.0]]},
            "TCP.C6R5.B2:MEAS_LVDT_GD": {"timestamps": [0.0], "values": [[3.0]]}
        }"#,
        )
        .unwrap();
        model.load_collimator_gaps(&complete, 1.0).unwrap();
        let col = model.collimators(Beam::B1).unwrap().x.get("tcl.4l5.b1").unwrap();
        assert!((col.top_gap - col.orbit - 2e-3).abs() < 1e-15);
        assert!((col.gap_sigma - 2e-3 / col.sigma).abs() < 1e-9);
    }

    #[test]
    fn bpm_readings_align_and_follow_the_cycle() {
        let mut model = testing::model();
        model.change_knob("on_x5", 20.0).unwrap();
        model.twiss().unwrap();
        let snapshot = testing::bpm_snapshot(&model, 50.0);
        model.load_bpm(&snapshot, 60.0).unwrap();

        let bpm = model.bpm(Beam::B1).unwrap();
        assert_eq!(bpm.len(), 8);
        let reading = bpm.rows().iter().find(|r| r.name == "bpm.2r5.b1").unwrap();
        let optics_row = model.snapshot(Beam::B1).get("bpm.2r5.b1").unwrap();
        assert!((reading.y - optics_row.y).abs() < 1e-15);
        assert_eq!(model.bpm(Beam::B2).unwrap().len(), 8);

        model.cycle("ip5").unwrap();
        let reading = model
            .bpm(Beam::B1)
            .unwrap()
            .rows()
            .iter()
            .find(|r| r.name == "bpm.2r5.b1")
            .unwrap();
        assert_eq!(reading.s, 30.0);

        assert!(matches!(
            model.load_bpm(&snapshot, 10.0),
            Err(EngineError::MissingResource(_))
        ));
    }
}
