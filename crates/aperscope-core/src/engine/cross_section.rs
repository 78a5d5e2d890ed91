use super::config::ErrorBudget;
use super::error::EngineError;
use super::model::OpticsModel;
use crate::core::lattice::handle::LineHandle;
use crate::core::models::beam::Beam;
use crate::core::utils::geometry::{ApertureShape, Rect, normalised_margins};

/// Number of boundary points used for elliptic aperture polygons.
pub const POLYGON_POINTS: usize = 360;

/// Normalised aperture margin, in beam sigma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct N1 {
    pub x: f64,
    pub y: f64,
}

impl N1 {
    pub fn min(&self) -> f64 {
        self.x.min(self.y)
    }
}

/// Beam and chamber in the transverse plane at one element.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub element: String,
    pub s: f64,
    pub orbit: (f64, f64),
    pub envelope: Rect,
    pub envelope_with_errors: Rect,
    pub aperture: Vec<(f64, f64)>,
    pub aperture_with_errors: Vec<(f64, f64)>,
    pub n1: N1,
    pub n1_with_errors: N1,
}

impl<L: LineHandle> OpticsModel<L> {
    /// Transverse view at `element`: envelope rectangle and chamber polygon,
    /// with and without the error budget, and the resulting n1.
    pub fn cross_section(
        &mut self,
        element: &str,
        beam: Beam,
        budget: &ErrorBudget,
    ) -> Result<CrossSection, EngineError> {
        self.ensure_fresh()?;
        let element = element.to_ascii_lowercase();
        let optics = self.snapshot(beam);
        let target = optics.get(&element).ok_or_else(|| {
            EngineError::Domain(format!("element '{}' not found in {}", element, beam))
        })?;
        let row = optics.nearest(target.s).unwrap_or(target);

        let aperture = self.aperture(beam).ok_or_else(|| {
            EngineError::Domain("aperture must be loaded before computing n1".to_string())
        })?;
        let aper_row = aperture
            .get(&element)
            .or_else(|| aperture.nearest(row.s))
            .ok_or_else(|| EngineError::Domain(format!("no aperture for {}", beam)))?;

        let n = self.envelope_n();
        let orbit = (row.x, row.y);
        let sigma = (row.sigma_x, row.sigma_y);
        let sigma_err = self.calculate_sigma_with_error(row, budget);
        let (dx, dy) = self.calculate_aper_error(budget);

        let shape = ApertureShape::from_row(aper_row);
        let shrunk = shape.shrink(dx, dy);
        let (n1x, n1y) = normalised_margins(&shape, orbit, sigma);
        let (n1x_err, n1y_err) = normalised_margins(&shrunk, orbit, sigma_err);

        Ok(CrossSection {
            element: element.clone(),
            s: row.s,
            orbit,
            envelope: Rect::centred(row.x, row.y, n * sigma.0, n * sigma.1),
            envelope_with_errors: Rect::centred(row.x, row.y, n * sigma_err.0, n * sigma_err.1),
            aperture: shape.polygon(POLYGON_POINTS),
            aperture_with_errors: shrunk.polygon(POLYGON_POINTS),
            n1: N1 { x: n1x, y: n1y },
            n1_with_errors: N1 {
                x: n1x_err,
                y: n1y_err,
            },
        })
    }

    /// n1 at `element`, without and with the error budget.
    pub fn calculate_n1(
        &mut self,
        element: &str,
        beam: Beam,
        budget: &ErrorBudget,
    ) -> Result<(N1, N1), EngineError> {
        let section = self.cross_section(element, beam, budget)?;
        Ok((section.n1, section.n1_with_errors))
    }
}
