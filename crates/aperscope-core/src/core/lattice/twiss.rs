use super::handle::{OracleError, TwissOptions, TwissRow, TwissTable};
use crate::core::models::beam::Plane;
use crate::core::models::ring::wrap_s;
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use std::f64::consts::PI;

/// Element strengths with every expression already evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedElement<'a> {
    pub name: &'a str,
    pub s: f64,
    pub k1l: f64,
    pub hkick: f64,
    pub vkick: f64,
    pub angle: f64,
}

/// Thin lens in one plane: `u' += -focus * u + kick`.
#[derive(Debug, Clone, Copy)]
struct Lens {
    focus: f64,
    kick: f64,
    bend: f64,
}

impl Lens {
    fn of(element: &ResolvedElement, plane: Plane) -> Self {
        match plane {
            Plane::Horizontal => Self {
                focus: element.k1l,
                kick: element.hkick,
                bend: element.angle,
            },
            Plane::Vertical => Self {
                focus: -element.k1l,
                kick: element.vkick,
                bend: 0.0,
            },
        }
    }
}

fn thin_map(focus: f64, constant: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, 0.0, -focus, 1.0, constant, 0.0, 0.0, 1.0)
}

fn drift_map(length: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, length, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0)
}

#[derive(Debug, Default)]
struct PlaneSolution {
    orbit: Vec<Vector2<f64>>,
    beta: Vec<f64>,
    alpha: Vec<f64>,
    mu: Vec<f64>,
    dispersion: Vec<Vector2<f64>>,
    tune: f64,
}

/// Fixed point of the affine map `z -> M z + d`.
fn fixed_point(map: &Matrix3<f64>, plane: Plane) -> Result<Vector2<f64>, OracleError> {
    let linear: Matrix2<f64> = map.fixed_view::<2, 2>(0, 0).into_owned();
    let constant = Vector2::new(map[(0, 2)], map[(1, 2)]);
    (Matrix2::identity() - linear)
        .try_inverse()
        .map(|inv| inv * constant)
        .ok_or(OracleError::Singular { plane })
}

fn solve_plane(
    elements: &[ResolvedElement],
    drifts: &[f64],
    plane: Plane,
) -> Result<PlaneSolution, OracleError> {
    let lenses: Vec<Lens> = elements.iter().map(|e| Lens::of(e, plane)).collect();

    let mut orbit_map = Matrix3::identity();
    let mut dispersion_map = Matrix3::identity();
    for (lens, &l) in lenses.iter().zip(drifts) {
        orbit_map = drift_map(l) * thin_map(lens.focus, lens.kick) * orbit_map;
        dispersion_map = drift_map(l) * thin_map(lens.focus, lens.bend) * dispersion_map;
    }

    let m = orbit_map;
    let cos_mu = (m[(0, 0)] + m[(1, 1)]) / 2.0;
    if !(cos_mu.abs() < 1.0) {
        return Err(OracleError::Unstable { plane, cos_mu });
    }
    let sin_mu = (1.0 - cos_mu * cos_mu).sqrt().copysign(m[(0, 1)]);
    let mut beta = m[(0, 1)] / sin_mu;
    let mut alpha = (m[(0, 0)] - m[(1, 1)]) / (2.0 * sin_mu);

    let z0 = fixed_point(&orbit_map, plane)?;
    let d0 = fixed_point(&dispersion_map, plane)?;
    let mut z = Vector3::new(z0.x, z0.y, 1.0);
    let mut eta = Vector3::new(d0.x, d0.y, 1.0);
    let mut mu = 0.0;

    let mut solution = PlaneSolution::default();
    for (lens, &l) in lenses.iter().zip(drifts) {
        z = thin_map(lens.focus, lens.kick) * z;
        eta = thin_map(lens.focus, lens.bend) * eta;
        alpha += lens.focus * beta;

        solution.orbit.push(Vector2::new(z.x, z.y));
        solution.dispersion.push(Vector2::new(eta.x, eta.y));
        solution.beta.push(beta);
        solution.alpha.push(alpha);
        solution.mu.push(mu);

        let gamma = (1.0 + alpha * alpha) / beta;
        mu += l.atan2(beta - l * alpha) / (2.0 * PI);
        beta = beta - 2.0 * l * alpha + l * l * gamma;
        alpha -= l * gamma;
        z = drift_map(l) * z;
        eta = drift_map(l) * eta;
    }
    solution.tune = mu;
    Ok(solution)
}

/// Computes closed orbit, periodic optics and dispersion after every element.
///
/// `elements` must be sorted by `s` and lie in `[0, length)`.
pub fn compute(
    elements: &[ResolvedElement],
    length: f64,
    options: &TwissOptions,
) -> Result<TwissTable, OracleError> {
    let Some(first) = elements.first() else {
        return Ok(TwissTable {
            length,
            ..Default::default()
        });
    };
    let drifts: Vec<f64> = elements
        .windows(2)
        .map(|pair| pair[1].s - pair[0].s)
        .chain(std::iter::once(
            length - elements[elements.len() - 1].s + first.s,
        ))
        .collect();

    let h = solve_plane(elements, &drifts, Plane::Horizontal)?;
    let v = solve_plane(elements, &drifts, Plane::Vertical)?;

    let rows = elements
        .iter()
        .enumerate()
        .map(|(i, e)| TwissRow {
            name: e.name.to_string(),
            s: e.s,
            x: h.orbit[i].x,
            px: h.orbit[i].y,
            y: v.orbit[i].x,
            py: v.orbit[i].y,
            betx: h.beta[i],
            bety: v.beta[i],
            alfx: h.alpha[i],
            alfy: v.alpha[i],
            mux: h.mu[i],
            muy: v.mu[i],
            dx: h.dispersion[i].x,
            dpx: h.dispersion[i].y,
            dy: v.dispersion[i].x,
            dpy: v.dispersion[i].y,
        })
        .collect();

    let mut table = TwissTable {
        rows,
        length,
        qx: Some(h.tune),
        qy: Some(v.tune),
    };
    if options.reverse {
        reverse(&mut table, h.tune, v.tune);
    }
    if options.skip_global_quantities {
        table.qx = None;
        table.qy = None;
    }
    Ok(table)
}

/// Re-expresses a table for a beam travelling in the opposite direction.
fn reverse(table: &mut TwissTable, qx: f64, qy: f64) {
    let length = table.length;
    table.rows.reverse();
    for row in &mut table.rows {
        row.s = wrap_s(length - row.s, length);
        row.x = -row.x;
        row.py = -row.py;
        row.alfx = -row.alfx;
        row.alfy = -row.alfy;
        row.dx = -row.dx;
        row.dpy = -row.dpy;
        row.mux = qx - row.mux;
        row.muy = qy - row.muy;
    }
    table.rows.sort_by(|a, b| a.s.total_cmp(&b.s));
}
