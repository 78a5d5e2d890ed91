use crate::core::models::aperture::ApertureRow;
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn centred(x: f64, y: f64, half_x: f64, half_y: f64) -> Self {
        Self {
            x_min: x - half_x,
            x_max: x + half_x,
            y_min: y - half_y,
            y_max: y + half_y,
        }
    }

    /// Corners in counter-clockwise order starting bottom-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x_min, self.y_min),
            (self.x_max, self.y_min),
            (self.x_max, self.y_max),
            (self.x_min, self.y_max),
        ]
    }
}

/// Rectangle `|x| <= a1, |y| <= a2` intersected with the ellipse
/// `(x/a3)^2 + (y/a4)^2 <= 1`. Without an ellipse the shape is the rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureShape {
    pub a1: f64,
    pub a2: f64,
    pub ellipse: Option<(f64, f64)>,
}

impl ApertureShape {
    pub fn from_row(row: &ApertureRow) -> Self {
        Self {
            a1: row.aper_1,
            a2: row.aper_2,
            ellipse: row.aper_3.zip(row.aper_4),
        }
    }

    /// Shrinks the horizontal semi-axes by `dx` and the vertical ones by `dy`,
    /// never below zero.
    pub fn shrink(&self, dx: f64, dy: f64) -> Self {
        Self {
            a1: (self.a1 - dx).max(0.0),
            a2: (self.a2 - dy).max(0.0),
            ellipse: self
                .ellipse
                .map(|(a3, a4)| ((a3 - dx).max(0.0), (a4 - dy).max(0.0))),
        }
    }

    /// Largest `|x|` inside the shape at height `y`; negative outside.
    pub fn half_width_at(&self, y: f64) -> f64 {
        if y.abs() > self.a2 {
            return -1.0;
        }
        match self.ellipse {
            None => self.a1,
            Some((a3, a4)) => {
                let ratio = if a4 > 0.0 { y / a4 } else { f64::INFINITY };
                if ratio.abs() > 1.0 {
                    return -1.0;
                }
                self.a1.min(a3 * (1.0 - ratio * ratio).sqrt())
            }
        }
    }

    /// Largest `|y|` inside the shape at abscissa `x`; negative outside.
    pub fn half_height_at(&self, x: f64) -> f64 {
        let transposed = Self {
            a1: self.a2,
            a2: self.a1,
            ellipse: self.ellipse.map(|(a3, a4)| (a4, a3)),
        };
        transposed.half_width_at(x)
    }

    /// Boundary sampled at `points` angles, counter-clockwise from `+x`.
    ///
    /// Each ellipse point is clamped to the rectangle, which traces the
    /// intersection boundary exactly in every quadrant.
    pub fn polygon(&self, points: usize) -> Vec<(f64, f64)> {
        match self.ellipse {
            None => vec![
                (self.a1, -self.a2),
                (self.a1, self.a2),
                (-self.a1, self.a2),
                (-self.a1, -self.a2),
            ],
            Some((a3, a4)) => (0..points)
                .map(|i| {
                    let t = TAU * i as f64 / points as f64;
                    (
                        (a3 * t.cos()).clamp(-self.a1, self.a1),
                        (a4 * t.sin()).clamp(-self.a2, self.a2),
                    )
                })
                .collect(),
        }
    }
}

/// Normalised margins of a centred envelope against an aperture along the
/// horizontal line through the orbit (`n1_x`) and the vertical line (`n1_y`).
///
/// Each value is the minimum over both sides, floored at zero. A zero beam
/// size gives infinity.
pub fn normalised_margins(
    shape: &ApertureShape,
    orbit: (f64, f64),
    sigma: (f64, f64),
) -> (f64, f64) {
    let (x, y) = orbit;
    let margin = |half: f64, centre: f64, sigma: f64| -> f64 {
        if half < 0.0 || centre.abs() > half {
            return 0.0;
        }
        if sigma <= 0.0 {
            return f64::INFINITY;
        }
        ((half - centre) / sigma)
            .min((half + centre) / sigma)
            .max(0.0)
    };
    (
        margin(shape.half_width_at(y), x, sigma.0),
        margin(shape.half_height_at(x), y, sigma.1),
    )
}
