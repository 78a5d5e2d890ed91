/// A table row that carries a longitudinal position `s` along the ring.
pub trait Longitudinal {
    fn s(&self) -> f64;
    fn set_s(&mut self, s: f64);
}

/// Positions closer than this fraction of the ring length to its end are the
/// origin seen through rounding.
const WRAP_TOLERANCE: f64 = 1e-9;

/// Wraps a longitudinal coordinate into `[0, length)`.
pub fn wrap_s(s: f64, length: f64) -> f64 {
    if length <= 0.0 {
        return s;
    }
    let wrapped = s.rem_euclid(length);
    if length - wrapped <= WRAP_TOLERANCE * length {
        0.0
    } else {
        wrapped
    }
}

/// Moves the origin of `rows` to `origin` and re-sorts them by the new `s`.
///
/// The sort is stable, so rows sharing a position keep their relative order.
pub fn shift_rows<R: Longitudinal>(rows: &mut [R], origin: f64, length: f64) {
    if origin == 0.0 {
        return;
    }
    for row in rows.iter_mut() {
        let shifted = wrap_s(row.s() - origin, length);
        row.set_s(shifted);
    }
    rows.sort_by(|a, b| a.s().total_cmp(&b.s()));
}

/// Index of the row whose `s` is closest to `s`, assuming rows are sorted by `s`.
pub fn nearest_index<R: Longitudinal>(rows: &[R], s: f64) -> Option<usize> {
    if rows.is_empty() {
        return None;
    }
    let upper = rows.partition_point(|row| row.s() < s);
    if upper == 0 {
        return Some(0);
    }
    if upper == rows.len() {
        return Some(rows.len() - 1);
    }
    let below = s - rows[upper - 1].s();
    let above = rows[upper].s() - s;
    Some(if above < below { upper } else { upper - 1 })
}
