//! B-spline basis functions.
//!
//! Only values and first derivatives are ever needed by the kernel, so
//! both come out of one evaluation of the Cox-de Boor triangle. Knot
//! vectors reaching these routines are clamped (see
//! `knot::pad_clamped_knots`).

/// Knot span containing `t`: `knots[span] <= t < knots[span + 1]`, with
/// `degree <= span < pole_count`.
///
/// Parameters outside the domain are clamped to the first or last
/// non-empty span, so the domain end evaluates on the closing span.
pub fn span_index(knots: &[f64], degree: usize, pole_count: usize, t: f64) -> usize {
    let (lo, hi) = (degree, pole_count - 1);
    if t <= knots[lo] {
        return lo;
    }
    if t >= knots[hi + 1] {
        let mut span = hi;
        while span > lo && knots[span] >= knots[hi + 1] {
            span -= 1;
        }
        return span;
    }
    // Last index in [lo, hi] whose knot is <= t.
    lo + knots[lo..=hi].partition_point(|&k| k <= t) - 1
}

/// `a / b`, or 0 for the empty intervals of repeated knots.
fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// The `degree + 1` basis functions that are non-zero on one span.
#[derive(Clone, Debug, PartialEq)]
pub struct Basis {
    pub span: usize,
    /// `values[j]` belongs to pole `span - degree + j`.
    pub values: Vec<f64>,
    pub derivatives: Vec<f64>,
}

impl Basis {
    /// Index of the pole weighted by `values[j]`.
    pub fn pole(&self, j: usize) -> usize {
        self.span + 1 + j - self.values.len()
    }
}

/// Basis values and first derivatives at `t`.
pub fn evaluate(knots: &[f64], degree: usize, pole_count: usize, t: f64) -> Basis {
    let span = span_index(knots, degree, pole_count, t);

    // row holds the functions of degree d on this span, N[span - d ..= span].
    let mut row = vec![1.0];
    let mut lower = Vec::new();
    for d in 1..=degree {
        let mut next = vec![0.0; d + 1];
        for (j, slot) in next.iter_mut().enumerate() {
            let i = span + j - d;
            if j > 0 {
                *slot += ratio(t - knots[i], knots[i + d] - knots[i]) * row[j - 1];
            }
            if j < d {
                *slot += ratio(knots[i + d + 1] - t, knots[i + d + 1] - knots[i + 1]) * row[j];
            }
        }
        lower = std::mem::replace(&mut row, next);
    }

    let p = degree as f64;
    let derivatives = (0..=degree)
        .map(|j| {
            if degree == 0 {
                return 0.0;
            }
            let i = span + j - degree;
            let mut d = 0.0;
            if j > 0 {
                d += p * ratio(lower[j - 1], knots[i + degree] - knots[i]);
            }
            if j < degree {
                d -= p * ratio(lower[j], knots[i + degree + 1] - knots[i + 1]);
            }
            d
        })
        .collect();

    Basis {
        span,
        values: row,
        derivatives,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::knot::pad_clamped_knots;

    fn padded_cubic() -> Vec<f64> {
        pad_clamped_knots(&[0.0, 1.0, 2.0, 3.0, 4.0], 3)
    }

    #[test]
    fn span_lookup() {
        let knots = padded_cubic();
        assert_eq!(span_index(&knots, 3, 7, 0.0), 3);
        assert_eq!(span_index(&knots, 3, 7, 0.5), 3);
        assert_eq!(span_index(&knots, 3, 7, 1.0), 4);
        assert_eq!(span_index(&knots, 3, 7, 2.5), 5);
        assert_eq!(span_index(&knots, 3, 7, 4.0), 6);
        assert_eq!(span_index(&knots, 3, 7, 9.0), 6);
        assert_eq!(span_index(&knots, 3, 7, -1.0), 3);
    }

    #[test]
    fn values_sum_to_one_and_slopes_to_zero() {
        let knots = padded_cubic();
        for i in 0..=16 {
            let t = 4.0 * i as f64 / 16.0;
            let basis = evaluate(&knots, 3, 7, t);
            let sum: f64 = basis.values.iter().sum();
            let slope: f64 = basis.derivatives.iter().sum();
            assert!((sum - 1.0).abs() < 1e-13, "sum at t={t} is {sum}");
            assert!(slope.abs() < 1e-12, "slope at t={t} is {slope}");
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let knots = padded_cubic();
        let (t, h) = (1.7, 1e-6);
        let basis = evaluate(&knots, 3, 7, t);
        let ahead = evaluate(&knots, 3, 7, t + h);
        let behind = evaluate(&knots, 3, 7, t - h);
        for j in 0..4 {
            let fd = (ahead.values[j] - behind.values[j]) / (2.0 * h);
            assert!((basis.derivatives[j] - fd).abs() < 1e-6);
        }
    }

    #[test]
    fn linear_basis_is_a_lerp() {
        let knots = pad_clamped_knots(&[0.0, 2.0], 1);
        let basis = evaluate(&knots, 1, 2, 0.5);
        assert_eq!(basis.values, vec![0.75, 0.25]);
        assert_eq!(basis.derivatives, vec![-0.5, 0.5]);
        assert_eq!((basis.pole(0), basis.pole(1)), (0, 1));
    }
}
