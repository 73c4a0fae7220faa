//! Knot vector utilities for NURBS curves and surfaces.

/// Number of real (unpadded) knots a source modeler stores for a
/// clamped B-spline with `n_ctrl` control points of the given degree.
pub fn real_knot_count(degree: usize, n_ctrl: usize) -> usize {
    n_ctrl + 1 - degree
}

/// Pad a real knot array into a clamped knot vector.
///
/// Source modelers store `n_ctrl - degree + 1` knots; the kernel wants
/// `n_ctrl + degree + 1` with `degree + 1` multiplicity at both ends. The
/// first and last real knot are each duplicated `degree` times.
pub fn pad_clamped_knots(real_knots: &[f64], degree: usize) -> Vec<f64> {
    assert!(
        real_knots.len() >= 2,
        "A real knot array needs at least 2 values, got {}",
        real_knots.len()
    );
    let first = real_knots[0];
    let last = real_knots[real_knots.len() - 1];

    let mut knots = Vec::with_capacity(real_knots.len() + 2 * degree);
    knots.extend(std::iter::repeat(first).take(degree));
    knots.extend_from_slice(real_knots);
    knots.extend(std::iter::repeat(last).take(degree));
    knots
}

/// Find multiplicity of knot value `u` in the knot vector.
pub fn knot_multiplicity(u: f64, knots: &[f64], tol: f64) -> usize {
    knots.iter().filter(|&&k| (k - u).abs() < tol).count()
}

/// Check if a knot vector is valid:
/// - Non-decreasing
/// - Correct length: `n_ctrl + degree + 1`
pub fn validate_knot_vector(knots: &[f64], degree: usize, n_ctrl: usize) -> bool {
    if knots.len() != n_ctrl + degree + 1 {
        return false;
    }
    knots.windows(2).all(|w| w[1] >= w[0])
}

/// True when the first and last `degree + 1` knots are respectively equal.
pub fn is_clamped(knots: &[f64], degree: usize) -> bool {
    if knots.len() < 2 * (degree + 1) {
        return false;
    }
    let head = &knots[..=degree];
    let tail = &knots[knots.len() - degree - 1..];
    head.iter().all(|&k| k == head[0]) && tail.iter().all(|&k| k == tail[0])
}
