//! NURBS (Non-Uniform Rational B-Spline) trimming curves and surfaces.
//!
//! Both primitives are rational: every control point carries a weight.
//! Knot vectors are clamped, as produced by `knot::pad_clamped_knots`.

pub mod basis;
pub mod knot;

use crate::math::{Point2, Point3, Vector2, Vector3};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// A rational B-spline curve in the (u, v) parameter plane of a surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NurbsCurve2 {
    pub degree: usize,
    pub knots: Vec<f64>,
    pub control_points: Vec<Point2>,
    pub weights: Vec<f64>,
}

impl NurbsCurve2 {
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point2>,
        weights: Vec<f64>,
    ) -> Self {
        assert_eq!(control_points.len(), weights.len());
        assert!(
            knot::validate_knot_vector(&knots, degree, control_points.len()),
            "Invalid knot vector: {} knots for degree {} with {} control points",
            knots.len(),
            degree,
            control_points.len()
        );
        Self {
            degree,
            knots,
            control_points,
            weights,
        }
    }

    pub fn evaluate(&self, t: f64) -> Point2 {
        self.derivative(t).0
    }

    /// Point and first derivative at `t`.
    pub fn derivative(&self, t: f64) -> (Point2, Vector2) {
        let b = basis::evaluate(&self.knots, self.degree, self.control_points.len(), t);
        let mut sum = Homogeneous::<2, 1>::new();
        for j in 0..b.values.len() {
            let k = b.pole(j);
            sum.add(self.control_points[k].coords, self.weights[k], b.values[j], [b.derivatives[j]]);
        }
        let (c, [d]) = sum.project();
        (Point2::from(c), d)
    }

    /// The parameter domain `[t_min, t_max]`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.knots.len() - self.degree - 1],
        )
    }

    /// The same curve traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let (t0, t1) = self.domain();
        let knots = self.knots.iter().rev().map(|k| t0 + t1 - k).collect();
        let mut control_points = self.control_points.clone();
        control_points.reverse();
        let mut weights = self.weights.clone();
        weights.reverse();
        Self {
            degree: self.degree,
            knots,
            control_points,
            weights,
        }
    }
}

/// A rational B-spline surface patch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    /// Control point grid, indexed `[u_index][v_index]`.
    pub control_points: Vec<Vec<Point3>>,
    /// Weight grid, same layout as control points.
    pub weights: Vec<Vec<f64>>,
}

impl NurbsSurface {
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        control_points: Vec<Vec<Point3>>,
        weights: Vec<Vec<f64>>,
    ) -> Self {
        let nu = control_points.len();
        let nv = control_points.first().map_or(0, Vec::len);
        assert!(
            knot::validate_knot_vector(&knots_u, degree_u, nu),
            "Invalid U knot vector"
        );
        assert!(
            knot::validate_knot_vector(&knots_v, degree_v, nv),
            "Invalid V knot vector"
        );
        assert_eq!(weights.len(), nu);
        for (i, row) in weights.iter().enumerate() {
            assert_eq!(
                row.len(),
                nv,
                "Weight row {i} has {} elements, expected {nv}",
                row.len()
            );
        }
        Self {
            degree_u,
            degree_v,
            knots_u,
            knots_v,
            control_points,
            weights,
        }
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3 {
        self.derivatives(u, v).0
    }

    /// Point and partial derivatives `(S, dS/du, dS/dv)` at `(u, v)`.
    pub fn derivatives(&self, u: f64, v: f64) -> (Point3, Vector3, Vector3) {
        let (nu, nv) = self.pole_counts();
        let bu = basis::evaluate(&self.knots_u, self.degree_u, nu, u);
        let bv = basis::evaluate(&self.knots_v, self.degree_v, nv, v);

        let mut sum = Homogeneous::<3, 2>::new();
        for i in 0..bu.values.len() {
            let ku = bu.pole(i);
            for j in 0..bv.values.len() {
                let kv = bv.pole(j);
                sum.add(
                    self.control_points[ku][kv].coords,
                    self.weights[ku][kv],
                    bu.values[i] * bv.values[j],
                    [bu.derivatives[i] * bv.values[j], bu.values[i] * bv.derivatives[j]],
                );
            }
        }
        let (c, [du, dv]) = sum.project();
        (Point3::from(c), du, dv)
    }

    /// Parameter domain in U.
    pub fn domain_u(&self) -> (f64, f64) {
        (
            self.knots_u[self.degree_u],
            self.knots_u[self.knots_u.len() - self.degree_u - 1],
        )
    }

    /// Parameter domain in V.
    pub fn domain_v(&self) -> (f64, f64) {
        (
            self.knots_v[self.degree_v],
            self.knots_v[self.knots_v.len() - self.degree_v - 1],
        )
    }

    /// Number of poles in U and V.
    pub fn pole_counts(&self) -> (usize, usize) {
        (self.control_points.len(), self.control_points[0].len())
    }
}

/// Running sums of a rational combination of poles: the weighted point,
/// the weight, and their derivatives along `D` parameter directions.
struct Homogeneous<const N: usize, const D: usize> {
    point: SVector<f64, N>,
    weight: f64,
    d_point: [SVector<f64, N>; D],
    d_weight: [f64; D],
}

impl<const N: usize, const D: usize> Homogeneous<N, D> {
    fn new() -> Self {
        Self {
            point: SVector::zeros(),
            weight: 0.0,
            d_point: [SVector::zeros(); D],
            d_weight: [0.0; D],
        }
    }

    /// Add a pole of weight `w` with basis value `b` and basis
    /// derivatives `db`.
    fn add(&mut self, pole: SVector<f64, N>, w: f64, b: f64, db: [f64; D]) {
        self.point += pole * (b * w);
        self.weight += b * w;
        for k in 0..D {
            self.d_point[k] += pole * (db[k] * w);
            self.d_weight[k] += db[k] * w;
        }
    }

    /// Cartesian point and derivatives, by the quotient rule.
    fn project(&self) -> (SVector<f64, N>, [SVector<f64, N>; D]) {
        let c = self.point / self.weight;
        let d = std::array::from_fn(|k| (self.d_point[k] - c * self.d_weight[k]) / self.weight);
        (c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::knot::pad_clamped_knots;

    /// A rational quadratic quarter circle of radius 2 in the (u, v) plane.
    fn quarter_arc() -> NurbsCurve2 {
        NurbsCurve2::new(
            2,
            pad_clamped_knots(&[0.0, 1.0], 2),
            vec![
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            vec![1.0, std::f64::consts::FRAC_1_SQRT_2, 1.0],
        )
    }

    fn bilinear() -> NurbsSurface {
        NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 4.0, 0.0)],
                vec![Point3::new(3.0, 0.0, 0.0), Point3::new(3.0, 4.0, 1.0)],
            ],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )
    }

    #[test]
    fn arc_stays_on_circle() {
        let arc = quarter_arc();
        for i in 0..=10 {
            let p = arc.evaluate(i as f64 / 10.0);
            assert!((p.coords.norm() - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn arc_derivative_matches_finite_difference() {
        let arc = quarter_arc();
        let t = 0.35;
        let h = 1e-7;
        let (_, d) = arc.derivative(t);
        let fd = (arc.evaluate(t + h) - arc.evaluate(t - h)) / (2.0 * h);
        assert!((d - fd).norm() < 1e-5, "{d:?} vs {fd:?}");
    }

    #[test]
    fn reversed_curve_swaps_ends() {
        let arc = quarter_arc();
        let rev = arc.reversed();
        let (t0, t1) = rev.domain();
        assert!((rev.evaluate(t0) - arc.evaluate(1.0)).norm() < 1e-12);
        assert!((rev.evaluate(t1) - arc.evaluate(0.0)).norm() < 1e-12);
        assert!((rev.evaluate(0.3) - arc.evaluate(0.7)).norm() < 1e-12);
    }

    #[test]
    fn bilinear_corners() {
        let s = bilinear();
        assert!((s.evaluate(0.0, 0.0) - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-14);
        assert!((s.evaluate(1.0, 0.0) - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-14);
        assert!((s.evaluate(1.0, 1.0) - Point3::new(3.0, 4.0, 1.0)).norm() < 1e-14);
    }

    #[test]
    fn surface_derivatives_match_finite_difference() {
        let s = bilinear();
        let (u, v, h) = (0.3, 0.6, 1e-7);
        let (_, du, dv) = s.derivatives(u, v);
        let fd_u = (s.evaluate(u + h, v) - s.evaluate(u - h, v)) / (2.0 * h);
        let fd_v = (s.evaluate(u, v + h) - s.evaluate(u, v - h)) / (2.0 * h);
        assert!((du - fd_u).norm() < 1e-5);
        assert!((dv - fd_v).norm() < 1e-5);
    }
}
