//! Trimming curves.
//!
//! A `RestrictionCurve` is a 2D NURBS curve living in the parameter plane
//! of its carrier surface. Its 3D image is obtained by evaluating the
//! surface at the curve's (u, v) points.

use crate::math::{Point2, Point3, Vector2};
use crate::nurbs::NurbsCurve2;
use crate::surface::Surface;
use crate::topo::SurfaceId;

/// A trimming curve in the parameter plane of its carrier surface.
pub type TrimCurve = NurbsCurve2;

/// Samples used for length estimation and coarse point projection.
const CURVE_SAMPLES: usize = 32;

/// A 2D trimming curve bound to its carrier surface.
#[derive(Clone, Debug, PartialEq)]
pub struct RestrictionCurve {
    pub surface: SurfaceId,
    pub curve: NurbsCurve2,
}

impl RestrictionCurve {
    pub fn new(surface: SurfaceId, curve: NurbsCurve2) -> Self {
        Self { surface, curve }
    }

    /// Parameter domain of the 2D curve.
    pub fn domain(&self) -> (f64, f64) {
        self.curve.domain()
    }

    /// Point in the surface parameter plane.
    pub fn uv(&self, t: f64) -> Point2 {
        self.curve.evaluate(t)
    }

    /// Tangent in the surface parameter plane.
    pub fn uv_tangent(&self, t: f64) -> Vector2 {
        self.curve.derivative(t).1
    }

    /// 3D point at curve parameter `t`.
    pub fn point(&self, surface: &Surface, t: f64) -> Point3 {
        let uv = self.uv(t);
        surface.evaluate(uv.x, uv.y)
    }

    /// 3D points at the start and end of the curve.
    pub fn end_points(&self, surface: &Surface) -> (Point3, Point3) {
        let (t0, t1) = self.domain();
        (self.point(surface, t0), self.point(surface, t1))
    }

    /// Parameters of `n + 1` evenly spaced samples.
    pub fn sample_parameters(&self, n: usize) -> Vec<f64> {
        let (t0, t1) = self.domain();
        (0..=n)
            .map(|i| t0 + (t1 - t0) * i as f64 / n as f64)
            .collect()
    }

    /// Polyline estimate of the 3D length.
    pub fn length(&self, surface: &Surface) -> f64 {
        let params = self.sample_parameters(CURVE_SAMPLES);
        params
            .windows(2)
            .map(|w| (self.point(surface, w[1]) - self.point(surface, w[0])).norm())
            .sum()
    }

    /// Length of the 2D curve in the parameter plane.
    pub fn uv_length(&self) -> f64 {
        let params = self.sample_parameters(CURVE_SAMPLES);
        params
            .windows(2)
            .map(|w| (self.uv(w[1]) - self.uv(w[0])).norm())
            .sum()
    }

    /// Parameter of the curve point closest to `point` in 3D.
    ///
    /// Coarse sampling followed by golden-section search on the bracketing
    /// interval; the curve is not assumed to be convex in distance globally.
    pub fn project(&self, surface: &Surface, point: &Point3) -> f64 {
        let params = self.sample_parameters(CURVE_SAMPLES);
        let dist = |t: f64| (self.point(surface, t) - point).norm_squared();

        let mut best = 0;
        let mut best_dist = f64::MAX;
        for (i, &t) in params.iter().enumerate() {
            let d = dist(t);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }

        let mut lo = params[best.saturating_sub(1)];
        let mut hi = params[(best + 1).min(params.len() - 1)];
        let ratio = (5.0_f64.sqrt() - 1.0) * 0.5;
        let mut a = hi - ratio * (hi - lo);
        let mut b = lo + ratio * (hi - lo);
        let mut fa = dist(a);
        let mut fb = dist(b);
        for _ in 0..60 {
            if fa < fb {
                hi = b;
                b = a;
                fb = fa;
                a = hi - ratio * (hi - lo);
                fa = dist(a);
            } else {
                lo = a;
                a = b;
                fa = fb;
                b = lo + ratio * (hi - lo);
                fb = dist(b);
            }
            if (hi - lo).abs() < 1e-13 {
                break;
            }
        }
        let t = (lo + hi) * 0.5;
        if dist(t) <= best_dist {
            t
        } else {
            params[best]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::knot::pad_clamped_knots;
    use crate::nurbs::NurbsSurface;
    use crate::topo::Model;

    fn plane(size: f64) -> Surface {
        Surface::new(NurbsSurface::new(
            1,
            1,
            pad_clamped_knots(&[0.0, 1.0], 1),
            pad_clamped_knots(&[0.0, 1.0], 1),
            vec![
                vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, size, 0.0)],
                vec![Point3::new(size, 0.0, 0.0), Point3::new(size, size, 0.0)],
            ],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        ))
    }

    fn diagonal(model: &mut Model, surface: Surface) -> RestrictionCurve {
        let id = model.add_surface(surface);
        RestrictionCurve::new(
            id,
            NurbsCurve2::new(
                1,
                pad_clamped_knots(&[0.0, 1.0], 1),
                vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)],
                vec![1.0, 1.0],
            ),
        )
    }

    #[test]
    fn diagonal_length() {
        let mut model = Model::new();
        let surface = plane(10.0);
        let curve = diagonal(&mut model, surface.clone());
        assert!((curve.length(&surface) - 200.0_f64.sqrt()).abs() < 1e-9);
        assert!((curve.uv_length() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn projection_recovers_parameter() {
        let mut model = Model::new();
        let surface = plane(10.0);
        let curve = diagonal(&mut model, surface.clone());
        let p = curve.point(&surface, 0.615);
        assert!((curve.project(&surface, &p) - 0.615).abs() < 1e-7);
    }
}
