//! Carrier surfaces of B-Rep faces.
//!
//! A `Surface` is an immutable NURBS patch expressed in millimetres. Faces
//! reference surfaces by id; several faces may share one surface when a
//! trimmed surface has more than one trim region.

use crate::math::{Point2, Point3, Vector3, ZERO_LENGTH};
use crate::nurbs::NurbsSurface;
use serde::{Deserialize, Serialize};

/// Iso-line samples used to estimate 3D extents of a patch.
const ISO_SAMPLES: usize = 16;

/// A geometric surface carried by topology `Face` entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    nurbs: NurbsSurface,
}

impl Surface {
    pub fn new(nurbs: NurbsSurface) -> Self {
        Self { nurbs }
    }

    pub fn nurbs(&self) -> &NurbsSurface {
        &self.nurbs
    }

    /// Evaluate the surface at parameters `(u, v)`.
    pub fn evaluate(&self, u: f64, v: f64) -> Point3 {
        self.nurbs.evaluate(u, v)
    }

    /// Point and first partial derivatives at `(u, v)`.
    pub fn derivatives(&self, u: f64, v: f64) -> (Point3, Vector3, Vector3) {
        self.nurbs.derivatives(u, v)
    }

    /// Unit normal `dS/du x dS/dv` at `(u, v)`.
    ///
    /// At a singular point (collapsed pole row) the normal is taken from a
    /// point nudged towards the middle of the domain.
    pub fn normal(&self, u: f64, v: f64) -> Vector3 {
        let (_, du, dv) = self.derivatives(u, v);
        let n = du.cross(&dv);
        let len = n.norm();
        if len > ZERO_LENGTH {
            return n / len;
        }

        let ((u0, u1), (v0, v1)) = self.domain();
        let (uc, vc) = ((u0 + u1) * 0.5, (v0 + v1) * 0.5);
        let mut nudged = Vector3::zeros();
        for k in 1..=4 {
            let f = 1e-3 * k as f64;
            let (_, du, dv) = self.derivatives(u + (uc - u) * f, v + (vc - v) * f);
            nudged = du.cross(&dv);
            if nudged.norm() > ZERO_LENGTH {
                break;
            }
        }
        let len = nudged.norm();
        if len > ZERO_LENGTH {
            nudged / len
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        }
    }

    /// Parameter domain `((u_min, u_max), (v_min, v_max))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (self.nurbs.domain_u(), self.nurbs.domain_v())
    }

    /// Length of the polyline through `ISO_SAMPLES` points of an iso-curve.
    fn iso_length(&self, fixed: f64, along_u: bool) -> f64 {
        let ((u0, u1), (v0, v1)) = self.domain();
        let at = |s: f64| {
            if along_u {
                self.evaluate(u0 + (u1 - u0) * s, fixed)
            } else {
                self.evaluate(fixed, v0 + (v1 - v0) * s)
            }
        };
        let mut prev = at(0.0);
        let mut length = 0.0;
        for i in 1..=ISO_SAMPLES {
            let p = at(i as f64 / ISO_SAMPLES as f64);
            length += (p - prev).norm();
            prev = p;
        }
        length
    }

    /// Largest 3D length of the U iso-curves and of the V iso-curves,
    /// sampled at the boundaries and in the middle of the patch.
    pub fn iso_lengths(&self) -> (f64, f64) {
        let ((u0, u1), (v0, v1)) = self.domain();
        let length_u = [v0, (v0 + v1) * 0.5, v1]
            .iter()
            .map(|&v| self.iso_length(v, true))
            .fold(0.0, f64::max);
        let length_v = [u0, (u0 + u1) * 0.5, u1]
            .iter()
            .map(|&u| self.iso_length(u, false))
            .fold(0.0, f64::max);
        (length_u, length_v)
    }

    /// True when the patch is thinner than `tolerance` in one iso-direction.
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        let (lu, lv) = self.iso_lengths();
        lu < tolerance || lv < tolerance
    }

    /// Mean parametric speeds `(|dS/du|, |dS/dv|)` over a coarse grid.
    ///
    /// Used to scale the parameter plane so that 2D algorithms see a metric
    /// close to the 3D one.
    pub fn mean_speeds(&self) -> (f64, f64) {
        let ((u0, u1), (v0, v1)) = self.domain();
        let n = 4;
        let mut su = 0.0;
        let mut sv = 0.0;
        for i in 0..=n {
            for j in 0..=n {
                let u = u0 + (u1 - u0) * i as f64 / n as f64;
                let v = v0 + (v1 - v0) * j as f64 / n as f64;
                let (_, du, dv) = self.derivatives(u, v);
                su += du.norm();
                sv += dv.norm();
            }
        }
        let count = ((n + 1) * (n + 1)) as f64;
        (
            (su / count).max(ZERO_LENGTH),
            (sv / count).max(ZERO_LENGTH),
        )
    }

    /// True when the straight parameter segment from `a` to `b` maps onto
    /// one point within `tolerance`, as along a collapsed pole row.
    pub fn collapses_between(&self, a: &Point2, b: &Point2, tolerance: f64) -> bool {
        let origin = self.evaluate(a.x, a.y);
        (1..=4).all(|k| {
            let p = *a + (*b - *a) * (k as f64 / 4.0);
            (self.evaluate(p.x, p.y) - origin).norm() <= tolerance
        })
    }

    /// Find the parameters `(u, v)` closest to the given 3D point.
    ///
    /// Coarse grid search followed by Gauss-Newton refinement, clamped to
    /// the domain.
    pub fn closest_parameters(&self, point: &Point3) -> (f64, f64) {
        let n = 20;
        let (u_range, v_range) = self.domain();
        let mut best_u = u_range.0;
        let mut best_v = v_range.0;
        let mut best_dist = f64::MAX;

        for i in 0..=n {
            for j in 0..=n {
                let u = u_range.0 + (u_range.1 - u_range.0) * i as f64 / n as f64;
                let v = v_range.0 + (v_range.1 - v_range.0) * j as f64 / n as f64;
                let dist = (self.evaluate(u, v) - point).norm_squared();
                if dist < best_dist {
                    best_dist = dist;
                    best_u = u;
                    best_v = v;
                }
            }
        }

        let mut u = best_u;
        let mut v = best_v;
        for _ in 0..50 {
            let (p, du, dv) = self.derivatives(u, v);
            let diff = p - point;

            // Solve [du·du  du·dv] [Δu] = [-du·diff]
            //       [dv·du  dv·dv] [Δv]   [-dv·diff]
            let a11 = du.dot(&du);
            let a12 = du.dot(&dv);
            let a22 = dv.dot(&dv);
            let b1 = -du.dot(&diff);
            let b2 = -dv.dot(&diff);

            let det = a11 * a22 - a12 * a12;
            if det.abs() < 1e-30 {
                break;
            }

            let delta_u = (a22 * b1 - a12 * b2) / det;
            let delta_v = (a11 * b2 - a12 * b1) / det;
            u = (u + delta_u).clamp(u_range.0, u_range.1);
            v = (v + delta_v).clamp(v_range.0, v_range.1);

            if delta_u.abs() < 1e-12 && delta_v.abs() < 1e-12 {
                break;
            }
        }

        (u, v)
    }
}
