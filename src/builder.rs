//! Geometry construction from source records.
//!
//! Turns raw control points, weights and real knot arrays into immutable
//! kernel primitives. Real knots are padded into clamped knot vectors and
//! surface control points are converted to millimetres exactly once, here.

use crate::curve::TrimCurve;
use crate::math::{Point2, Point3, Vector4};
use crate::nurbs::knot::{pad_clamped_knots, real_knot_count};
use crate::nurbs::NurbsSurface;
use crate::source::{ReferenceFrame, SurfaceRecord, TrimCurveRecord};
use crate::surface::Surface;
use tracing::debug;

/// Build a surface from its record, scaling source units by `unit_scale`.
///
/// Returns `None` when the record has no control points. Pole and knot
/// counts that disagree are a contract violation and panic.
pub fn build_surface(record: &SurfaceRecord, unit_scale: f64) -> Option<Surface> {
    if record.control_points.is_empty() || record.poles_u == 0 || record.poles_v == 0 {
        debug!("surface record without control points skipped");
        return None;
    }
    assert!(
        record.poles_u > record.degree_u && record.poles_v > record.degree_v,
        "Surface needs more poles than its degree: {}x{} poles for degree {}x{}",
        record.poles_u,
        record.poles_v,
        record.degree_u,
        record.degree_v
    );
    assert_eq!(
        record.control_points.len(),
        record.poles_u * record.poles_v,
        "Control point count does not match {}x{} poles",
        record.poles_u,
        record.poles_v
    );
    assert_eq!(
        record.knots_u.len(),
        real_knot_count(record.degree_u, record.poles_u),
        "U knot count does not match poles and degree"
    );
    assert_eq!(
        record.knots_v.len(),
        real_knot_count(record.degree_v, record.poles_v),
        "V knot count does not match poles and degree"
    );

    let transform = match record.frame {
        ReferenceFrame::World => None,
        ReferenceFrame::Local | ReferenceFrame::Parent => record.transform,
    };

    let mut control_points = Vec::with_capacity(record.poles_u);
    let mut weights = Vec::with_capacity(record.poles_u);
    for row in record.control_points.chunks(record.poles_v) {
        let mut points = Vec::with_capacity(record.poles_v);
        let mut row_weights = Vec::with_capacity(record.poles_v);
        for &[x, y, z, w] in row {
            let mut p = Point3::new(x, y, z);
            if let Some(m) = transform {
                let h = m * Vector4::new(x, y, z, 1.0);
                p = Point3::new(h.x, h.y, h.z);
            }
            points.push(Point3::from(p.coords * unit_scale));
            row_weights.push(w);
        }
        control_points.push(points);
        weights.push(row_weights);
    }

    Some(Surface::new(NurbsSurface::new(
        record.degree_u,
        record.degree_v,
        pad_clamped_knots(&record.knots_u, record.degree_u),
        pad_clamped_knots(&record.knots_v, record.degree_v),
        control_points,
        weights,
    )))
}

/// Build a 2D trimming curve. A `reversed` record yields the reversed curve.
///
/// Returns `None` when the record has no control points.
pub fn build_trim_curve(record: &TrimCurveRecord) -> Option<TrimCurve> {
    if record.control_points.is_empty() {
        debug!(curve = record.id.0, "trim curve without control points skipped");
        return None;
    }
    assert!(
        record.control_points.len() > record.degree,
        "Trim curve {} needs more than {} control points",
        record.id.0,
        record.degree
    );
    assert_eq!(
        record.knots.len(),
        real_knot_count(record.degree, record.control_points.len()),
        "Trim curve {} knot count does not match poles and degree",
        record.id.0
    );

    let control_points = record
        .control_points
        .iter()
        .map(|&[u, v, _]| Point2::new(u, v))
        .collect();
    let weights = record.control_points.iter().map(|p| p[2]).collect();
    let curve = TrimCurve::new(
        record.degree,
        pad_clamped_knots(&record.knots, record.degree),
        control_points,
        weights,
    );
    Some(if record.reversed { curve.reversed() } else { curve })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix4;
    use crate::nurbs::knot::is_clamped;
    use crate::source::SourceCurveId;
    use approx::assert_relative_eq;

    fn bilinear(frame: ReferenceFrame, transform: Option<Matrix4>) -> SurfaceRecord {
        SurfaceRecord {
            degree_u: 1,
            degree_v: 1,
            poles_u: 2,
            poles_v: 2,
            knots_u: vec![0.0, 1.0],
            knots_v: vec![0.0, 1.0],
            control_points: vec![
                [0.0, 0.0, 0.0, 1.0],
                [0.0, 2.0, 0.0, 1.0],
                [2.0, 0.0, 0.0, 1.0],
                [2.0, 2.0, 0.0, 1.0],
            ],
            frame,
            transform,
        }
    }

    #[test]
    fn knots_are_padded_and_clamped() {
        let surface = build_surface(&bilinear(ReferenceFrame::World, None), 1.0).unwrap();
        let nurbs = surface.nurbs();
        assert_eq!(nurbs.knots_u, vec![0.0, 0.0, 1.0, 1.0]);
        assert!(is_clamped(&nurbs.knots_v, 1));
    }

    #[test]
    fn units_scale_once() {
        let surface = build_surface(&bilinear(ReferenceFrame::World, None), 10.0).unwrap();
        let p = surface.evaluate(1.0, 1.0);
        assert_relative_eq!(p.x, 20.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn local_frame_applies_transform_before_scaling() {
        let shift = Matrix4::new_translation(&crate::math::Vector3::new(1.0, 0.0, 0.0));
        let surface = build_surface(&bilinear(ReferenceFrame::Local, Some(shift)), 10.0).unwrap();
        let p = surface.evaluate(0.0, 0.0);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn world_frame_ignores_transform() {
        let shift = Matrix4::new_translation(&crate::math::Vector3::new(5.0, 0.0, 0.0));
        let surface = build_surface(&bilinear(ReferenceFrame::World, Some(shift)), 1.0).unwrap();
        assert_relative_eq!(surface.evaluate(0.0, 0.0).x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_records_yield_nothing() {
        let mut record = bilinear(ReferenceFrame::World, None);
        record.control_points.clear();
        assert!(build_surface(&record, 1.0).is_none());

        let curve = TrimCurveRecord {
            id: SourceCurveId(1),
            degree: 1,
            knots: vec![],
            control_points: vec![],
            twin: None,
            reversed: false,
        };
        assert!(build_trim_curve(&curve).is_none());
    }

    #[test]
    #[should_panic(expected = "knot count")]
    fn wrong_knot_count_panics() {
        let mut record = bilinear(ReferenceFrame::World, None);
        record.knots_u = vec![0.0, 0.5, 1.0];
        build_surface(&record, 1.0);
    }

    #[test]
    fn reversed_curve_swaps_ends() {
        let record = TrimCurveRecord {
            id: SourceCurveId(3),
            degree: 1,
            knots: vec![0.0, 1.0],
            control_points: vec![[0.0, 0.0, 1.0], [1.0, 0.5, 1.0]],
            twin: None,
            reversed: true,
        };
        let curve = build_trim_curve(&record).unwrap();
        let (t0, t1) = curve.domain();
        assert_relative_eq!(curve.evaluate(t0).x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(curve.evaluate(t1).y, 0.0, epsilon = 1e-12);
    }
}
