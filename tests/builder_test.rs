//! Tests for geometry construction from source records.

mod common;

use approx::assert_relative_eq;
use brepweld::builder::{build_surface, build_trim_curve};
use brepweld::math::Point3;
use brepweld::nurbs::knot::{is_clamped, pad_clamped_knots, real_knot_count, validate_knot_vector};
use common::*;
use proptest::prelude::*;

#[test]
fn quarter_cylinder_stays_on_radius() {
    let surface = build_surface(&quarter_cylinder(50.0, 20.0), 1.0).unwrap();
    for i in 0..=10 {
        let u = i as f64 / 10.0;
        let p = surface.evaluate(u, 0.5);
        assert_relative_eq!((p.x * p.x + p.y * p.y).sqrt(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 10.0, epsilon = 1e-9);
    }
}

#[test]
fn cylinder_normal_points_outward() {
    let surface = build_surface(&quarter_cylinder(50.0, 20.0), 1.0).unwrap();
    let n = surface.normal(0.0, 0.5);
    assert_relative_eq!(n.x, 1.0, epsilon = 1e-9);
}

#[test]
fn plane_corners_match_record() {
    let surface = build_surface(&plane([1.0, 2.0, 3.0], [10.0, 0.0, 0.0], [0.0, 5.0, 0.0]), 1.0).unwrap();
    assert_relative_eq!(surface.evaluate(1.0, 1.0), Point3::new(11.0, 7.0, 3.0), epsilon = 1e-12);
}

#[test]
fn trim_curve_keeps_parameter_range() {
    let curve = build_trim_curve(&line(1, None, [0.2, 0.0], [0.8, 0.0])).unwrap();
    assert_eq!(curve.domain(), (0.0, 1.0));
    assert_relative_eq!(curve.evaluate(0.5).x, 0.5, epsilon = 1e-12);
}

proptest! {
    #[test]
    fn padded_knots_are_clamped(
        degree in 1usize..6,
        extra in 0usize..8,
        steps in prop::collection::vec(0.01f64..2.0, 8),
    ) {
        let poles = degree + 1 + extra;
        let count = real_knot_count(degree, poles);
        let mut real = vec![0.0];
        for step in steps.iter().take(count - 1) {
            real.push(real[real.len() - 1] + step);
        }
        prop_assume!(real.len() == count);

        let knots = pad_clamped_knots(&real, degree);
        prop_assert_eq!(knots.len(), poles + degree + 1);
        prop_assert!(is_clamped(&knots, degree));
        prop_assert!(validate_knot_vector(&knots, degree, poles));
    }
}
