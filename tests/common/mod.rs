//! Shared scene fixtures for the integration tests.
//!
//! Lengths are in millimetres; assemble with a unit scale of 1.

#![allow(dead_code)]

use brepweld::config::{StitchingTechnique, TessellationCriteria};
use brepweld::source::*;
use brepweld::{Assembler, Session, StitchReport, Stitcher};

pub const SQRT_HALF: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Degree-1 trim curve from `from` to `to`.
pub fn line(id: u64, twin: Option<u64>, from: [f64; 2], to: [f64; 2]) -> TrimCurveRecord {
    TrimCurveRecord {
        id: SourceCurveId(id),
        degree: 1,
        knots: vec![0.0, 1.0],
        control_points: vec![[from[0], from[1], 1.0], [to[0], to[1], 1.0]],
        twin: twin.map(SourceCurveId),
        reversed: false,
    }
}

/// Counter-clockwise boundary of the unit parameter square. Curve `k`
/// gets id `first_id + k` and runs bottom, right, top, left.
pub fn unit_square(first_id: u64, twins: [Option<u64>; 4]) -> TrimBoundaryRecord {
    let corners = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    TrimBoundaryRecord {
        curves: (0..4)
            .map(|k| line(first_id + k as u64, twins[k], corners[k], corners[(k + 1) % 4]))
            .collect(),
    }
}

/// Clockwise square hole `[lo, hi]²` in the parameter plane.
pub fn square_hole(first_id: u64, lo: f64, hi: f64) -> TrimBoundaryRecord {
    let corners = [[lo, lo], [lo, hi], [hi, hi], [hi, lo]];
    TrimBoundaryRecord {
        curves: (0..4)
            .map(|k| line(first_id + k as u64, None, corners[k], corners[(k + 1) % 4]))
            .collect(),
    }
}

/// Bilinear plane `origin + u * du + v * dv` over `[0, 1]²`. Its normal is
/// `du × dv`.
pub fn plane(origin: [f64; 3], du: [f64; 3], dv: [f64; 3]) -> SurfaceRecord {
    let at = |a: f64, b: f64| {
        [
            origin[0] + a * du[0] + b * dv[0],
            origin[1] + a * du[1] + b * dv[1],
            origin[2] + a * du[2] + b * dv[2],
            1.0,
        ]
    };
    SurfaceRecord {
        degree_u: 1,
        degree_v: 1,
        poles_u: 2,
        poles_v: 2,
        knots_u: vec![0.0, 1.0],
        knots_v: vec![0.0, 1.0],
        control_points: vec![at(0.0, 0.0), at(0.0, 1.0), at(1.0, 0.0), at(1.0, 1.0)],
        frame: ReferenceFrame::World,
        transform: None,
    }
}

/// Quarter cylinder of `radius` around z, from the x axis to the y axis,
/// `height` tall. Rational quadratic in u, linear in v, normal outward.
pub fn quarter_cylinder(radius: f64, height: f64) -> SurfaceRecord {
    let r = radius;
    let rows = [[r, 0.0, 1.0], [r, r, SQRT_HALF], [0.0, r, 1.0]];
    let mut control_points = Vec::new();
    for [x, y, w] in rows {
        control_points.push([x, y, 0.0, w]);
        control_points.push([x, y, height, w]);
    }
    SurfaceRecord {
        degree_u: 2,
        degree_v: 1,
        poles_u: 3,
        poles_v: 2,
        knots_u: vec![0.0, 1.0],
        knots_v: vec![0.0, 1.0],
        control_points,
        frame: ReferenceFrame::World,
        transform: None,
    }
}

pub fn patch(surface: SurfaceRecord, boundaries: Vec<TrimBoundaryRecord>) -> TrimmedSurfaceRecord {
    TrimmedSurfaceRecord {
        surface,
        regions: vec![TrimRegionRecord { boundaries }],
        source_orientation: false,
        material_slot: None,
    }
}

pub fn body(name: &str, surfaces: Vec<TrimmedSurfaceRecord>) -> BodyRecord {
    BodyRecord {
        name: name.to_string(),
        shells: vec![ShellRecord { surfaces }],
        material_slot: 0,
        layer: None,
    }
}

/// A `width` × `height` rectangle in the z = 0 plane.
pub fn planar_rect(width: f64, height: f64) -> BodyRecord {
    body(
        "rect",
        vec![patch(
            plane([0.0, 0.0, 0.0], [width, 0.0, 0.0], [0.0, height, 0.0]),
            vec![unit_square(1, [None; 4])],
        )],
    )
}

/// Two 10 mm squares side by side along x in one body. The shared edge at
/// x = 10 carries twin ids (curve 2 on the left, curve 14 on the right).
pub fn twin_patches() -> BodyRecord {
    let left = patch(
        plane([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]),
        vec![unit_square(1, [None, Some(14), None, None])],
    );
    let right = patch(
        plane([10.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]),
        vec![unit_square(11, [None, None, None, Some(2)])],
    );
    body("twins", vec![left, right])
}

/// The two squares of [`twin_patches`] as separate bodies without twin
/// ids. Only sewing can join them.
pub fn split_patches() -> Vec<BodyRecord> {
    vec![
        body(
            "left",
            vec![patch(
                plane([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]),
                vec![unit_square(1, [None; 4])],
            )],
        ),
        body(
            "right",
            vec![patch(
                plane([10.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]),
                vec![unit_square(11, [None; 4])],
            )],
        ),
    ]
}

/// Six planes of a cube of side `size`, with outward normals, one body.
/// No twin ids: sewing closes it.
pub fn cube(size: f64) -> BodyRecord {
    let s = size;
    let faces = [
        ([0.0, 0.0, 0.0], [0.0, s, 0.0], [s, 0.0, 0.0]),
        ([0.0, 0.0, s], [s, 0.0, 0.0], [0.0, s, 0.0]),
        ([0.0, 0.0, 0.0], [s, 0.0, 0.0], [0.0, 0.0, s]),
        ([0.0, s, 0.0], [0.0, 0.0, s], [s, 0.0, 0.0]),
        ([0.0, 0.0, 0.0], [0.0, 0.0, s], [0.0, s, 0.0]),
        ([s, 0.0, 0.0], [0.0, s, 0.0], [0.0, 0.0, s]),
    ];
    body(
        "cube",
        faces
            .iter()
            .enumerate()
            .map(|(i, &(o, du, dv))| patch(plane(o, du, dv), vec![unit_square(10 * i as u64 + 1, [None; 4])]))
            .collect(),
    )
}

/// A quarter cylinder patch trimmed to its full domain.
pub fn cylinder_body(radius: f64, height: f64) -> BodyRecord {
    body(
        "cylinder",
        vec![patch(quarter_cylinder(radius, height), vec![unit_square(1, [None; 4])])],
    )
}

/// Assemble `bodies` (millimetres) into a fresh default session.
pub fn assemble(bodies: &[BodyRecord]) -> Session {
    let mut session = Session::new();
    let mut assembler = Assembler::new(&mut session, 1.0);
    for body in bodies {
        assembler.add_body(body);
    }
    session
}

/// Stitch a session's model with `technique` and default options.
pub fn stitch(session: &mut Session, technique: StitchingTechnique) -> StitchReport {
    let stitcher = Stitcher::new(technique, session.tolerance());
    stitcher.run(session.model_mut())
}

/// Assemble and sew.
pub fn sewn(bodies: &[BodyRecord]) -> Session {
    let mut session = assemble(bodies);
    stitch(&mut session, StitchingTechnique::Sew);
    session
}

/// Criteria in millimetres and degrees.
pub fn criteria(chord: f64, max_edge: f64, normal_degrees: f64) -> TessellationCriteria {
    TessellationCriteria::new(chord, max_edge, normal_degrees.to_radians()).with_min_element_size(0.02)
}
