//! Linear algebra type aliases, geometric tolerances and unit constants.

pub type Point3 = nalgebra::Point3<f64>;
pub type Point2 = nalgebra::Point2<f64>;
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;
pub type Vector4 = nalgebra::Vector4<f64>;
pub type Matrix4 = nalgebra::Matrix4<f64>;

/// Parametric tolerance for knot and parameter comparisons.
pub const PARAM_TOL: f64 = 1e-12;

/// Below this length a derivative or normal is treated as vanishing.
pub const ZERO_LENGTH: f64 = 1e-15;

/// Millimetres per centimetre. The kernel works in millimetres.
pub const MM_PER_CM: f64 = 10.0;

/// Default geometric tolerance of a session, in millimetres.
pub const DEFAULT_GEOMETRIC_TOLERANCE: f64 = 0.01;

/// Default stitching tolerance of a session, in millimetres.
pub const DEFAULT_STITCHING_TOLERANCE: f64 = 0.1;

/// Squared distance between two points.
#[inline]
pub fn distance_squared(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm_squared()
}

/// Angle in radians between two vectors, 0 when either vanishes.
pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
    let la = a.norm();
    let lb = b.norm();
    if la < ZERO_LENGTH || lb < ZERO_LENGTH {
        return 0.0;
    }
    (a.dot(b) / (la * lb)).clamp(-1.0, 1.0).acos()
}
