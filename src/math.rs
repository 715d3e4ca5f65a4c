//! Small 2D helpers on top of `glam::Vec2`.
//!
//! The battlefield is a ground plane: x = east/west, y = north/south.

use glam::Vec2;

/// Lengths below this are treated as zero when normalizing.
pub const EPSILON: f32 = 1e-5;

/// Normalize, returning zero for degenerate input instead of NaN.
#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq <= EPSILON * EPSILON || !len_sq.is_finite() {
        Vec2::ZERO
    } else {
        v / len_sq.sqrt()
    }
}

/// 2D cross product (z component of the 3D cross).
/// Positive when `b` lies counter-clockwise of `a`.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Rotate by 90 degrees toward `side`: `+1.0` turns clockwise (right),
/// `-1.0` counter-clockwise (left), `0.0` yields zero.
#[inline]
pub fn rotate_side(v: Vec2, side: f32) -> Vec2 {
    Vec2::new(v.y * side, -v.x * side)
}

/// Rotate counter-clockwise by `angle` radians.
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unsigned angle between two vectors in radians, zero if either is degenerate.
#[inline]
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    let (a, b) = (safe_normalize(a), safe_normalize(b));
    if a == Vec2::ZERO || b == Vec2::ZERO {
        return 0.0;
    }
    cross(a, b).atan2(a.dot(b)).abs()
}

/// Heading angle of a direction (radians, 0 = +x, counter-clockwise).
#[inline]
pub fn heading(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Hermite smoothstep between `edge0` and `edge1`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Deterministic unit vector for a coincident pair, so overlap resolution
/// never divides by zero and always separates the same way.
#[inline]
pub fn pair_separation_axis(a: usize, b: usize) -> Vec2 {
    // Golden-angle spread keeps nearby index pairs from sharing an axis.
    let seed = (a.wrapping_mul(31) ^ b.wrapping_mul(17)) % 360;
    let angle = seed as f32 * 2.399_963;
    Vec2::new(angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_normalize_zero() {
        assert_eq!(safe_normalize(Vec2::ZERO), Vec2::ZERO);
        let n = safe_normalize(Vec2::new(3.0, 4.0));
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotate_side() {
        let fwd = Vec2::X;
        assert_eq!(rotate_side(fwd, 1.0), Vec2::new(0.0, -1.0));
        assert_eq!(rotate_side(fwd, -1.0), Vec2::new(0.0, 1.0));
        assert_eq!(rotate_side(fwd, 0.0), Vec2::ZERO);
    }

    #[test]
    fn test_cross_sign() {
        assert!(cross(Vec2::X, Vec2::Y) > 0.0);
        assert!(cross(Vec2::Y, Vec2::X) < 0.0);
    }

    #[test]
    fn test_angle_between() {
        let a = angle_between(Vec2::X, Vec2::Y);
        assert!((a - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert_eq!(angle_between(Vec2::ZERO, Vec2::Y), 0.0);
    }

    #[test]
    fn test_smoothstep_bounds() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_pair_axis_is_unit() {
        for (a, b) in [(0, 1), (3, 7), (100, 2)] {
            assert!((pair_separation_axis(a, b).length() - 1.0).abs() < 1e-5);
        }
    }
}
