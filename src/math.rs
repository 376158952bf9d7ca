//! Vector helpers guarded against degenerate input.
//!
//! Every stage normalizes and interpolates directions; these helpers make the
//! zero-length and near-parallel cases explicit so no stage can emit NaN.

use glam::Vec3;

/// Squared length at or below which a vector counts as zero
pub const EPSILON_SQ: f32 = 1e-8;

/// Dot product above which two unit vectors are treated as parallel
pub const PARALLEL_DOT: f32 = 0.9999;

/// Minimum sine of the arc angle for the slerp weights to be well conditioned
const MIN_SIN_ANGLE: f32 = 1e-6;

/// Normalize `v`, returning the zero vector instead of NaN for tiny input
#[inline]
pub fn safe_normalize(v: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > EPSILON_SQ {
        v / len_sq.sqrt()
    } else {
        Vec3::ZERO
    }
}

/// True when `v` is too short to carry a direction
#[inline]
pub fn is_zero(v: Vec3) -> bool {
    v.length_squared() <= EPSILON_SQ
}

/// Shortest-arc spherical interpolation from `current` toward `target`.
///
/// `t` is clamped to `[0, 1]`. A zero `target` leaves `current` untouched and a
/// zero `current` snaps straight to the target. Nearly parallel (or exactly
/// opposite) inputs fall back to direct assignment of the target, since the
/// slerp weights divide by `sin(angle)`.
pub fn slerp_towards(current: Vec3, target: Vec3, t: f32) -> Vec3 {
    let target = safe_normalize(target);
    if is_zero(target) {
        return current;
    }

    let current = safe_normalize(current);
    if is_zero(current) {
        return target;
    }

    let dot = current.dot(target).clamp(-1.0, 1.0);
    if dot > PARALLEL_DOT {
        return target;
    }

    let t = t.clamp(0.0, 1.0);
    let angle = dot.acos();
    let sin_angle = angle.sin();
    if sin_angle <= MIN_SIN_ANGLE {
        return target;
    }

    let a = ((1.0 - t) * angle).sin() / sin_angle;
    let b = (t * angle).sin() / sin_angle;
    let blended = safe_normalize(current * a + target * b);
    if is_zero(blended) {
        target
    } else {
        blended
    }
}
