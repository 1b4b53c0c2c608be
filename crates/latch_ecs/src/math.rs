//! Transform math
//!
//! Re-exports glam with the Euler conventions used by entity transforms:
//! `x` is pitch, `y` is yaw, `z` is roll, applied roll first, then pitch,
//! then yaw (`R = Ry * Rx * Rz`).

pub use glam::*;

use std::f32::consts::TAU;

/// Past this the pitch is treated as locked at +/-90 degrees.
const GIMBAL_THRESHOLD: f32 = 0.999_999;

/// Compose pitch/yaw/roll (radians) into a rotation.
#[inline]
pub fn quat_from_euler(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z)
}

/// Decompose a rotation matrix into pitch/yaw/roll, each in `[0, 2pi)`.
///
/// Near gimbal lock roll is pinned to zero and the whole remaining
/// rotation about the vertical axis is reported as yaw.
pub fn euler_from_rotation(m: &Mat3) -> Vec3 {
    // R[1][2] = -sin(pitch)
    let m12 = m.z_axis.y;
    let (pitch, yaw, roll) = if m12.abs() < GIMBAL_THRESHOLD {
        let pitch = (-m12).asin();
        let yaw = m.z_axis.x.atan2(m.z_axis.z);
        let roll = m.x_axis.y.atan2(m.y_axis.y);
        (pitch, yaw, roll)
    } else {
        let pitch = if m12 < 0.0 { std::f32::consts::FRAC_PI_2 } else { -std::f32::consts::FRAC_PI_2 };
        let yaw = (-m.x_axis.z).atan2(m.x_axis.x);
        (pitch, yaw, 0.0)
    };
    Vec3::new(wrap_angle(pitch), wrap_angle(yaw), wrap_angle(roll))
}

/// Decompose a quaternion into pitch/yaw/roll, each in `[0, 2pi)`.
#[inline]
pub fn euler_from_quat(q: Quat) -> Vec3 {
    euler_from_rotation(&Mat3::from_quat(q.normalize()))
}

/// Wrap an angle into `[0, 2pi)`.
#[inline]
pub fn wrap_angle(a: f32) -> f32 {
    let w = a.rem_euclid(TAU);
    if w >= TAU {
        0.0
    } else {
        w
    }
}
