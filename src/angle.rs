use std::f64::consts::{PI, TAU};

/// Wraps an angle into (-pi, pi].
///
/// Values already inside the interval are returned bit-for-bit unchanged.
/// Every heading and bearing residual in the crate goes through this function.
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}
