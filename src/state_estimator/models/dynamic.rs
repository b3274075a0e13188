use super::DynamicModel;
use crate::state_estimator::{AugStateVec, StateVec};
use nalgebra::Matrix2;

/// Below this yaw rate the straight-line motion equations are used.
const MIN_YAW_RATE: f64 = 1e-3;

/// Constant turn rate and velocity model.
///
/// State is [px, py, v, yaw, yawd], the augmented state appends the
/// longitudinal acceleration noise `nu_a` and yaw acceleration noise `nu_yawdd`.
#[derive(Debug, Clone)]
pub struct CTRV {
    // Longitudinal acceleration noise std
    std_a: f64,
    // Yaw acceleration noise std
    std_yawdd: f64,
}

impl CTRV {
    pub fn new(std_a: f64, std_yawdd: f64) -> Self {
        CTRV { std_a, std_yawdd }
    }
}

impl DynamicModel for CTRV {
    type State = StateVec;
    type AugmentedState = AugStateVec;
    type Covariance = Matrix2<f64>;

    fn f(&self, x_aug: &Self::AugmentedState, ts: f64) -> Self::State {
        let p_x = x_aug[0];
        let p_y = x_aug[1];
        let v = x_aug[2];
        let yaw = x_aug[3];
        let yawd = x_aug[4];
        let nu_a = x_aug[5];
        let nu_yawdd = x_aug[6];

        let (px_p, py_p) = if yawd.abs() > MIN_YAW_RATE {
            (
                p_x + v / yawd * ((yaw + yawd * ts).sin() - yaw.sin()),
                p_y + v / yawd * (yaw.cos() - (yaw + yawd * ts).cos()),
            )
        } else {
            (p_x + v * ts * yaw.cos(), p_y + v * ts * yaw.sin())
        };

        let half_ts2 = 0.5 * ts * ts;
        StateVec::new(
            px_p + half_ts2 * nu_a * yaw.cos(),
            py_p + half_ts2 * nu_a * yaw.sin(),
            v + ts * nu_a,
            yaw + yawd * ts + half_ts2 * nu_yawdd,
            yawd + ts * nu_yawdd,
        )
    }

    fn Q(&self) -> Self::Covariance {
        Matrix2::new(self.std_a.powi(2), 0.0, 0.0, self.std_yawdd.powi(2))
    }
}
