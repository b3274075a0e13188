//! Filter consistency and accuracy diagnostics: NIS, NEES and RMSE.

use crate::error::FilterError;
use crate::measurement::{GroundTruth, Measurement, SensorKind};
use crate::state_estimator::{sigma_points::state_residual, ukf::UKF, GaussParams, StateVec};
use nalgebra::Vector4;

pub trait Consistency {
    type Params;
    type Measurement;
    type GroundTruth;

    fn NIS(&self, z: &Self::Measurement) -> Result<f64, FilterError>;
    fn NEES(&self, eststate: &Self::Params, x_gt: &Self::GroundTruth) -> Result<f64, FilterError>;
}

impl Consistency for UKF {
    type Params = GaussParams;
    type Measurement = Measurement;
    type GroundTruth = StateVec;

    /// NIS the measurement would have against the pending prediction. The filter is not changed.
    fn NIS(&self, z: &Measurement) -> Result<f64, FilterError> {
        let X_sig_pred = self.predicted_sigma_points().ok_or(FilterError::NotPredicted)?;
        let correction = self.correct(X_sig_pred, self.x(), self.P(), &z.reading)?;
        Ok(correction.nis)
    }

    fn NEES(&self, eststate: &GaussParams, x_gt: &StateVec) -> Result<f64, FilterError> {
        nees(eststate, x_gt)
    }
}

/// Normalized estimation error squared of `eststate` against a true state.
pub fn nees(eststate: &GaussParams, x_gt: &StateVec) -> Result<f64, FilterError> {
    let x_err = state_residual(&eststate.x, x_gt);
    let P_chol = eststate
        .P
        .cholesky()
        .ok_or(FilterError::CovarianceNotPositiveDefinite)?;
    let P_inv_x_err = P_chol.solve(&x_err);
    Ok(x_err.dot(&P_inv_x_err))
}

/// 95% quantile of the chi-square distribution for 1 to 5 degrees of freedom.
pub fn chi2_95(dof: usize) -> Option<f64> {
    match dof {
        1 => Some(3.841),
        2 => Some(5.991),
        3 => Some(7.815),
        4 => Some(9.488),
        5 => Some(11.070),
        _ => None,
    }
}

pub fn measurement_dim(sensor: SensorKind) -> usize {
    match sensor {
        SensorKind::Lidar => 2,
        SensorKind::Radar => 3,
    }
}

#[derive(Debug, Clone, Default)]
pub struct NisSummary {
    pub count: usize,
    pub mean: f64,
    /// Share of updates with NIS above the 95% chi-square bound, ~0.05 for a consistent filter
    pub fraction_above_95: f64,
}

/// NIS values collected per sensor over a run.
#[derive(Debug, Clone, Default)]
pub struct NisStats {
    lidar: Vec<f64>,
    radar: Vec<f64>,
}

impl NisStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sensor: SensorKind, nis: f64) {
        match sensor {
            SensorKind::Lidar => self.lidar.push(nis),
            SensorKind::Radar => self.radar.push(nis),
        }
    }

    pub fn values(&self, sensor: SensorKind) -> &[f64] {
        match sensor {
            SensorKind::Lidar => &self.lidar,
            SensorKind::Radar => &self.radar,
        }
    }

    pub fn summary(&self, sensor: SensorKind) -> NisSummary {
        let values = self.values(sensor);
        if values.is_empty() {
            return NisSummary::default();
        }
        let threshold = chi2_95(measurement_dim(sensor)).unwrap_or(f64::INFINITY);
        let above = values.iter().filter(|&&nis| nis > threshold).count();
        NisSummary {
            count: values.len(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            fraction_above_95: above as f64 / values.len() as f64,
        }
    }
}

/// Cartesian [px, py, vx, vy] of a CTRV state.
pub fn to_cartesian(x: &StateVec) -> Vector4<f64> {
    let v = x[2];
    let yaw = x[3];
    Vector4::new(x[0], x[1], v * yaw.cos(), v * yaw.sin())
}

/// Root mean squared error of [px, py, vx, vy].
///
/// Returns `None` when the inputs are empty or of different length.
pub fn rmse(estimations: &[StateVec], ground_truth: &[GroundTruth]) -> Option<Vector4<f64>> {
    if estimations.is_empty() || estimations.len() != ground_truth.len() {
        return None;
    }
    let sum_sq = estimations
        .iter()
        .zip(ground_truth)
        .map(|(x, gt)| (to_cartesian(x) - gt.as_vector()).map(|e| e * e))
        .fold(Vector4::zeros(), |acc, e| acc + e);
    Some((sum_sq / estimations.len() as f64).map(f64::sqrt))
}
