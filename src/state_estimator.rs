pub mod models;
pub mod sigma_points;
pub mod ukf;

use crate::error::FilterError;
use nalgebra::{Matrix5, SMatrix, SVector, Vector5};

/// State dimension: [px, py, v, yaw, yawd]
pub const N_X: usize = 5;
/// State plus longitudinal and yaw acceleration noise
pub const N_AUG: usize = 7;
pub const N_SIGMA: usize = 2 * N_AUG + 1;
/// Row of the heading in the state vector
pub const YAW: usize = 3;

pub type StateVec = Vector5<f64>;
pub type StateCov = Matrix5<f64>;
pub type AugStateVec = SVector<f64, N_AUG>;
pub type AugCov = SMatrix<f64, N_AUG, N_AUG>;
pub type AugSigmaPoints = SMatrix<f64, N_AUG, N_SIGMA>;
pub type SigmaPoints = SMatrix<f64, N_X, N_SIGMA>;
pub type Weights = SVector<f64, N_SIGMA>;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussParams {
    pub x: StateVec,
    pub P: StateCov,
}

impl GaussParams {
    pub fn new(x: StateVec, P: StateCov) -> Self {
        GaussParams { x, P }
    }

    pub fn is_finite(&self) -> bool {
        self.x.iter().chain(self.P.iter()).all(|v| v.is_finite())
    }
}

pub trait StateEstimator {
    type Params;
    type Measurement;

    fn predict(&mut self, ts: f64) -> Result<(), FilterError>;

    /// Corrects the predicted state, returns the NIS of the measurement.
    fn update(&mut self, z: &Self::Measurement) -> Result<f64, FilterError>;

    fn step(&mut self, z: &Self::Measurement) -> Result<(), FilterError>;

    fn estimate(&self) -> Self::Params;
}
