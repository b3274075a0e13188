use super::MeasurementModel;
use crate::angle::normalize_angle;
use crate::error::FilterError;
use crate::state_estimator::StateVec;
use nalgebra::{DMatrix, DVector};

/// Lidar: direct observation of the position.
#[derive(Debug, Clone)]
pub struct CartesianPosition {
    sigma_px: f64,
    sigma_py: f64,
}

impl CartesianPosition {
    pub fn new(sigma_px: f64, sigma_py: f64) -> Self {
        CartesianPosition { sigma_px, sigma_py }
    }
}

impl MeasurementModel for CartesianPosition {
    type State = StateVec;
    type Measurement = DVector<f64>;
    type Covariance = DMatrix<f64>;

    fn dim(&self) -> usize {
        2
    }

    /// Assumes p is the first state
    fn h(&self, x: &Self::State) -> Result<Self::Measurement, FilterError> {
        Ok(DVector::from_row_slice(&[x[0], x[1]]))
    }

    fn R(&self) -> Self::Covariance {
        DMatrix::from_diagonal(&DVector::from_row_slice(&[
            self.sigma_px.powi(2),
            self.sigma_py.powi(2),
        ]))
    }

    fn residual(&self, a: &Self::Measurement, b: &Self::Measurement) -> Self::Measurement {
        a - b
    }
}

/// Radar: range, bearing and range rate seen from the origin.
#[derive(Debug, Clone)]
pub struct RangeBearingRate {
    sigma_r: f64,
    sigma_phi: f64,
    sigma_rd: f64,
    min_range: f64,
}

impl RangeBearingRate {
    pub const BEARING: usize = 1;

    pub fn new(sigma_r: f64, sigma_phi: f64, sigma_rd: f64, min_range: f64) -> Self {
        RangeBearingRate {
            sigma_r,
            sigma_phi,
            sigma_rd,
            min_range,
        }
    }
}

impl MeasurementModel for RangeBearingRate {
    type State = StateVec;
    type Measurement = DVector<f64>;
    type Covariance = DMatrix<f64>;

    fn dim(&self) -> usize {
        3
    }

    fn h(&self, x: &Self::State) -> Result<Self::Measurement, FilterError> {
        let p_x = x[0];
        let p_y = x[1];
        let v = x[2];
        let yaw = x[3];

        let range = p_x.hypot(p_y);
        // also catches NaN
        if !(range >= self.min_range) {
            return Err(FilterError::DegenerateRange {
                range,
                min_range: self.min_range,
            });
        }
        let bearing = p_y.atan2(p_x);
        let range_rate = v * (p_x * yaw.cos() + p_y * yaw.sin()) / range;

        Ok(DVector::from_row_slice(&[range, bearing, range_rate]))
    }

    fn R(&self) -> Self::Covariance {
        DMatrix::from_diagonal(&DVector::from_row_slice(&[
            self.sigma_r.powi(2),
            self.sigma_phi.powi(2),
            self.sigma_rd.powi(2),
        ]))
    }

    fn residual(&self, a: &Self::Measurement, b: &Self::Measurement) -> Self::Measurement {
        let mut d = a - b;
        d[Self::BEARING] = normalize_angle(d[Self::BEARING]);
        d
    }
}
