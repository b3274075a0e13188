//! Unscented Kalman filter for a single object under the CTRV model,
//! fusing lidar (position) and radar (range, bearing, range rate).
//!
//! Every public operation either succeeds and commits its result, or fails
//! and leaves the filter exactly as it was. Intermediate results live in
//! [`Prediction`] and [`Correction`] until they are committed.

use super::models::{
    dynamic::CTRV,
    measurement::{CartesianPosition, RangeBearingRate},
    DynamicModel, MeasurementModel,
};
use super::sigma_points::{
    augmented_sigma_points, central_covariance, is_positive_definite, is_positive_semidefinite,
    predicted_covariance, predicted_mean, spreading_parameter, state_residual, weights,
};
use super::{GaussParams, SigmaPoints, StateCov, StateEstimator, StateVec, Weights, N_SIGMA};
use crate::config::UkfConfig;
use crate::error::FilterError;
use crate::measurement::{elapsed_seconds, Measurement, SensorKind, SensorReading};
use nalgebra::{DMatrix, DVector, Matrix5xX};
use tracing::{debug, trace};

/// Smallest accepted ratio between the smallest and largest diagonal entry of
/// the Cholesky factor of S. Below it S is treated as singular.
const MIN_INNOVATION_CONDITION: f64 = 1e-6;

/// Predicted moments together with the sigma points they came from.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub x: StateVec,
    pub P: StateCov,
    pub X_sig_pred: SigmaPoints,
}

/// Posterior moments of a measurement update.
#[derive(Debug, Clone)]
pub struct Correction {
    pub x: StateVec,
    pub P: StateCov,
    pub nis: f64,
}

#[derive(Debug, Clone)]
pub struct UKF {
    dynmod: CTRV,
    lidar: CartesianPosition,
    radar: RangeBearingRate,
    use_lidar: bool,
    use_radar: bool,

    x: StateVec,
    P: StateCov,
    // Sigma points of the last prediction, consumed by the next update
    X_sig_pred: Option<SigmaPoints>,

    lambda: f64,
    weights: Weights,

    // Time reference in microseconds, None until initialized
    time_us: Option<u64>,

    nis_lidar: Option<f64>,
    nis_radar: Option<f64>,
}

impl UKF {
    pub fn new(config: &UkfConfig) -> Self {
        let lambda = spreading_parameter();
        UKF {
            dynmod: CTRV::new(config.std_a, config.std_yawdd),
            lidar: CartesianPosition::new(config.std_laspx, config.std_laspy),
            radar: RangeBearingRate::new(
                config.std_radr,
                config.std_radphi,
                config.std_radrd,
                config.min_radar_range,
            ),
            use_lidar: config.use_lidar,
            use_radar: config.use_radar,
            x: StateVec::zeros(),
            P: StateCov::identity(),
            X_sig_pred: None,
            lambda,
            weights: weights(lambda),
            time_us: None,
            nis_lidar: None,
            nis_radar: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.time_us.is_some()
    }

    /// State mean [px, py, v, yaw, yawd].
    pub fn x(&self) -> &StateVec {
        &self.x
    }

    pub fn P(&self) -> &StateCov {
        &self.P
    }

    /// Timestamp of the last accepted measurement in microseconds.
    pub fn timestamp(&self) -> Option<u64> {
        self.time_us
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn predicted_sigma_points(&self) -> Option<&SigmaPoints> {
        self.X_sig_pred.as_ref()
    }

    /// NIS of the most recent update from the given sensor.
    pub fn nis(&self, sensor: SensorKind) -> Option<f64> {
        match sensor {
            SensorKind::Lidar => self.nis_lidar,
            SensorKind::Radar => self.nis_radar,
        }
    }

    pub fn sensor_enabled(&self, sensor: SensorKind) -> bool {
        match sensor {
            SensorKind::Lidar => self.use_lidar,
            SensorKind::Radar => self.use_radar,
        }
    }

    /// Bootstraps the mean from the first measurement of either sensor.
    ///
    /// The covariance is reset to identity and the measurement's timestamp
    /// becomes the time reference. Calling it a second time is an error.
    pub fn initialize(&mut self, m: &Measurement) -> Result<(), FilterError> {
        if self.is_initialized() {
            return Err(FilterError::AlreadyInitialized);
        }
        let x = initial_state(&m.reading);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NonFiniteEstimate);
        }

        self.x = x;
        self.P = StateCov::identity();
        self.X_sig_pred = None;
        self.time_us = Some(m.timestamp);
        debug!(sensor = %m.kind(), timestamp = m.timestamp, x = ?self.x.as_slice(), "filter initialized");
        Ok(())
    }

    /// Predicts the state `dt` seconds ahead and keeps the predicted sigma
    /// points for the next update. Does not move the time reference.
    pub fn predict(&mut self, dt: f64) -> Result<(), FilterError> {
        let prediction = self.propagate(dt)?;
        self.commit_prediction(prediction);
        Ok(())
    }

    /// Lidar update with position `(px, py)`, returns its NIS.
    pub fn update_lidar(&mut self, px: f64, py: f64) -> Result<f64, FilterError> {
        self.update_reading(&SensorReading::Lidar { px, py })
    }

    /// Radar update with range, bearing and range rate, returns its NIS.
    pub fn update_radar(&mut self, rho: f64, theta: f64, rho_dot: f64) -> Result<f64, FilterError> {
        self.update_reading(&SensorReading::Radar {
            rho,
            theta,
            rho_dot,
        })
    }

    /// Initializes on the first measurement, afterwards predicts to the
    /// measurement's timestamp and corrects with it.
    ///
    /// Do not mix with [`UKF::predict`] and the `update_*` calls on the same
    /// filter. Those do not move the time reference, so the next call here
    /// would predict the same interval again.
    pub fn process_measurement(&mut self, m: &Measurement) -> Result<(), FilterError> {
        let previous = match self.time_us {
            Some(t) => t,
            None => return self.initialize(m),
        };
        let sensor = m.kind();
        if !self.sensor_enabled(sensor) {
            return Err(FilterError::SensorDisabled(sensor));
        }
        let dt = elapsed_seconds(previous, m.timestamp).ok_or(
            FilterError::NonMonotonicTimestamp {
                previous,
                current: m.timestamp,
            },
        )?;

        let prediction = self.propagate(dt)?;
        let correction = self.correct(&prediction.X_sig_pred, &prediction.x, &prediction.P, &m.reading)?;

        trace!(sensor = %sensor, dt, nis = correction.nis, "measurement processed");
        self.commit_correction(sensor, correction);
        self.time_us = Some(m.timestamp);
        Ok(())
    }

    /// Runs the prediction step without touching the filter.
    pub fn propagate(&self, dt: f64) -> Result<Prediction, FilterError> {
        if !self.is_initialized() {
            return Err(FilterError::NotInitialized);
        }
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(FilterError::NegativeTimeDelta { dt });
        }

        let X_sig_aug = augmented_sigma_points(&self.x, &self.P, &self.dynmod.Q(), self.lambda)?;

        let mut X_sig_pred = SigmaPoints::zeros();
        for i in 0..N_SIGMA {
            let x_aug = X_sig_aug.column(i).into_owned();
            X_sig_pred.set_column(i, &self.dynmod.f(&x_aug, dt));
        }

        let x = predicted_mean(&X_sig_pred, &self.weights);
        let mut P = predicted_covariance(&X_sig_pred, &x, &self.weights);

        if !GaussParams::new(x, P).is_finite() {
            return Err(FilterError::NonFiniteEstimate);
        }
        if !is_positive_definite(&P) {
            trace!(dt, "predicted covariance indefinite, using the central sigma point");
            P = central_covariance(&X_sig_pred, &self.weights);
            if !is_positive_semidefinite(&P) {
                return Err(FilterError::CovarianceNotPositiveDefinite);
            }
        }
        trace!(dt, "state predicted");
        Ok(Prediction { x, P, X_sig_pred })
    }

    fn commit_prediction(&mut self, prediction: Prediction) {
        self.x = prediction.x;
        self.P = prediction.P;
        self.X_sig_pred = Some(prediction.X_sig_pred);
    }

    fn commit_correction(&mut self, sensor: SensorKind, correction: Correction) {
        self.x = correction.x;
        self.P = correction.P;
        self.X_sig_pred = None;
        match sensor {
            SensorKind::Lidar => self.nis_lidar = Some(correction.nis),
            SensorKind::Radar => self.nis_radar = Some(correction.nis),
        }
    }

    fn update_reading(&mut self, reading: &SensorReading) -> Result<f64, FilterError> {
        if !self.is_initialized() {
            return Err(FilterError::NotInitialized);
        }
        let sensor = reading.kind();
        if !self.sensor_enabled(sensor) {
            return Err(FilterError::SensorDisabled(sensor));
        }
        let X_sig_pred = self.X_sig_pred.as_ref().ok_or(FilterError::NotPredicted)?;

        let correction = self.correct(X_sig_pred, &self.x, &self.P, reading)?;
        let nis = correction.nis;
        trace!(sensor = %sensor, nis, "state updated");
        self.commit_correction(sensor, correction);
        Ok(nis)
    }

    /// Corrects `(x, P)` with a reading, dispatching to the sensor's model.
    pub fn correct(
        &self,
        X_sig_pred: &SigmaPoints,
        x: &StateVec,
        P: &StateCov,
        reading: &SensorReading,
    ) -> Result<Correction, FilterError> {
        let z = reading.z();
        match reading {
            SensorReading::Lidar { .. } => self.correct_with(&self.lidar, X_sig_pred, x, P, &z),
            SensorReading::Radar { .. } => self.correct_with(&self.radar, X_sig_pred, x, P, &z),
        }
    }

    /// Measurement update shared by all sensors.
    fn correct_with<M>(
        &self,
        measmod: &M,
        X_sig_pred: &SigmaPoints,
        x: &StateVec,
        P: &StateCov,
        z: &DVector<f64>,
    ) -> Result<Correction, FilterError>
    where
        M: MeasurementModel<State = StateVec, Measurement = DVector<f64>, Covariance = DMatrix<f64>>,
    {
        let n_z = measmod.dim();

        // sigma points in measurement space
        let mut Z_sig = DMatrix::<f64>::zeros(n_z, N_SIGMA);
        for i in 0..N_SIGMA {
            let z_i = measmod.h(&X_sig_pred.column(i).into_owned())?;
            Z_sig.set_column(i, &z_i);
        }

        // Weighted mean taken as offsets from the central point, which equals
        // sum(w_i * Z_i) since the weights sum to one but keeps angles continuous.
        let Z_0 = Z_sig.column(0).into_owned();
        let mut z_pred = Z_0.clone();
        for i in 1..N_SIGMA {
            z_pred += measmod.residual(&Z_sig.column(i).into_owned(), &Z_0) * self.weights[i];
        }

        let innovation = measmod.residual(z, &z_pred);

        let (S, Tc) = self.cross_moments(measmod, X_sig_pred, &Z_sig, x, &z_pred, 0);
        match gain_update(x, P, &S, &Tc, &innovation) {
            Ok(correction) if is_positive_definite(&correction.P) => return Ok(correction),
            Ok(_) | Err(FilterError::SingularInnovationCovariance) => {}
            Err(err) => return Err(err),
        }

        // With the negative centre weight S or the posterior can be indefinite.
        // Moments about the central sigma point keep the joint covariance of
        // state and measurement positive semi-definite, and so the posterior.
        trace!("posterior covariance indefinite, using the central sigma point");
        let P_c = central_covariance(X_sig_pred, &self.weights);
        let X_0 = X_sig_pred.column(0).into_owned();
        let (S, Tc) = self.cross_moments(measmod, X_sig_pred, &Z_sig, &X_0, &Z_0, 1);
        let correction = gain_update(x, &P_c, &S, &Tc, &innovation)?;
        if !is_positive_semidefinite(&correction.P) {
            return Err(FilterError::CovarianceNotPositiveDefinite);
        }
        Ok(correction)
    }

    /// Innovation covariance S and cross covariance Tc, summed over the sigma
    /// points from `first` on with residuals taken about `(x_ref, z_ref)`.
    fn cross_moments<M>(
        &self,
        measmod: &M,
        X_sig_pred: &SigmaPoints,
        Z_sig: &DMatrix<f64>,
        x_ref: &StateVec,
        z_ref: &DVector<f64>,
        first: usize,
    ) -> (DMatrix<f64>, Matrix5xX<f64>)
    where
        M: MeasurementModel<State = StateVec, Measurement = DVector<f64>, Covariance = DMatrix<f64>>,
    {
        let mut S = measmod.R();
        let mut Tc = Matrix5xX::<f64>::zeros(measmod.dim());
        for i in first..N_SIGMA {
            let z_diff = measmod.residual(&Z_sig.column(i).into_owned(), z_ref);
            let x_diff = state_residual(&X_sig_pred.column(i).into_owned(), x_ref);
            S += &z_diff * z_diff.transpose() * self.weights[i];
            Tc += x_diff * z_diff.transpose() * self.weights[i];
        }
        (S, Tc)
    }
}

fn gain_update(
    x: &StateVec,
    P: &StateCov,
    S: &DMatrix<f64>,
    Tc: &Matrix5xX<f64>,
    innovation: &DVector<f64>,
) -> Result<Correction, FilterError> {
    let S_inv = invert_innovation_covariance(S)?;
    let K = Tc * &S_inv;

    let x_upd: StateVec = x + &K * innovation;
    let P_upd: StateCov = P - &K * S * K.transpose();
    let nis = innovation.dot(&(&S_inv * innovation));

    if !GaussParams::new(x_upd, P_upd).is_finite() || !nis.is_finite() {
        return Err(FilterError::NonFiniteEstimate);
    }
    Ok(Correction {
        x: x_upd,
        P: P_upd,
        nis,
    })
}

impl StateEstimator for UKF {
    type Params = GaussParams;
    type Measurement = Measurement;

    fn predict(&mut self, ts: f64) -> Result<(), FilterError> {
        UKF::predict(self, ts)
    }

    fn update(&mut self, z: &Self::Measurement) -> Result<f64, FilterError> {
        self.update_reading(&z.reading)
    }

    fn step(&mut self, z: &Self::Measurement) -> Result<(), FilterError> {
        self.process_measurement(z)
    }

    fn estimate(&self) -> Self::Params {
        GaussParams::new(self.x, self.P)
    }
}

/// Mean of the first measurement. Speed, heading and yaw rate start at zero,
/// except that a radar reading seeds the speed.
///
/// The radar speed is the magnitude of the radial velocity, `|rho_dot|`. It is
/// a rough stand-in for the speed along the heading, which a single radar
/// reading does not observe.
fn initial_state(reading: &SensorReading) -> StateVec {
    match *reading {
        SensorReading::Lidar { px, py } => StateVec::new(px, py, 0.0, 0.0, 0.0),
        SensorReading::Radar {
            rho,
            theta,
            rho_dot,
        } => {
            let vx = rho_dot * theta.cos();
            let vy = rho_dot * theta.sin();
            StateVec::new(rho * theta.cos(), rho * theta.sin(), vx.hypot(vy), 0.0, 0.0)
        }
    }
}

fn invert_innovation_covariance(S: &DMatrix<f64>) -> Result<DMatrix<f64>, FilterError> {
    let S_chol = S
        .clone()
        .cholesky()
        .ok_or(FilterError::SingularInnovationCovariance)?;

    let diag = S_chol.l_dirty().diagonal();
    let max = diag.max();
    let min = diag.min();
    if !(max > 0.0 && min / max >= MIN_INNOVATION_CONDITION) {
        return Err(FilterError::SingularInnovationCovariance);
    }

    let S_inv = S_chol.inverse();
    if S_inv.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::SingularInnovationCovariance);
    }
    Ok(S_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_estimator::N_X;
    use approx::assert_abs_diff_eq;

    fn zero_noise() -> UkfConfig {
        UkfConfig {
            std_a: 0.0,
            std_yawdd: 0.0,
            ..UkfConfig::default()
        }
    }

    fn assert_symmetric(P: &StateCov) {
        assert!(P.relative_eq(&P.transpose(), 1e-9, 1e-9), "P not symmetric: {}", P);
    }

    #[test]
    fn lidar_initialization() {
        let mut ukf = UKF::new(&UkfConfig::default());
        assert!(!ukf.is_initialized());
        ukf.process_measurement(&Measurement::lidar(1_000, 1.0, 2.0)).unwrap();

        assert!(ukf.is_initialized());
        assert_eq!(ukf.x(), &StateVec::new(1.0, 2.0, 0.0, 0.0, 0.0));
        assert_eq!(ukf.P(), &StateCov::identity());
        assert_eq!(ukf.timestamp(), Some(1_000));
        assert!(ukf.predicted_sigma_points().is_none());
        assert_eq!(ukf.nis(SensorKind::Lidar), None);
    }

    #[test]
    fn radar_initialization() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.process_measurement(&Measurement::radar(0, 5.0, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(ukf.x()[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ukf.x()[1], 0.0, epsilon = 1e-12);
        assert_eq!(ukf.x()[2], 0.0);
        assert_eq!(ukf.P(), &StateCov::identity());
    }

    #[test]
    fn radar_initial_speed_is_radial_magnitude() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::radar(0, 2.0, 0.7, -1.5)).unwrap();
        assert_abs_diff_eq!(ukf.x()[0], 2.0 * 0.7f64.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(ukf.x()[1], 2.0 * 0.7f64.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(ukf.x()[2], 1.5, epsilon = 1e-12);
        assert_eq!(ukf.x()[3], 0.0);
        assert_eq!(ukf.x()[4], 0.0);
    }

    #[test]
    fn reinitialization_is_rejected() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        let err = ukf.initialize(&Measurement::lidar(10, 9.0, 9.0)).unwrap_err();
        assert_eq!(err, FilterError::AlreadyInitialized);
        assert_eq!(ukf.x()[0], 1.0);
        assert_eq!(ukf.timestamp(), Some(0));
    }

    #[test]
    fn operations_need_initialization() {
        let mut ukf = UKF::new(&UkfConfig::default());
        assert_eq!(ukf.predict(0.1).unwrap_err(), FilterError::NotInitialized);
        assert_eq!(ukf.update_lidar(1.0, 1.0).unwrap_err(), FilterError::NotInitialized);
    }

    #[test]
    fn update_needs_prediction() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        assert_eq!(ukf.update_lidar(1.0, 2.0).unwrap_err(), FilterError::NotPredicted);

        ukf.predict(0.0).unwrap();
        ukf.update_lidar(1.0, 2.0).unwrap();
        // the prediction is consumed by the update
        assert_eq!(ukf.update_lidar(1.0, 2.0).unwrap_err(), FilterError::NotPredicted);
    }

    #[test]
    fn straight_line_prediction() {
        let mut ukf = UKF::new(&zero_noise());
        ukf.initialize(&Measurement::lidar(0, 1.0, 1.0)).unwrap();
        let heading = 0.3;
        ukf.x = StateVec::new(1.0, 1.0, 2.0, heading, 0.0);
        ukf.P = StateCov::identity() * 1e-9;

        ukf.predict(1.0).unwrap();
        let x = ukf.x();
        assert_abs_diff_eq!(x[0], 1.0 + 2.0 * heading.cos(), epsilon = 1e-6);
        assert_abs_diff_eq!(x[1], 1.0 + 2.0 * heading.sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(x[2], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[3], heading, epsilon = 1e-9);
        assert_abs_diff_eq!(x[4], 0.0, epsilon = 1e-9);
        assert_symmetric(ukf.P());
    }

    #[test]
    fn negative_dt_is_rejected() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        assert_eq!(
            ukf.predict(-0.5).unwrap_err(),
            FilterError::NegativeTimeDelta { dt: -0.5 }
        );
        assert!(ukf.predict(f64::NAN).is_err());
        assert!(ukf.predicted_sigma_points().is_none());
    }

    #[test]
    fn non_monotonic_timestamps_are_rejected() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.process_measurement(&Measurement::lidar(2_000_000, 1.0, 2.0)).unwrap();
        let err = ukf
            .process_measurement(&Measurement::lidar(1_000_000, 1.1, 2.1))
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::NonMonotonicTimestamp {
                previous: 2_000_000,
                current: 1_000_000
            }
        );
        assert_eq!(ukf.timestamp(), Some(2_000_000));
        assert_eq!(ukf.x(), &StateVec::new(1.0, 2.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn lidar_update_on_predicted_position_keeps_mean() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        ukf.x = StateVec::new(1.0, 2.0, 1.5, 0.4, 0.1);
        ukf.predict(0.1).unwrap();
        let x_pred = *ukf.x();
        let P_pred = *ukf.P();

        let nis = ukf.update_lidar(x_pred[0], x_pred[1]).unwrap();
        assert!(ukf.x().relative_eq(&x_pred, 1e-9, 1e-9));
        assert_abs_diff_eq!(nis, 0.0, epsilon = 1e-12);
        // position uncertainty shrinks
        assert!(ukf.P()[(0, 0)] < P_pred[(0, 0)]);
        assert!(ukf.P()[(1, 1)] < P_pred[(1, 1)]);
        assert_symmetric(ukf.P());
    }

    #[test]
    fn zero_noise_fixed_point() {
        let config = UkfConfig {
            std_a: 0.0,
            std_yawdd: 0.0,
            std_laspx: 0.0,
            std_laspy: 0.0,
            ..UkfConfig::default()
        };
        let mut ukf = UKF::new(&config);
        ukf.initialize(&Measurement::lidar(0, 3.0, -1.0)).unwrap();
        ukf.x = StateVec::new(3.0, -1.0, 1.0, 0.2, 0.0);

        let prediction = ukf.propagate(0.5).unwrap();
        let z = prediction.x.fixed_rows::<2>(0).into_owned();
        ukf.predict(0.5).unwrap();
        let x_before = *ukf.x();
        let nis = ukf.update_lidar(z[0], z[1]).unwrap();

        assert!(ukf.x().relative_eq(&x_before, 1e-9, 1e-9));
        assert_abs_diff_eq!(nis, 0.0, epsilon = 1e-12);
        assert_symmetric(ukf.P());
    }

    #[test]
    fn radar_update_pulls_towards_measurement() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.process_measurement(&Measurement::lidar(0, 10.0, 0.0)).unwrap();
        ukf.process_measurement(&Measurement::radar(100_000, 10.5, 0.05, 0.0)).unwrap();

        let x = ukf.x();
        assert!(x[0] > 10.0);
        assert!(x[1] > 0.0);
        let nis = ukf.nis(SensorKind::Radar).unwrap();
        assert!(nis > 0.0);
        assert_eq!(ukf.nis(SensorKind::Lidar), None);
        assert_eq!(ukf.timestamp(), Some(100_000));
        assert_symmetric(ukf.P());
    }

    #[test]
    fn radar_update_across_bearing_discontinuity() {
        let mut ukf = UKF::new(&UkfConfig::default());
        // object behind the sensor, bearing near +-pi
        ukf.process_measurement(&Measurement::lidar(0, -10.0, 0.01)).unwrap();
        ukf.process_measurement(&Measurement::radar(50_000, 10.0, -std::f64::consts::PI + 0.001, 0.0))
            .unwrap();
        let x = ukf.x();
        assert_abs_diff_eq!(x[0], -10.0, epsilon = 0.5);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 0.5);
    }

    #[test]
    fn degenerate_radar_range_leaves_state_untouched() {
        let mut ukf = UKF::new(&zero_noise());
        ukf.process_measurement(&Measurement::lidar(0, 0.0, 0.0)).unwrap();
        let before = ukf.estimate();

        let err = ukf
            .process_measurement(&Measurement::radar(100_000, 0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, FilterError::DegenerateRange { .. }));
        assert_eq!(ukf.estimate(), before);
        assert_eq!(ukf.timestamp(), Some(0));
        assert_eq!(ukf.nis(SensorKind::Radar), None);

        // the filter keeps working with the next valid measurement
        ukf.process_measurement(&Measurement::lidar(200_000, 0.1, 0.1)).unwrap();
        assert_eq!(ukf.timestamp(), Some(200_000));
    }

    #[test]
    fn singular_innovation_covariance_is_rejected() {
        let config = UkfConfig {
            std_a: 0.0,
            std_yawdd: 0.0,
            std_laspx: 0.0,
            std_laspy: 0.0,
            ..UkfConfig::default()
        };
        let mut ukf = UKF::new(&config);
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        // identical position components make S rank deficient
        let mut X_sig_pred = SigmaPoints::zeros();
        for i in 0..N_SIGMA {
            let s = i as f64 - 7.0;
            X_sig_pred.set_column(i, &StateVec::new(1.0 + s, 1.0 + s, 0.0, 0.0, 0.0));
        }
        ukf.X_sig_pred = Some(X_sig_pred);
        let x_before = *ukf.x();

        assert_eq!(
            ukf.update_lidar(1.0, 2.0).unwrap_err(),
            FilterError::SingularInnovationCovariance
        );
        assert_eq!(ukf.x(), &x_before);
        assert!(ukf.predicted_sigma_points().is_some());
    }

    #[test]
    fn non_positive_definite_covariance_is_rejected() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.initialize(&Measurement::lidar(0, 1.0, 2.0)).unwrap();
        ukf.P[(4, 4)] = -1.0;
        let P_before = *ukf.P();
        assert_eq!(
            ukf.process_measurement(&Measurement::lidar(100, 1.0, 2.0)).unwrap_err(),
            FilterError::CovarianceNotPositiveDefinite
        );
        assert_eq!(ukf.P(), &P_before);
    }

    #[test]
    fn disabled_sensor_is_rejected_after_initialization() {
        let config = UkfConfig {
            use_radar: false,
            ..UkfConfig::default()
        };
        let mut ukf = UKF::new(&config);
        // either sensor may bootstrap the filter
        ukf.process_measurement(&Measurement::radar(0, 5.0, 0.0, 0.0)).unwrap();
        assert_eq!(
            ukf.process_measurement(&Measurement::radar(10, 5.0, 0.0, 0.0)).unwrap_err(),
            FilterError::SensorDisabled(SensorKind::Radar)
        );
        ukf.process_measurement(&Measurement::lidar(20, 5.0, 0.0)).unwrap();
    }

    #[test]
    fn covariance_stays_symmetric_over_a_sequence() {
        let mut ukf = UKF::new(&UkfConfig::default());
        let mut t = 0;
        for k in 0..40 {
            let s = k as f64 * 0.05;
            let px = 5.0 + 3.0 * s.cos();
            let py = 3.0 * s.sin();
            let m = if k % 2 == 0 {
                Measurement::lidar(t, px, py)
            } else {
                let rho = px.hypot(py);
                Measurement::radar(t, rho, py.atan2(px), -0.4)
            };
            ukf.process_measurement(&m).unwrap();
            assert_symmetric(ukf.P());
            t += 50_000;
        }
        assert!(ukf.nis(SensorKind::Lidar).is_some());
        assert!(ukf.nis(SensorKind::Radar).is_some());
    }

    #[test]
    fn trait_step_matches_process_measurement() {
        let measurements = [
            Measurement::lidar(0, 1.0, 1.0),
            Measurement::radar(100_000, 1.5, 0.8, 0.3),
            Measurement::lidar(200_000, 1.1, 1.1),
        ];
        let mut a = UKF::new(&UkfConfig::default());
        let mut b = UKF::new(&UkfConfig::default());
        for m in &measurements {
            a.process_measurement(m).unwrap();
            StateEstimator::step(&mut b, m).unwrap();
        }
        assert_eq!(a.estimate(), b.estimate());

        StateEstimator::predict(&mut b, 0.1).unwrap();
        let nis = StateEstimator::update(&mut b, &Measurement::lidar(300_000, 1.2, 1.2)).unwrap();
        assert_eq!(b.nis(SensorKind::Lidar), Some(nis));
    }

    #[test]
    fn predict_and_update_keep_the_time_reference() {
        let mut ukf = UKF::new(&UkfConfig::default());
        ukf.process_measurement(&Measurement::lidar(0, 1.0, 1.0)).unwrap();
        ukf.predict(0.1).unwrap();
        ukf.update_lidar(1.0, 1.0).unwrap();
        assert_eq!(ukf.timestamp(), Some(0));

        // the next measurement is predicted over the full interval from t = 0
        let m = Measurement::lidar(200_000, 1.1, 0.9);
        let prediction = ukf.propagate(0.2).unwrap();
        let correction = ukf
            .correct(&prediction.X_sig_pred, &prediction.x, &prediction.P, &m.reading)
            .unwrap();
        ukf.process_measurement(&m).unwrap();
        assert_eq!(ukf.x(), &correction.x);
        assert_eq!(ukf.P(), &correction.P);
        assert_eq!(ukf.timestamp(), Some(200_000));
    }

    #[test]
    fn weights_are_fixed() {
        let mut ukf = UKF::new(&UkfConfig::default());
        let w = *ukf.weights();
        assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
        assert_eq!(ukf.lambda(), -4.0);
        ukf.process_measurement(&Measurement::lidar(0, 1.0, 1.0)).unwrap();
        ukf.process_measurement(&Measurement::lidar(1000, 1.0, 1.0)).unwrap();
        assert_eq!(ukf.weights(), &w);
        assert_eq!(w.len(), N_SIGMA);
        assert_eq!(ukf.x().len(), N_X);
    }
}
