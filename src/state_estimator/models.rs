pub mod dynamic;
pub mod measurement;

use crate::error::FilterError;

pub trait DynamicModel {
    type State;
    type AugmentedState;
    type Covariance;

    /// Propagates one augmented sigma point (state and noise sample) by `ts` seconds.
    fn f(&self, x_aug: &Self::AugmentedState, ts: f64) -> Self::State;
    /// Covariance of the noise part of the augmented state.
    fn Q(&self) -> Self::Covariance;
}

pub trait MeasurementModel {
    type State;
    type Measurement;
    type Covariance;

    fn dim(&self) -> usize;
    fn h(&self, x: &Self::State) -> Result<Self::Measurement, FilterError>;
    fn R(&self) -> Self::Covariance;
    /// a - b, with angular components wrapped.
    fn residual(&self, a: &Self::Measurement, b: &Self::Measurement) -> Self::Measurement;
}
