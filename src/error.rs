use crate::measurement::SensorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a single estimator call. A failed call never mutates the filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter is already initialized")]
    AlreadyInitialized,

    #[error("filter has not been initialized")]
    NotInitialized,

    #[error("no predicted sigma points available, call predict before update")]
    NotPredicted,

    #[error("time delta must be finite and non-negative, got {dt} s")]
    NegativeTimeDelta { dt: f64 },

    #[error("timestamp {current} us precedes previous timestamp {previous} us")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("state covariance is not positive definite, Cholesky factorization failed")]
    CovarianceNotPositiveDefinite,

    #[error("innovation covariance S is singular or near-singular")]
    SingularInnovationCovariance,

    #[error("radar range {range} m is below the minimum of {min_range} m")]
    DegenerateRange { range: f64, min_range: f64 },

    #[error("{0} measurements are disabled in the filter configuration")]
    SensorDisabled(SensorKind),

    #[error("estimate contains NaN or infinite values")]
    NonFiniteEstimate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidStd { name: &'static str, value: f64 },

    #[error("{name} must be finite and positive, got {value}")]
    InvalidRangeFloor { name: &'static str, value: f64 },

    #[error("could not read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path:?}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unsupported sensor type {tag:?}")]
    UnsupportedSensor { line: usize, tag: String },

    #[error("line {line}: missing field {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid value {value:?} for {field}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
