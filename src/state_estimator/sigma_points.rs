//! Augmented sigma points and the weights used to recombine them.
//!
//! With the augmented dimension `n_aug = 7` and spreading parameter
//! `lambda = 3 - n_aug`, the 15 sigma points are
//!
//! ```text
//! X[0]         = x_aug
//! X[i]         = x_aug + sqrt(lambda + n_aug) * L[:, i-1]     i = 1..=7
//! X[i + n_aug] = x_aug - sqrt(lambda + n_aug) * L[:, i-1]
//! ```
//!
//! where `L` is the lower Cholesky factor of `blockdiag(P, Q)`.

use crate::angle::normalize_angle;
use crate::error::FilterError;
use crate::state_estimator::{
    AugCov, AugSigmaPoints, AugStateVec, SigmaPoints, StateCov, StateVec, Weights, N_AUG, N_SIGMA,
    N_X, YAW,
};
use nalgebra::{Matrix2, SymmetricEigen};

/// Negative eigenvalues of a covariance down to this fraction of its scale are round-off.
const PSD_TOLERANCE: f64 = 1e-9;

pub fn spreading_parameter() -> f64 {
    3.0 - N_AUG as f64
}

/// Weights for mean and covariance reconstruction. They sum to one.
pub fn weights(lambda: f64) -> Weights {
    let n_aug = N_AUG as f64;
    let mut w = Weights::from_element(0.5 / (lambda + n_aug));
    w[0] = lambda / (lambda + n_aug);
    w
}

/// Generates the augmented sigma points of `(x, P)` with process noise covariance `Q`.
///
/// `Q` is taken to be diagonal, so its square root is the element-wise root of
/// its diagonal. Only `P` needs a factorization, which also lets the process
/// noise be exactly zero.
pub fn augmented_sigma_points(
    x: &StateVec,
    P: &StateCov,
    Q: &Matrix2<f64>,
    lambda: f64,
) -> Result<AugSigmaPoints, FilterError> {
    let mut x_aug = AugStateVec::zeros();
    x_aug.fixed_rows_mut::<N_X>(0).copy_from(x);

    let mut L = AugCov::zeros();
    L.fixed_view_mut::<N_X, N_X>(0, 0).copy_from(&covariance_sqrt(P)?);
    L[(N_X, N_X)] = Q[(0, 0)].sqrt();
    L[(N_X + 1, N_X + 1)] = Q[(1, 1)].sqrt();
    if L.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::CovarianceNotPositiveDefinite);
    }

    let spread = (lambda + N_AUG as f64).sqrt();

    let mut X_sig_aug = AugSigmaPoints::zeros();
    X_sig_aug.set_column(0, &x_aug);
    for i in 0..N_AUG {
        let offset = L.column(i) * spread;
        X_sig_aug.set_column(i + 1, &(x_aug + offset));
        X_sig_aug.set_column(i + 1 + N_AUG, &(x_aug - offset));
    }

    Ok(X_sig_aug)
}

/// A square root `L` of a covariance, `L * L^T = P`.
///
/// The lower Cholesky factor when `P` is positive definite. A positive
/// semi-definite `P` falls back to `V * sqrt(D)` from its eigen decomposition,
/// with round-off negatives clamped to zero.
pub fn covariance_sqrt(P: &StateCov) -> Result<StateCov, FilterError> {
    if P.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::CovarianceNotPositiveDefinite);
    }
    if let Some(L) = cholesky_factor(P) {
        return Ok(L);
    }

    let P_sym = (P + P.transpose()) * 0.5;
    let eigen = SymmetricEigen::try_new(P_sym, f64::EPSILON, 1000)
        .ok_or(FilterError::CovarianceNotPositiveDefinite)?;
    let scale = eigen.eigenvalues.amax().max(1.0);
    if eigen.eigenvalues.min() < -PSD_TOLERANCE * scale {
        return Err(FilterError::CovarianceNotPositiveDefinite);
    }
    let sqrt_d = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    Ok(eigen.eigenvectors * StateCov::from_diagonal(&sqrt_d))
}

/// Lower Cholesky factor with a strictly positive diagonal.
fn cholesky_factor(P: &StateCov) -> Option<StateCov> {
    let L = P.cholesky()?.l();
    let usable = L.diagonal().iter().all(|&d| d > 0.0) && L.iter().all(|v| v.is_finite());
    usable.then_some(L)
}

pub fn is_positive_definite(P: &StateCov) -> bool {
    cholesky_factor(P).is_some()
}

pub fn is_positive_semidefinite(P: &StateCov) -> bool {
    covariance_sqrt(P).is_ok()
}

/// Heading-aware state difference `a - b`.
pub fn state_residual(a: &StateVec, b: &StateVec) -> StateVec {
    let mut d = a - b;
    d[YAW] = normalize_angle(d[YAW]);
    d
}

pub fn predicted_mean(X_sig_pred: &SigmaPoints, weights: &Weights) -> StateVec {
    X_sig_pred * weights
}

pub fn predicted_covariance(X_sig_pred: &SigmaPoints, x: &StateVec, weights: &Weights) -> StateCov {
    let mut P = StateCov::zeros();
    for i in 0..N_SIGMA {
        let x_diff = state_residual(&X_sig_pred.column(i).into_owned(), x);
        P += x_diff * x_diff.transpose() * weights[i];
    }
    P
}

/// Covariance of the predicted sigma points about the central one.
///
/// Leaves out the negative-weight centre term, so the result is positive
/// semi-definite. It exceeds [`predicted_covariance`] by
/// `(x - X_0) * (x - X_0)^T`.
pub fn central_covariance(X_sig_pred: &SigmaPoints, weights: &Weights) -> StateCov {
    let X_0 = X_sig_pred.column(0).into_owned();
    let mut P = StateCov::zeros();
    for i in 1..N_SIGMA {
        let x_diff = state_residual(&X_sig_pred.column(i).into_owned(), &X_0);
        P += x_diff * x_diff.transpose() * weights[i];
    }
    P
}
