//! Ellipsoidal coincidence statistic between inspiral triggers.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::event::TriggerEvent;

/// The statistic could not be evaluated for a pair of triggers.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EthincaError {
    /// The averaged parameter-space metric is not positive definite, or the
    /// statistic is not finite. Expected at the tails of parameter space;
    /// callers treat the pair as not coincident.
    #[error("ellipsoidal coincidence statistic failed to converge")]
    NotConverged,
}

fn metric_matrix(g: &[f64; 6]) -> Matrix3<f64> {
    Matrix3::new(g[0], g[1], g[2], g[1], g[3], g[4], g[2], g[4], g[5])
}

/// The ellipsoidal distance between two triggers in (end time, τ0, τ3)
/// space, measured with the average of the two triggers' metrics.
///
/// End times enter with any currently applied time-slide offset, so the
/// statistic is evaluated in slid coordinates.
///
/// # Errors
/// [`EthincaError::NotConverged`] if the averaged metric is not positive
/// definite or the statistic is not finite.
pub fn ethinca_parameter(a: &TriggerEvent, b: &TriggerEvent) -> Result<f64, EthincaError> {
    let dx = Vector3::new(
        (b.end() - a.end()).as_secs_f64(),
        b.params.tau0 - a.params.tau0,
        b.params.tau3 - a.params.tau3,
    );
    let g = (metric_matrix(&a.params.metric) + metric_matrix(&b.params.metric)) / 2.0;
    if g.cholesky().is_none() {
        return Err(EthincaError::NotConverged);
    }
    let statistic = (dx.transpose() * g * dx)[(0, 0)];
    if !statistic.is_finite() {
        return Err(EthincaError::NotConverged);
    }
    Ok(statistic)
}

/// Pairwise coincidence test: true iff the ellipsoidal statistic converges
/// and is at most `threshold`.
///
/// Non-convergence means the pair is not coincident; it is never propagated
/// as an error.
pub fn ethinca_coincidence(a: &TriggerEvent, b: &TriggerEvent, threshold: f64) -> bool {
    matches!(ethinca_parameter(a, b), Ok(e) if e <= threshold)
}
