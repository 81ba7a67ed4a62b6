//! Error kinds shared by both engines.

use crate::sirv::Trajectory;
use std::{fmt::Debug, ops::RangeBounds};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A probability, fraction or population value is out of range.
    ///
    /// Always reported before any computation starts.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The ODE solver could not meet its tolerance within its step budget.
    ///
    /// `partial` holds every sample emitted before the failure point `t`.
    #[error("integration failed at t = {t}: {reason}")]
    IntegrationFailure {
        t: f64,
        reason: String,
        partial: Trajectory,
    },
}

/// Check that `num` lies in `range`, naming the parameter on failure.
pub fn check_num<T, R>(name: &str, num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(Error::InvalidParameter(format!(
            "{name} must be in the range {range:?}, but is {num:?}"
        )));
    }
    Ok(())
}

/// Check that `prob` is a probability (or fraction) in `[0, 1]`.
pub fn check_prob(name: &str, prob: f64) -> Result<()> {
    check_num(name, prob, 0.0..=1.0)
}

/// Check that `num` is finite.
pub fn check_finite(name: &str, num: f64) -> Result<()> {
    if !num.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "{name} must be finite, but is {num:?}"
        )));
    }
    Ok(())
}
