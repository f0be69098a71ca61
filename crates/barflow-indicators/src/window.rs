//! Window helpers shared by the step and bulk paths.
//!
//! Both paths gather windows oldest first and reduce them with the same
//! functions, so they produce bit-identical values.

use barflow_core::{NodeError, NodeIo};

/// Last `period` values of input `k` ending at the cursor, oldest first.
pub(crate) fn window(io: &NodeIo<'_>, k: usize, period: usize) -> Result<Vec<f64>, NodeError> {
    let mut values = Vec::with_capacity(period);
    for ago in (0..period).rev() {
        values.push(io.input(k, -(ago as isize))?);
    }
    Ok(values)
}

/// `period` values of input `k` ending at absolute `index`, oldest first.
pub(crate) fn window_abs(
    io: &NodeIo<'_>,
    k: usize,
    index: usize,
    period: usize,
) -> Result<Vec<f64>, NodeError> {
    let start = (index + 1).saturating_sub(period);
    (start..=index).map(|i| io.input_abs(k, i)).collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around `mean`.
pub(crate) fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub(crate) fn highest(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub(crate) fn lowest(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub(crate) fn check_period(name: &str, period: usize) -> Result<(), NodeError> {
    if period == 0 {
        return Err(NodeError::InvalidParameter(format!(
            "{} period must be greater than 0",
            name
        )));
    }
    Ok(())
}
