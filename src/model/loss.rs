//! Masked regression losses.
//!
//! Missing labels are excluded through a mask that is rescaled to mean one,
//! so the loss stays comparable across batches with different amounts of
//! missing data.

use crate::core::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, Zip};

/// Labels whose magnitude falls below this are treated as exact zeros.
const ZERO_SNAP: f32 = 1e-4;

/// Masked mean squared error.
pub fn masked_mse(
    preds: ArrayViewD<'_, f32>,
    labels: ArrayViewD<'_, f32>,
    null_value: Option<f32>,
) -> Result<f32> {
    masked_mean(preds, labels, null_value, |diff| diff * diff)
}

/// Masked mean absolute error.
pub fn masked_mae(
    preds: ArrayViewD<'_, f32>,
    labels: ArrayViewD<'_, f32>,
    null_value: Option<f32>,
) -> Result<f32> {
    masked_mean(preds, labels, null_value, f32::abs)
}

/// Masked root mean squared error.
pub fn masked_rmse(
    preds: ArrayViewD<'_, f32>,
    labels: ArrayViewD<'_, f32>,
    null_value: Option<f32>,
) -> Result<f32> {
    Ok(masked_mse(preds, labels, null_value)?.sqrt())
}

/// Validity mask: 1 where the label is present, 0 where it is missing.
pub fn null_mask(labels: ArrayViewD<'_, f32>, null_value: Option<f32>) -> ArrayD<f32> {
    labels.mapv(|label| {
        let label = if label.abs() < ZERO_SNAP { 0.0 } else { label };
        let missing = match null_value {
            None => label.is_nan(),
            Some(null) => label == null,
        };
        if missing {
            0.0
        } else {
            1.0
        }
    })
}

fn masked_mean<F>(
    preds: ArrayViewD<'_, f32>,
    labels: ArrayViewD<'_, f32>,
    null_value: Option<f32>,
    error: F,
) -> Result<f32>
where
    F: Fn(f32) -> f32,
{
    if preds.shape() != labels.shape() {
        return Err(Error::shape("masked loss", labels.shape(), preds.shape()));
    }
    if labels.is_empty() {
        return Ok(0.0);
    }

    let mut mask = null_mask(labels.view(), null_value);
    let mask_mean = mask.mean().unwrap_or(0.0);
    mask.mapv_inplace(|m| {
        let scaled = m / mask_mean;
        if scaled.is_nan() {
            0.0
        } else {
            scaled
        }
    });

    let mut total = 0.0_f64;
    Zip::from(&preds)
        .and(&labels)
        .and(&mask)
        .for_each(|&p, &l, &m| {
            let l = if l.abs() < ZERO_SNAP { 0.0 } else { l };
            let loss = error(p - l) * m;
            if !loss.is_nan() {
                total += loss as f64;
            }
        });

    Ok((total / labels.len() as f64) as f32)
}
