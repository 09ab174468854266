//! Small tensor helpers shared by the layers.

use crate::core::{Error, Result, Tensor4};
use ndarray::{concatenate, Array2, ArrayView4, Axis};

/// Logistic sigmoid.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Apply a numerically stable softmax to every row in-place.
pub fn softmax_rows(scores: &mut Array2<f32>) {
    for mut row in scores.rows_mut() {
        if row.is_empty() {
            continue;
        }

        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|s| (s - max).exp());

        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|s| s / sum);
        }
    }
}

/// Fail with a shape error unless `actual` equals `expected`.
pub fn ensure_shape(context: &str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual != expected {
        return Err(Error::shape(context, expected, actual));
    }
    Ok(())
}

/// Concatenate feature tensors along the time axis.
pub fn concat_time(parts: &[ArrayView4<'_, f32>]) -> Result<Tensor4> {
    Ok(concatenate(Axis(2), parts)?)
}

/// Concatenate feature tensors along the channel axis.
pub fn concat_channels(parts: &[ArrayView4<'_, f32>]) -> Result<Tensor4> {
    Ok(concatenate(Axis(1), parts)?)
}
