//! Per-channel batch normalization over `(B, C, T, N)` tensors.

use crate::core::{Error, ParamKind, ParamMut, Parameterized, Result, Tensor4};
use ndarray::{Array1, ArrayView1, ArrayView4, Axis};

/// Default numerical floor added to the variance.
pub const BATCH_NORM_EPS: f32 = 1e-5;

/// Batch normalization applied with stored running statistics.
///
/// The statistics are buffers, not learned parameters: they are replaced
/// wholesale by the training framework through [`BatchNorm2d::set_running_stats`].
#[derive(Clone, Debug)]
pub struct BatchNorm2d {
    /// Learned scale
    gamma: Array1<f32>,
    /// Learned shift
    beta: Array1<f32>,
    /// Running mean per channel
    running_mean: Array1<f32>,
    /// Running variance per channel
    running_var: Array1<f32>,
    /// Variance floor
    eps: f32,
}

impl BatchNorm2d {
    /// Create a norm with unit scale, zero shift and standard running stats.
    pub fn new(channels: usize) -> Self {
        Self {
            gamma: Array1::ones(channels),
            beta: Array1::zeros(channels),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            eps: BATCH_NORM_EPS,
        }
    }

    /// Number of normalized channels.
    pub fn channels(&self) -> usize {
        self.gamma.len()
    }

    /// Replace the running statistics.
    pub fn set_running_stats(&mut self, mean: ArrayView1<'_, f32>, var: ArrayView1<'_, f32>) -> Result<()> {
        let channels = self.channels();
        if mean.len() != channels || var.len() != channels {
            return Err(Error::shape(
                "batch norm running stats",
                (channels, channels),
                (mean.len(), var.len()),
            ));
        }
        if var.iter().any(|&v| !(v >= 0.0)) {
            return Err(Error::InvalidConfig(
                "batch norm running variance must be non-negative".to_string(),
            ));
        }
        self.running_mean.assign(&mean);
        self.running_var.assign(&var);
        Ok(())
    }

    /// Normalize each channel: `(x - mean) / sqrt(var + eps) * gamma + beta`.
    pub fn forward(&self, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let channels = x.len_of(Axis(1));
        if channels != self.channels() {
            return Err(Error::shape("batch norm channels", self.channels(), channels));
        }

        let mut out = x.to_owned();
        for (c, mut channel) in out.axis_iter_mut(Axis(1)).enumerate() {
            let scale = self.gamma[c] / (self.running_var[c] + self.eps).sqrt();
            let shift = self.beta[c] - self.running_mean[c] * scale;
            channel.mapv_inplace(|v| v * scale + shift);
        }
        Ok(out)
    }
}

impl Parameterized for BatchNorm2d {
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        vec![
            (ParamKind::Weight, self.gamma.view_mut().into_dyn()),
            (ParamKind::Bias, self.beta.view_mut().into_dyn()),
        ]
    }

    fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array4};

    #[test]
    fn test_default_is_near_identity() {
        let norm = BatchNorm2d::new(2);
        let x = Array4::from_shape_fn((1, 2, 2, 2), |(_, c, t, n)| (c + t + n) as f32);
        let y = norm.forward(x.view()).unwrap();

        let factor = 1.0 / (1.0 + BATCH_NORM_EPS).sqrt();
        for (a, b) in x.iter().zip(y.iter()) {
            assert_abs_diff_eq!(a * factor, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_running_stats() {
        let mut norm = BatchNorm2d::new(2);
        norm.set_running_stats(array![1.0, -2.0].view(), array![4.0, 0.25].view())
            .unwrap();

        let x = Array4::<f32>::from_elem((1, 2, 1, 1), 3.0);
        let y = norm.forward(x.view()).unwrap();
        assert_abs_diff_eq!(y[[0, 0, 0, 0]], 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(y[[0, 1, 0, 0]], 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut norm = BatchNorm2d::new(3);
        let x = Array4::<f32>::zeros((1, 2, 1, 1));
        assert!(norm.forward(x.view()).is_err());
        assert!(norm
            .set_running_stats(array![0.0, 0.0].view(), array![1.0, 1.0].view())
            .is_err());
        assert!(norm
            .set_running_stats(array![0.0, 0.0, 0.0].view(), array![1.0, -1.0, 1.0].view())
            .is_err());
    }

    #[test]
    fn test_parameters() {
        let mut norm = BatchNorm2d::new(4);
        assert_eq!(norm.num_parameters(), 8);
        assert_eq!(norm.parameters_mut().len(), 2);
    }
}
