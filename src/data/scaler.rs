//! Scalers mapping raw measurements to the model's normalized range.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use ndarray::{ArrayD, ArrayViewD};

/// A pure, element-wise, shape-preserving normalization.
pub trait Scaler: Debug + Send + Sync {
    /// Map raw values into the normalized range.
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32>;

    /// Map normalized values back to physical units.
    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32>;
}

/// Identity scaler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoneScaler;

impl Scaler for NoneScaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.to_owned()
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.to_owned()
    }
}

/// Divides by the maximum value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalScaler {
    pub max: f32,
}

impl NormalScaler {
    /// Create from a known maximum.
    pub fn new(max: f32) -> Self {
        Self { max }
    }

    /// Use the maximum of `data`.
    pub fn fit(data: ArrayViewD<'_, f32>) -> Self {
        Self::new(data.iter().cloned().fold(f32::NEG_INFINITY, f32::max))
    }
}

impl Scaler for NormalScaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| x / self.max)
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| x * self.max)
    }
}

/// Z-score normalization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f32,
    pub std: f32,
}

impl StandardScaler {
    /// Create from known statistics.
    pub fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }

    /// Use the mean and population standard deviation of `data`.
    pub fn fit(data: ArrayViewD<'_, f32>) -> Self {
        let mean = data.mean().unwrap_or(0.0);
        Self::new(mean, data.std(0.0))
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| (x - self.mean) / self.std)
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| x * self.std + self.mean)
    }
}

/// Min-max scaling into `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinMax01Scaler {
    pub min: f32,
    pub max: f32,
}

impl MinMax01Scaler {
    /// Create from a known range.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Use the range of `data`.
    pub fn fit(data: ArrayViewD<'_, f32>) -> Self {
        let (min, max) = min_max(&data);
        Self::new(min, max)
    }
}

impl Scaler for MinMax01Scaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| (x - self.min) / (self.max - self.min))
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| x * (self.max - self.min) + self.min)
    }
}

/// Min-max scaling into `[-1, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinMax11Scaler {
    pub min: f32,
    pub max: f32,
}

impl MinMax11Scaler {
    /// Create from a known range.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Use the range of `data`.
    pub fn fit(data: ArrayViewD<'_, f32>) -> Self {
        let (min, max) = min_max(&data);
        Self::new(min, max)
    }
}

impl Scaler for MinMax11Scaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| (x - self.min) / (self.max - self.min) * 2.0 - 1.0)
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| (x + 1.0) / 2.0 * (self.max - self.min) + self.min)
    }
}

/// `ln(x + eps)` scaling for heavy-tailed counts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogScaler {
    pub eps: f32,
}

impl Default for LogScaler {
    fn default() -> Self {
        Self { eps: 0.999 }
    }
}

impl Scaler for LogScaler {
    fn transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| (x + self.eps).ln())
    }

    fn inverse_transform(&self, data: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        data.mapv(|x| x.exp() - self.eps)
    }
}

fn min_max(data: &ArrayViewD<'_, f32>) -> (f32, f32) {
    data.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
        (lo.min(x), hi.max(x))
    })
}
