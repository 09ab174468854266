//! Model configuration.
//!
//! Hyperparameters are read once at construction and never change afterwards.

use crate::core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hyperparameters of the STG2Seq model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stg2SeqConfig {
    /// History length fed to the long-term extractor
    pub input_window: usize,
    /// Forecast horizon
    pub output_window: usize,
    /// Width of the short-term lookback window
    pub window: usize,
    /// Hidden channel width
    pub dim_out: usize,
    /// Chebyshev order K
    pub ks: usize,
    /// Temporal kernel widths of the long-term ConvST stack
    pub long_term_kernels: Vec<usize>,
    /// Temporal kernel widths of the short-term ConvST stack
    pub short_term_kernels: Vec<usize>,
    /// Whether each ConvST block is followed by batch normalization
    pub batch_norm: bool,
    /// Label value treated as missing by the loss (`None` masks NaN)
    pub null_value: Option<f32>,
}

impl Default for Stg2SeqConfig {
    fn default() -> Self {
        Self {
            input_window: 1,
            output_window: 1,
            window: 3,
            dim_out: 32,
            ks: 3,
            long_term_kernels: vec![3, 3, 3, 3, 3, 2],
            short_term_kernels: vec![3, 3, 3],
            batch_norm: true,
            null_value: None,
        }
    }
}

impl Stg2SeqConfig {
    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check window relations and layer sizes.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("input_window", self.input_window),
            ("output_window", self.output_window),
            ("window", self.window),
            ("dim_out", self.dim_out),
            ("ks", self.ks),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be at least 1", name)));
            }
        }

        if self.window > self.input_window {
            return Err(Error::InvalidConfig(format!(
                "window ({}) must not exceed input_window ({})",
                self.window, self.input_window
            )));
        }

        for (name, kernels) in [
            ("long_term_kernels", &self.long_term_kernels),
            ("short_term_kernels", &self.short_term_kernels),
        ] {
            if kernels.is_empty() || kernels.contains(&0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be non-empty with positive widths, got {:?}",
                    name, kernels
                )));
            }
        }

        Ok(())
    }
}

/// Dataset-side description of the sensor network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataFeatures {
    /// Symmetric non-negative adjacency matrix, `(num_nodes, num_nodes)`
    pub adj_mx: Array2<f64>,
    /// Number of sensors
    pub num_nodes: usize,
    /// Features per node and step in the raw tensors
    pub feature_dim: usize,
    /// Predicted features per node (1 or 2)
    pub output_dim: usize,
    /// External context features following the predicted ones in `y`
    pub ext_dim: usize,
}

impl DataFeatures {
    /// Describe a network by its adjacency matrix, with default feature sizes.
    pub fn new(adj_mx: Array2<f64>) -> Self {
        let num_nodes = adj_mx.nrows();
        Self {
            adj_mx,
            num_nodes,
            feature_dim: 2,
            output_dim: 2,
            ext_dim: 1,
        }
    }

    /// Set the raw feature width.
    pub fn with_feature_dim(mut self, feature_dim: usize) -> Self {
        self.feature_dim = feature_dim;
        self
    }

    /// Set the number of predicted features.
    pub fn with_output_dim(mut self, output_dim: usize) -> Self {
        self.output_dim = output_dim;
        self
    }

    /// Set the external context width.
    pub fn with_ext_dim(mut self, ext_dim: usize) -> Self {
        self.ext_dim = ext_dim;
        self
    }

    /// Check that the adjacency matrix matches `num_nodes`.
    pub fn validate(&self) -> Result<()> {
        let (rows, cols) = self.adj_mx.dim();
        if self.num_nodes == 0 || rows != self.num_nodes || cols != self.num_nodes {
            return Err(Error::InvalidConfig(format!(
                "adjacency matrix is {}x{} but num_nodes is {}",
                rows, cols, self.num_nodes
            )));
        }
        if self.output_dim == 0 || self.feature_dim < self.output_dim {
            return Err(Error::InvalidConfig(format!(
                "feature_dim ({}) must be at least output_dim ({}) and output_dim positive",
                self.feature_dim, self.output_dim
            )));
        }
        Ok(())
    }
}
