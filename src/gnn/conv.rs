//! Spatio-temporal convolution block (ConvST).
//!
//! A causal temporal window of width `kt` is gathered for every time step,
//! mixed across nodes with the Chebyshev support, projected to
//! `2 * dim_out` channels and gated with a residual connection.

use crate::core::ops::sigmoid;
use crate::core::{Error, ParamKind, ParamMut, Parameterized, Result, Tensor4};
use crate::gnn::align::Align;
use crate::gnn::init::Initializer;
use crate::graph::GraphSupport;
use ndarray::{s, Array1, Array2, Array4, ArrayView4};
use rand::Rng;
use std::sync::Arc;

/// Gated spatio-temporal graph convolution.
#[derive(Clone, Debug)]
pub struct ConvST {
    /// Shared Chebyshev support
    support: Arc<GraphSupport>,
    /// Temporal kernel width
    kt: usize,
    /// Input channels
    dim_in: usize,
    /// Output channels
    dim_out: usize,
    /// Residual aligner
    align: Align,
    /// Projection weights, shape `(2 * dim_out, ks * kt * dim_in)`
    weights: Array2<f32>,
    /// Projection biases, shape `(2 * dim_out)`
    biases: Array1<f32>,
}

impl ConvST {
    /// Create a block with Xavier-uniform weights and zero biases.
    pub fn new<R: Rng + ?Sized>(
        support: Arc<GraphSupport>,
        kt: usize,
        dim_in: usize,
        dim_out: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if kt == 0 || dim_in == 0 || dim_out == 0 {
            return Err(Error::InvalidConfig(format!(
                "ConvST needs positive kt, dim_in and dim_out, got kt={} dim_in={} dim_out={}",
                kt, dim_in, dim_out
            )));
        }

        let align = Align::new(dim_in, dim_out)?;
        let ks = support.order();
        let weights = Initializer::XavierUniform.matrix(2 * dim_out, ks * kt * dim_in, rng)?;
        let biases = Initializer::Zeros.vector(2 * dim_out, rng)?;

        Ok(Self {
            support,
            kt,
            dim_in,
            dim_out,
            align,
            weights,
            biases,
        })
    }

    /// Forward pass: `(B, dim_in, T, N)` to `(B, dim_out, T, N)`.
    pub fn forward(&self, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let (batch, channels, time, nodes) = x.dim();
        if channels != self.dim_in {
            return Err(Error::shape("ConvST input channels", self.dim_in, channels));
        }
        if nodes != self.support.num_nodes() {
            return Err(Error::shape(
                "ConvST node count",
                self.support.num_nodes(),
                nodes,
            ));
        }

        let res = self.align.forward(x.view())?;

        let kt = self.kt;
        let mut padded = Array4::<f32>::zeros((batch, channels, time + kt - 1, nodes));
        padded.slice_mut(s![.., .., ..time, ..]).assign(&x);

        // Row `b * time + t` of node `n` holds the window features, ordered
        // channel-major then kernel offset.
        let rows = batch * time;
        let width = channels * kt;
        let features = Array2::from_shape_fn((nodes, rows * width), |(n, idx)| {
            let (row, f) = (idx / width, idx % width);
            padded[[row / time, f / kt, row % time + f % kt, n]]
        });

        let conv = self.graph_conv(&features, rows, width)?;

        let dim_out = self.dim_out;
        Ok(Array4::from_shape_fn(
            (batch, dim_out, time, nodes),
            |(b, o, t, n)| {
                let r = n * rows + b * time + t;
                let linear = conv[[r, o]] + res[[b, o, t, n]];
                linear * sigmoid(conv[[r, o + dim_out]])
            },
        ))
    }

    /// Chebyshev aggregation followed by the learned projection.
    ///
    /// `features` is `(N, rows * width)`; the result is `(N * rows, 2 * dim_out)`
    /// with row `n * rows + r`.
    fn graph_conv(&self, features: &Array2<f32>, rows: usize, width: usize) -> Result<Array2<f32>> {
        let nodes = self.support.num_nodes();
        let ks = self.support.order();
        let mut out = Array2::<f32>::zeros((nodes * rows, 2 * self.dim_out));

        for k in 0..ks {
            let mixed = self.support.term(k).t().dot(features);
            let mixed = mixed.into_shape((nodes * rows, width))?;
            // Input feature f of order k sits in weight column f * ks + k.
            let w_k = self.weights.slice(s![.., k..;ks]);
            out += &mixed.dot(&w_k.t());
        }

        out += &self.biases;
        Ok(out)
    }

    /// Temporal kernel width.
    pub fn kt(&self) -> usize {
        self.kt
    }

    /// Input channel width.
    pub fn dim_in(&self) -> usize {
        self.dim_in
    }

    /// Output channel width.
    pub fn dim_out(&self) -> usize {
        self.dim_out
    }
}

impl Parameterized for ConvST {
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        vec![
            (ParamKind::Weight, self.weights.view_mut().into_dyn()),
            (ParamKind::Bias, self.biases.view_mut().into_dyn()),
        ]
    }

    fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
