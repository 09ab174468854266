//! Channel attention.
//!
//! Collapses the hidden channel axis of a `(B, d_out, 1, N)` summary into a
//! single output channel, weighted by a context-conditioned softmax.

use crate::core::ops::softmax_rows;
use crate::core::{Error, ParamKind, ParamMut, Parameterized, Result, Tensor4};
use crate::gnn::init::Initializer;
use crate::gnn::temporal::ATTENTION_WEIGHT_STD;
use ndarray::{Array1, Array2, Array4, ArrayView2, ArrayView4};
use rand::Rng;

/// Context-conditioned softmax reduction over hidden channels.
#[derive(Clone, Debug)]
pub struct ChannelAttention {
    /// Number of graph nodes
    num_nodes: usize,
    /// Hidden channels
    d_out: usize,
    /// External context width
    ext_dim: usize,
    /// Per-channel projection of the node vector, shape `(d_out, N)`
    weight1: Array2<f32>,
    /// Context projection, shape `(ext_dim, d_out)`
    weight2: Array2<f32>,
    /// Per-channel bias, shape `(d_out)`
    bias: Array1<f32>,
}

impl ChannelAttention {
    /// Create a channel attention head.
    pub fn new<R: Rng + ?Sized>(
        num_nodes: usize,
        d_out: usize,
        ext_dim: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let weights = Initializer::Normal {
            std: ATTENTION_WEIGHT_STD,
        };
        Ok(Self {
            num_nodes,
            d_out,
            ext_dim,
            weight1: weights.matrix(d_out, num_nodes, rng)?,
            weight2: weights.matrix(ext_dim, d_out, rng)?,
            bias: Initializer::Zeros.vector(d_out, rng)?,
        })
    }

    /// Softmax weights over channels, shape `(B, d_out)`.
    pub fn weights(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let batch = self.check_inputs(query, x)?;

        let mut scores = Array2::from_shape_fn((batch, self.d_out), |(b, c)| {
            let projected: f32 = (0..self.num_nodes)
                .map(|n| x[[b, c, 0, n]] * self.weight1[[c, n]])
                .sum();
            projected + self.bias[c]
        });
        scores += &query.dot(&self.weight2);
        scores.mapv_inplace(f32::tanh);
        softmax_rows(&mut scores);

        Ok(scores)
    }

    /// Weighted sum over channels: `(B, d_out, 1, N)` to `(B, 1, 1, N)`.
    pub fn forward(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let weights = self.weights(query, x)?;

        Ok(Array4::from_shape_fn(
            (weights.nrows(), 1, 1, self.num_nodes),
            |(b, _, _, n)| {
                (0..self.d_out)
                    .map(|c| weights[[b, c]] * x[[b, c, 0, n]])
                    .sum()
            },
        ))
    }

    fn check_inputs(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<usize> {
        let (batch, channels, time, nodes) = x.dim();
        if (channels, time, nodes) != (self.d_out, 1, self.num_nodes) {
            return Err(Error::shape(
                "channel attention input",
                [batch, self.d_out, 1, self.num_nodes],
                x.shape(),
            ));
        }
        if query.dim() != (batch, self.ext_dim) {
            return Err(Error::shape(
                "channel attention context",
                [batch, self.ext_dim],
                query.shape(),
            ));
        }
        Ok(batch)
    }
}

impl Parameterized for ChannelAttention {
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        vec![
            (ParamKind::Weight, self.weight1.view_mut().into_dyn()),
            (ParamKind::Weight, self.weight2.view_mut().into_dyn()),
            (ParamKind::Bias, self.bias.view_mut().into_dyn()),
        ]
    }

    fn num_parameters(&self) -> usize {
        self.weight1.len() + self.weight2.len() + self.bias.len()
    }
}
