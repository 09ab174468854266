//! Temporal attention.
//!
//! Scores each time step of a `(B, d_out, T, N)` tensor from its flattened
//! node-channel slab plus an external context bias, then collapses the time
//! axis with the softmax weights.

use crate::core::ops::softmax_rows;
use crate::core::{Error, ParamKind, ParamMut, Parameterized, Result, Tensor4};
use crate::gnn::init::Initializer;
use ndarray::{Array1, Array2, Array4, ArrayView2, ArrayView4};
use rand::Rng;

/// Standard deviation of the normal weight initializer.
pub const ATTENTION_WEIGHT_STD: f32 = 0.01;

/// Half-width of the uniform bias initializer.
pub const TEMPORAL_BIAS_SCALE: f32 = 0.07;

/// Context-conditioned softmax reduction over time.
#[derive(Clone, Debug)]
pub struct TemporalAttention {
    /// Number of attended time steps
    len_time: usize,
    /// Number of graph nodes
    num_nodes: usize,
    /// Hidden channels
    d_out: usize,
    /// External context width
    ext_dim: usize,
    /// Per-step projection of the node-channel slab, shape `(T, N * d_out)`
    weight1: Array2<f32>,
    /// Context projection, shape `(ext_dim, T)`
    weight2: Array2<f32>,
    /// Per-step bias, shape `(T)`
    bias: Array1<f32>,
}

impl TemporalAttention {
    /// Create a temporal attention stage.
    pub fn new<R: Rng + ?Sized>(
        len_time: usize,
        num_nodes: usize,
        d_out: usize,
        ext_dim: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let weights = Initializer::Normal {
            std: ATTENTION_WEIGHT_STD,
        };
        Ok(Self {
            len_time,
            num_nodes,
            d_out,
            ext_dim,
            weight1: weights.matrix(len_time, num_nodes * d_out, rng)?,
            weight2: weights.matrix(ext_dim, len_time, rng)?,
            bias: Initializer::Uniform {
                scale: TEMPORAL_BIAS_SCALE,
            }
            .vector(len_time, rng)?,
        })
    }

    /// Softmax weights over time, shape `(B, T)`.
    pub fn weights(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let batch = self.check_inputs(query, x)?;
        let d_out = self.d_out;

        let mut scores = Array2::from_shape_fn((batch, self.len_time), |(b, t)| {
            let mut score = self.bias[t];
            for c in 0..d_out {
                for n in 0..self.num_nodes {
                    score += x[[b, c, t, n]] * self.weight1[[t, n * d_out + c]];
                }
            }
            score
        });
        scores += &query.dot(&self.weight2);
        scores.mapv_inplace(f32::tanh);
        softmax_rows(&mut scores);

        Ok(scores)
    }

    /// Weighted sum over time: `(B, d_out, T, N)` to `(B, d_out, 1, N)`.
    pub fn forward(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let weights = self.weights(query, x)?;

        Ok(Array4::from_shape_fn(
            (weights.nrows(), self.d_out, 1, self.num_nodes),
            |(b, c, _, n)| {
                (0..self.len_time)
                    .map(|t| weights[[b, t]] * x[[b, c, t, n]])
                    .sum()
            },
        ))
    }

    /// Number of attended time steps.
    pub fn len_time(&self) -> usize {
        self.len_time
    }

    fn check_inputs(&self, query: ArrayView2<'_, f32>, x: ArrayView4<'_, f32>) -> Result<usize> {
        let (batch, channels, time, nodes) = x.dim();
        if (channels, time, nodes) != (self.d_out, self.len_time, self.num_nodes) {
            return Err(Error::shape(
                "temporal attention input",
                [batch, self.d_out, self.len_time, self.num_nodes],
                x.shape(),
            ));
        }
        if query.dim() != (batch, self.ext_dim) {
            return Err(Error::shape(
                "temporal attention context",
                [batch, self.ext_dim],
                query.shape(),
            ));
        }
        Ok(batch)
    }
}

impl Parameterized for TemporalAttention {
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random<R: Rng>(shape: (usize, usize, usize, usize), rng: &mut R) -> Tensor4 {
        Array4::from_shape_fn(shape, |_| rng.gen_range(-3.0..3.0))
    }

    #[test]
    fn test_weights_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut attn = TemporalAttention::new(5, 4, 3, 2, &mut rng).unwrap();
        // Larger weights so the distribution is far from uniform.
        for (_, mut p) in attn.parameters_mut() {
            p.mapv_inplace(|v| v * 100.0);
        }

        for _ in 0..5 {
            let x = random((3, 3, 5, 4), &mut rng);
            let query = Array2::from_shape_fn((3, 2), |_| rng.gen_range(-1.0..1.0));
            let w = attn.weights(query.view(), x.view()).unwrap();

            assert_eq!(w.dim(), (3, 5));
            for row in w.rows() {
                assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
                assert!(row.iter().all(|&p| p >= 0.0));
            }
        }
    }

    #[test]
    fn test_forward_is_convex_combination() {
        let mut rng = StdRng::seed_from_u64(12);
        let attn = TemporalAttention::new(4, 2, 2, 1, &mut rng).unwrap();
        let x = random((2, 2, 4, 2), &mut rng);
        let query = Array2::<f32>::from_elem((2, 1), 0.5);

        let y = attn.forward(query.view(), x.view()).unwrap();
        assert_eq!(y.shape(), &[2, 2, 1, 2]);

        for ((b, c, _, n), &v) in y.indexed_iter() {
            let series: Vec<f32> = (0..4).map(|t| x[[b, c, t, n]]).collect();
            let min = series.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = series.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            assert!(v >= min - 1e-5 && v <= max + 1e-5);
        }
    }

    #[test]
    fn test_zero_weights_uniform_over_time() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut attn = TemporalAttention::new(4, 1, 1, 1, &mut rng).unwrap();
        for (_, mut p) in attn.parameters_mut() {
            p.fill(0.0);
        }

        let x = Array4::from_shape_fn((1, 1, 4, 1), |(_, _, t, _)| t as f32);
        let y = attn.forward(Array2::<f32>::zeros((1, 1)).view(), x.view()).unwrap();
        assert_abs_diff_eq!(y[[0, 0, 0, 0]], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        let mut rng = StdRng::seed_from_u64(14);
        let attn = TemporalAttention::new(4, 3, 2, 2, &mut rng).unwrap();

        let x = Array4::<f32>::zeros((2, 2, 3, 3));
        let query = Array2::<f32>::zeros((2, 2));
        assert!(attn.forward(query.view(), x.view()).is_err());

        let x = Array4::<f32>::zeros((2, 2, 4, 3));
        let query = Array2::<f32>::zeros((2, 1));
        assert!(matches!(
            attn.forward(query.view(), x.view()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_parameter_count() {
        let mut rng = StdRng::seed_from_u64(15);
        let attn = TemporalAttention::new(5, 4, 3, 2, &mut rng).unwrap();
        assert_eq!(attn.num_parameters(), 5 * 12 + 2 * 5 + 5);
        assert_eq!(attn.len_time(), 5);
    }
}
