//! Stacked ConvST feature extractors.

use crate::core::{Error, ParamMut, Parameterized, Result, Tensor4};
use crate::gnn::conv::ConvST;
use crate::gnn::norm::BatchNorm2d;
use crate::graph::GraphSupport;
use ndarray::ArrayView4;
use rand::Rng;
use std::sync::Arc;

/// One ConvST block with an optional batch norm after it.
#[derive(Clone, Debug)]
pub struct StBlock {
    /// Spatio-temporal convolution
    pub conv: ConvST,
    /// Normalization applied to the block output
    pub norm: Option<BatchNorm2d>,
}

/// A sequence of ConvST blocks mapping `dim_in` to `dim_out` channels.
///
/// The first block changes the channel width; the rest keep `dim_out`.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    blocks: Vec<StBlock>,
}

impl FeatureExtractor {
    /// Build one block per entry of `kernels` (temporal kernel widths).
    pub fn new<R: Rng + ?Sized>(
        support: Arc<GraphSupport>,
        kernels: &[usize],
        dim_in: usize,
        dim_out: usize,
        batch_norm: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if kernels.is_empty() {
            return Err(Error::InvalidConfig(
                "feature extractor needs at least one ConvST block".to_string(),
            ));
        }

        let mut blocks = Vec::with_capacity(kernels.len());
        let mut current_dim = dim_in;
        for &kt in kernels {
            blocks.push(StBlock {
                conv: ConvST::new(Arc::clone(&support), kt, current_dim, dim_out, rng)?,
                norm: batch_norm.then(|| BatchNorm2d::new(dim_out)),
            });
            current_dim = dim_out;
        }

        Ok(Self { blocks })
    }

    /// Run every block in order; the time width is preserved.
    pub fn forward(&self, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let mut blocks = self.blocks.iter();
        let mut hidden = match blocks.next() {
            Some(first) => first.forward(x)?,
            None => return Ok(x.to_owned()),
        };
        for block in blocks {
            hidden = block.forward(hidden.view())?;
        }
        Ok(hidden)
    }

    /// Blocks in evaluation order.
    pub fn blocks(&self) -> &[StBlock] {
        &self.blocks
    }

    /// Mutable access for the training framework (e.g. running statistics).
    pub fn blocks_mut(&mut self) -> &mut [StBlock] {
        &mut self.blocks
    }
}

impl StBlock {
    fn forward(&self, x: ArrayView4<'_, f32>) -> Result<Tensor4> {
        let out = self.conv.forward(x)?;
        match &self.norm {
            Some(norm) => norm.forward(out.view()),
            None => Ok(out),
        }
    }
}

impl Parameterized for FeatureExtractor {
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>> {
        let mut params = Vec::new();
        for block in &mut self.blocks {
            params.extend(block.conv.parameters_mut());
            if let Some(norm) = block.norm.as_mut() {
                params.extend(norm.parameters_mut());
            }
        }
        params
    }

    fn num_parameters(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.conv.num_parameters() + b.norm.as_ref().map_or(0, |n| n.num_parameters()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn support() -> Arc<GraphSupport> {
        let adj = array![[0.0, 1.0, 1.0], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        Arc::new(GraphSupport::from_adjacency(adj.view(), 3).unwrap())
    }

    #[test]
    fn test_long_term_stack() {
        let mut rng = StdRng::seed_from_u64(31);
        let extractor =
            FeatureExtractor::new(support(), &[3, 3, 3, 3, 3, 2], 2, 8, true, &mut rng).unwrap();
        assert_eq!(extractor.blocks().len(), 6);
        assert_eq!(extractor.blocks()[0].conv.dim_in(), 2);
        assert_eq!(extractor.blocks()[5].conv.kt(), 2);

        let x = Array4::from_shape_fn((2, 2, 6, 3), |(b, c, t, n)| (b + c + t + n) as f32 * 0.1);
        let y = extractor.forward(x.view()).unwrap();
        assert_eq!(y.shape(), &[2, 8, 6, 3]);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_batch_norm_toggle() {
        let mut rng = StdRng::seed_from_u64(32);
        let with_norm = FeatureExtractor::new(support(), &[3, 3], 1, 4, true, &mut rng).unwrap();
        let without = FeatureExtractor::new(support(), &[3, 3], 1, 4, false, &mut rng).unwrap();

        assert!(with_norm.blocks().iter().all(|b| b.norm.is_some()));
        assert!(without.blocks().iter().all(|b| b.norm.is_none()));
        assert_eq!(
            with_norm.num_parameters(),
            without.num_parameters() + 2 * 2 * 4
        );
    }

    #[test]
    fn test_rejects_empty_stack() {
        let mut rng = StdRng::seed_from_u64(33);
        assert!(matches!(
            FeatureExtractor::new(support(), &[], 1, 4, true, &mut rng),
            Err(Error::InvalidConfig(_))
        ));
    }
}
