//! Chebyshev polynomial support for spectral graph convolution.

use crate::core::{Error, Result};
use crate::graph::laplacian::scaled_laplacian;
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use tracing::debug;

/// Stack `[T_0 = I, T_1 = L, T_k = 2 L T_{k-1} - T_{k-2}, ...]` into an
/// `N x (ks * N)` matrix.
pub fn cheb_poly(lap: ArrayView2<'_, f64>, ks: usize) -> Result<Array2<f64>> {
    if ks == 0 {
        return Err(Error::InvalidConfig(
            "Chebyshev order ks must be at least 1".to_string(),
        ));
    }
    let (n, cols) = lap.dim();
    if n != cols {
        return Err(Error::shape("cheb_poly laplacian", [n, n], [n, cols]));
    }

    let mut terms: Vec<Array2<f64>> = Vec::with_capacity(ks);
    terms.push(Array2::eye(n));
    if ks > 1 {
        terms.push(lap.to_owned());
    }
    for k in 2..ks {
        let next = 2.0 * lap.dot(&terms[k - 1]) - &terms[k - 2];
        terms.push(next);
    }

    let views: Vec<ArrayView2<'_, f64>> = terms.iter().map(|t| t.view()).collect();
    Ok(concatenate(Axis(1), &views)?)
}

/// Read-only graph support shared by every convolution block.
#[derive(Clone, Debug)]
pub struct GraphSupport {
    /// Stacked Chebyshev terms, shape `(num_nodes, order * num_nodes)`
    matrix: Array2<f32>,
    /// Chebyshev order K
    order: usize,
    /// Number of graph nodes N
    num_nodes: usize,
    /// Eigenvalue used to rescale the Laplacian
    lambda_max: f64,
}

impl GraphSupport {
    /// Build the support from a raw adjacency matrix.
    pub fn from_adjacency(adj: ArrayView2<'_, f64>, order: usize) -> Result<Self> {
        let scaled = scaled_laplacian(adj)?;
        let stacked = cheb_poly(scaled.matrix.view(), order)?;
        let num_nodes = stacked.nrows();
        debug!(
            num_nodes,
            order,
            lambda_max = scaled.lambda_max,
            "built Chebyshev graph support"
        );

        Ok(Self {
            matrix: stacked.mapv(|v| v as f32),
            order,
            num_nodes,
            lambda_max: scaled.lambda_max,
        })
    }

    /// Stacked support matrix.
    pub fn matrix(&self) -> ArrayView2<'_, f32> {
        self.matrix.view()
    }

    /// The `k`-th Chebyshev term as an `N x N` view.
    pub fn term(&self, k: usize) -> ArrayView2<'_, f32> {
        let n = self.num_nodes;
        self.matrix.slice(s![.., k * n..(k + 1) * n])
    }

    /// Chebyshev order K.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of graph nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Largest eigenvalue of the normalized Laplacian.
    pub fn lambda_max(&self) -> f64 {
        self.lambda_max
    }
}
