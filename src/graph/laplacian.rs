//! Scaled graph Laplacian.
//!
//! Builds `L = D - W`, symmetric-normalizes it and rescales the spectrum
//! into `[-1, 1]` using the largest eigenvalue.

use crate::core::{Error, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView2};
use tracing::{debug, warn};

/// Iteration cap handed to the symmetric eigen solver.
const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// Relative tolerance for the symmetry check on the adjacency matrix.
const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Rescaled Laplacian together with the eigenvalue used to scale it.
#[derive(Clone, Debug)]
pub struct ScaledLaplacian {
    /// `2 L / lambda_max - I`
    pub matrix: Array2<f64>,
    /// Largest eigenvalue of the normalized Laplacian
    pub lambda_max: f64,
    /// Number of nodes with zero degree
    pub isolated_nodes: usize,
}

/// Compute the scaled Laplacian `2 L / lambda_max - I` of a weight matrix.
///
/// Entry `(i, j)` is normalized by `1 / sqrt(d_i * d_j)` only when both
/// degrees are positive; rows and columns of isolated nodes keep their
/// raw Laplacian values.
pub fn scaled_laplacian(w: ArrayView2<'_, f64>) -> Result<ScaledLaplacian> {
    validate_adjacency(w)?;
    let n = w.nrows();

    let degrees: Vec<f64> = w.rows().into_iter().map(|row| row.sum()).collect();

    let mut lap = w.mapv(|v| -v);
    for i in 0..n {
        lap[[i, i]] = degrees[i];
    }

    for i in 0..n {
        for j in 0..n {
            if degrees[i] > 0.0 && degrees[j] > 0.0 {
                lap[[i, j]] /= (degrees[i] * degrees[j]).sqrt();
            }
        }
    }

    let isolated_nodes = degrees.iter().filter(|&&d| d <= 0.0).count();
    if isolated_nodes > 0 {
        warn!(isolated_nodes, "graph has isolated nodes; their Laplacian entries stay unnormalized");
    }

    let lambda_max = largest_eigenvalue(&lap)?;
    if !lambda_max.is_finite() || lambda_max <= f64::EPSILON {
        return Err(Error::DegenerateGraph(format!(
            "largest Laplacian eigenvalue is {}, graph needs at least one weighted edge",
            lambda_max
        )));
    }
    debug!(num_nodes = n, lambda_max, "scaled graph Laplacian");

    let mut matrix = lap.mapv(|v| 2.0 * v / lambda_max);
    for i in 0..n {
        matrix[[i, i]] -= 1.0;
    }

    Ok(ScaledLaplacian {
        matrix,
        lambda_max,
        isolated_nodes,
    })
}

/// Algebraically largest eigenvalue of a symmetric matrix.
fn largest_eigenvalue(lap: &Array2<f64>) -> Result<f64> {
    let n = lap.nrows();
    let m = DMatrix::from_fn(n, n, |i, j| lap[[i, j]]);

    let eigen = SymmetricEigen::try_new(m, f64::EPSILON, MAX_EIGEN_ITERATIONS).ok_or_else(|| {
        Error::EigenSolverFailed(format!(
            "no convergence within {} iterations on a {}x{} Laplacian",
            MAX_EIGEN_ITERATIONS, n, n
        ))
    })?;

    Ok(eigen
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max))
}

fn validate_adjacency(w: ArrayView2<'_, f64>) -> Result<()> {
    let (rows, cols) = w.dim();
    if rows == 0 || rows != cols {
        return Err(Error::InvalidGraph(format!(
            "adjacency matrix must be square and non-empty, got {}x{}",
            rows, cols
        )));
    }

    let scale = w.iter().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);
    for ((i, j), &v) in w.indexed_iter() {
        if !v.is_finite() || v < 0.0 {
            return Err(Error::InvalidGraph(format!(
                "adjacency weight ({}, {}) = {} is not a finite non-negative number",
                i, j, v
            )));
        }
        if j > i && (v - w[[j, i]]).abs() > SYMMETRY_TOLERANCE * scale {
            return Err(Error::InvalidGraph(format!(
                "adjacency matrix is not symmetric at ({}, {})",
                i, j
            )));
        }
    }

    Ok(())
}
