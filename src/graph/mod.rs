//! Graph Spectral Module
//!
//! Fixed algebraic structure consumed by every graph convolution:
//! - Scaled, symmetric-normalized graph Laplacian
//! - Chebyshev polynomial support stacked as an N x (K*N) matrix

pub mod chebyshev;
pub mod laplacian;

pub use chebyshev::{cheb_poly, GraphSupport};
pub use laplacian::{scaled_laplacian, ScaledLaplacian};
