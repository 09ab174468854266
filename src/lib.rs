//! # STG2Seq - Spatio-Temporal Graph to Sequence
//!
//! Multi-step traffic forecasting over a sensor graph:
//! - **graph**: scaled Laplacian and Chebyshev supports
//! - **gnn**: gated ConvST blocks, temporal and channel attention
//! - **model**: sequence-to-sequence decoder with teacher forcing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ndarray::{array, Array4};
//! use std::sync::Arc;
//! use stg2seq::data::NoneScaler;
//! use stg2seq::model::{DataFeatures, Stg2Seq, Stg2SeqConfig};
//!
//! fn main() -> stg2seq::Result<()> {
//!     let adj = array![[0.0, 1.0], [1.0, 0.0]];
//!     let data = DataFeatures::new(adj).with_feature_dim(2).with_output_dim(1);
//!     let config = Stg2SeqConfig {
//!         input_window: 12,
//!         output_window: 12,
//!         ..Default::default()
//!     };
//!
//!     let mut model = Stg2Seq::new(config, &data, Arc::new(NoneScaler))?;
//!     model.eval();
//!
//!     let x = Array4::<f32>::zeros((8, 12, 2, 2));
//!     let y = Array4::<f32>::zeros((8, 12, 2, 2));
//!     let forecast = model.forward(x.view(), y.view())?;
//!     assert_eq!(forecast.shape(), &[8, 12, 2, 1]);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod data;
pub mod gnn;
pub mod graph;
pub mod model;
pub mod monitoring;

#[cfg(feature = "python")]
mod python;

pub use core::error::{Error, Result};
pub use model::{DataFeatures, Stg2Seq, Stg2SeqConfig};
