//! Forecasting Model Module
//!
//! Sequence-to-sequence decoder over the spatio-temporal blocks:
//! - Hyperparameter and dataset configuration
//! - Teacher-forced and autoregressive decoding
//! - Masked regression losses

pub mod config;
pub mod loss;
pub mod stg2seq;

pub use config::{DataFeatures, Stg2SeqConfig};
pub use loss::{masked_mae, masked_mse, masked_rmse, null_mask};
pub use stg2seq::Stg2Seq;
