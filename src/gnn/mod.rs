//! Graph Neural Network (GNN) Module
//!
//! Building blocks of the spatio-temporal forecaster:
//! - Channel alignment and gated Chebyshev convolution (ConvST)
//! - Batch normalization with running statistics
//! - Temporal and channel attention conditioned on external context
//! - Explicit parameter initializers

pub mod align;
pub mod attention;
pub mod conv;
pub mod extractor;
pub mod init;
pub mod norm;
pub mod temporal;

pub use align::Align;
pub use attention::ChannelAttention;
pub use conv::ConvST;
pub use extractor::{FeatureExtractor, StBlock};
pub use init::Initializer;
pub use norm::BatchNorm2d;
pub use temporal::TemporalAttention;
