//! Common types used across STG2Seq modules.

use ndarray::{Array4, ArrayViewMutD};
use serde::{Deserialize, Serialize};

/// Feature tensor laid out as (batch, channel, time, node).
pub type Tensor4 = Array4<f32>;

/// Window construction policy for the decoder loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Teacher forcing: short-term windows are cut from ground truth.
    #[default]
    Train,
    /// Autoregressive: each window is fed the previous prediction.
    Eval,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Train => write!(f, "train"),
            Mode::Eval => write!(f, "eval"),
        }
    }
}

/// Role of a learned tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// Multiplicative weights (projection matrices, norm scales)
    Weight,
    /// Additive offsets
    Bias,
}

/// A mutable handle to one learned tensor.
pub type ParamMut<'a> = (ParamKind, ArrayViewMutD<'a, f32>);

/// Components that own learned parameters.
///
/// Parameters are only rewritten through this trait, by an external
/// optimizer or by tests. Forward evaluation never mutates them.
pub trait Parameterized {
    /// Mutable views of every learned tensor, in declaration order.
    fn parameters_mut(&mut self) -> Vec<ParamMut<'_>>;

    /// Total number of learned scalars.
    fn num_parameters(&self) -> usize;
}
