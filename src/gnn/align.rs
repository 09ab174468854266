//! Channel alignment for residual connections.

use crate::core::{Error, Result};
use ndarray::{s, Array4, ArrayView4, CowArray, Ix4};

/// Zero-pads the channel axis from `channel_in` up to `channel_out`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Align {
    channel_in: usize,
    channel_out: usize,
}

impl Align {
    /// Create an aligner. Shrinking the channel axis is not supported.
    pub fn new(channel_in: usize, channel_out: usize) -> Result<Self> {
        if channel_out < channel_in {
            return Err(Error::InvalidConfig(format!(
                "cannot align {} channels down to {}",
                channel_in, channel_out
            )));
        }
        Ok(Self {
            channel_in,
            channel_out,
        })
    }

    /// Borrow `x` unchanged when widths match, otherwise return a padded copy.
    pub fn forward<'a>(&self, x: ArrayView4<'a, f32>) -> Result<CowArray<'a, f32, Ix4>> {
        let (batch, channels, time, nodes) = x.dim();
        if channels != self.channel_in {
            return Err(Error::shape(
                "align input channels",
                self.channel_in,
                channels,
            ));
        }

        if self.channel_in == self.channel_out {
            return Ok(CowArray::from(x));
        }

        let mut aligned = Array4::zeros((batch, self.channel_out, time, nodes));
        aligned
            .slice_mut(s![.., ..self.channel_in, .., ..])
            .assign(&x);
        Ok(CowArray::from(aligned))
    }

    /// Input channel width.
    pub fn channel_in(&self) -> usize {
        self.channel_in
    }

    /// Output channel width.
    pub fn channel_out(&self) -> usize {
        self.channel_out
    }
}
