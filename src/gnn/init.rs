//! Explicit parameter initializers.

use crate::core::{Error, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

/// Initialization scheme for one learned tensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// All zeros
    Zeros,
    /// Glorot uniform: `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`
    XavierUniform,
    /// Zero-mean normal with the given standard deviation
    Normal { std: f32 },
    /// `U(-scale, scale)`
    Uniform { scale: f32 },
}

impl Initializer {
    /// Sample a `(rows, cols)` matrix; rows are treated as fan-out.
    pub fn matrix<R: Rng + ?Sized>(
        &self,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let values = self.sample(rows * cols, cols, rows, rng)?;
        Ok(Array2::from_shape_vec((rows, cols), values)?)
    }

    /// Sample a vector of length `len`.
    pub fn vector<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<Array1<f32>> {
        Ok(Array1::from_vec(self.sample(len, len, len, rng)?))
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        let values = match *self {
            Initializer::Zeros => vec![0.0; count],
            Initializer::XavierUniform => {
                if count == 0 {
                    return Ok(Vec::new());
                }
                let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let dist = Uniform::new_inclusive(-bound, bound);
                (0..count).map(|_| dist.sample(rng)).collect()
            }
            Initializer::Normal { std } => {
                if !(std.is_finite() && std >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "normal initializer std must be finite and non-negative, got {}",
                        std
                    )));
                }
                let dist = Normal::new(0.0_f32, std).map_err(|e| {
                    Error::InvalidConfig(format!("normal initializer std {}: {}", std, e))
                })?;
                (0..count).map(|_| dist.sample(rng)).collect()
            }
            Initializer::Uniform { scale } => {
                if !(scale.is_finite() && scale >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "uniform initializer scale must be finite and non-negative, got {}",
                        scale
                    )));
                }
                let dist = Uniform::new_inclusive(-scale, scale);
                (0..count).map(|_| dist.sample(rng)).collect()
            }
        };
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zeros_initializer() {
        let mut rng = StdRng::seed_from_u64(0);
        let zeros = Initializer::Zeros.matrix(3, 4, &mut rng).unwrap();
        assert_eq!(zeros.dim(), (3, 4));
        assert!(zeros.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_xavier_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = Initializer::XavierUniform.matrix(8, 24, &mut rng).unwrap();
        let bound = (6.0_f32 / 32.0).sqrt();

        assert_eq!(w.dim(), (8, 24));
        assert!(w.iter().all(|&v| v.abs() <= bound));
        assert!(w.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_uniform_and_normal() {
        let mut rng = StdRng::seed_from_u64(3);
        let u = Initializer::Uniform { scale: 0.07 }.vector(100, &mut rng).unwrap();
        assert!(u.iter().all(|&v| v.abs() <= 0.07));

        let n = Initializer::Normal { std: 0.01 }.matrix(10, 10, &mut rng).unwrap();
        let mean = n.mean().unwrap();
        assert!(mean.abs() < 0.01);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = Initializer::XavierUniform
            .matrix(4, 4, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = Initializer::XavierUniform
            .matrix(4, 4, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Initializer::Normal { std: -1.0 }.vector(3, &mut rng).is_err());
        assert!(Initializer::Normal { std: f32::INFINITY }.vector(3, &mut rng).is_err());
        assert!(Initializer::Normal { std: 0.0 }.vector(3, &mut rng).is_ok());
        assert!(Initializer::Uniform { scale: f32::NAN }.vector(3, &mut rng).is_err());
    }
}
