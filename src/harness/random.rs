//! Seeded Gaussian tensors for reproducible test cases.

use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Deterministic source of Gaussian test data. Two generators built from the
/// same seed produce the same sequence of tensors.
#[derive(Debug, Clone)]
pub struct RandomValueGenerator {
    rng: StdRng,
    seed: u64,
}

impl RandomValueGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Tensor of `shape` drawn from `N(mean, std_dev²)`.
    pub fn gaussian(&mut self, shape: &[usize], mean: f32, std_dev: f32) -> Tensor<f32> {
        let len = shape.iter().product();
        let data: Vec<f32> = (0..len)
            .map(|_| {
                let z: f32 = self.rng.sample(StandardNormal);
                mean + std_dev * z
            })
            .collect();
        Tensor::from_parts(shape.to_vec(), data)
    }
}
