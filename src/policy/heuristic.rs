use super::ActionProvider;
use crate::errors::EngineResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Equal score for every asset.
#[derive(Debug, Clone)]
pub struct UniformPolicy {
    n_assets: usize,
}

impl UniformPolicy {
    pub fn new(n_assets: usize) -> Self {
        Self { n_assets }
    }
}

impl ActionProvider for UniformPolicy {
    fn name(&self) -> &str {
        "uniform"
    }

    fn action_for(&mut self, _observation: &[f64]) -> EngineResult<Vec<f64>> {
        Ok(vec![1.0; self.n_assets])
    }
}

/// Uniform [0, 1) scores from a seeded generator. Same seed, same sequence.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    n_assets: usize,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(n_assets: usize, seed: u64) -> Self {
        Self {
            n_assets,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ActionProvider for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn action_for(&mut self, _observation: &[f64]) -> EngineResult<Vec<f64>> {
        Ok((0..self.n_assets).map(|_| self.rng.gen::<f64>()).collect())
    }
}
