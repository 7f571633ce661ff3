pub mod allocation;
pub mod portfolio;
pub mod reward;

use crate::errors::EngineResult;
use reward::RewardComponents;

/// Anything that can be driven by an action provider: reset to an initial
/// observation, then step with one score per asset.
/// Send is required so an environment can live inside the session task.
pub trait Environment: Send {
    fn reset(&mut self) -> Vec<f64>;

    /// Advance one step. Errors only on contract violations (wrong action
    /// length, stepping past the end of the data). Never returns NaN/inf.
    fn step(&mut self, action: &[f64]) -> EngineResult<StepOutcome>;

    fn observation_shape(&self) -> usize;

    fn action_shape(&self) -> usize;
}

/// Diagnostics for one step.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StepInfo {
    pub portfolio_value: f64,
    pub drawdown: f64,
    pub turnover: f64,
    pub volatility: f64,
    pub reward_components: RewardComponents,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub info: StepInfo,
}

/// Replace non-finite values: NaN -> 0, +inf -> 1, -inf -> -1.
#[inline]
pub fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        1.0
    } else if value == f64::NEG_INFINITY {
        -1.0
    } else {
        value
    }
}
