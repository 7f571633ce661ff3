use super::allocation;
use super::reward::{self, ReturnBuffer};
use super::{sanitize, Environment, StepInfo, StepOutcome};
use crate::config::SimConfig;
use crate::data::AssetDataset;
use crate::errors::{EngineError, EngineResult};
use smallvec::SmallVec;

/// Single-step portfolio return is clamped to this band
const MAX_STEP_RETURN: f64 = 0.2;

/// Mutable portfolio state. Rebuilt on reset, mutated only by step.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub step_index: usize,
    pub portfolio_value: f64,
    /// Running max of portfolio_value since reset
    pub peak_value: f64,
    /// Per-asset allocation; residual `1 - sum` is cash
    pub weights: Vec<f64>,
    pub returns: ReturnBuffer,
}

impl PortfolioState {
    fn initial(config: &SimConfig, n_assets: usize) -> Self {
        Self {
            step_index: config.window_size,
            portfolio_value: config.initial_cash,
            peak_value: config.initial_cash,
            weights: vec![1.0 / n_assets as f64; n_assets],
            returns: ReturnBuffer::new(),
        }
    }

    #[inline]
    pub fn drawdown(&self) -> f64 {
        if self.peak_value <= 0.0 {
            return 0.0;
        }
        (self.peak_value - self.portfolio_value) / self.peak_value
    }

    #[inline]
    pub fn cash_fraction(&self) -> f64 {
        1.0 - self.weights.iter().sum::<f64>()
    }
}

/// Replays an aligned multi-asset dataset under a continuous allocation
/// policy. Return for a step is earned on the previous allocation; the cost
/// of moving to the new allocation is charged in the same step.
pub struct PortfolioSimulator {
    dataset: AssetDataset,
    config: SimConfig,
    state: PortfolioState,
}

impl PortfolioSimulator {
    pub fn new(dataset: AssetDataset, config: SimConfig) -> EngineResult<Self> {
        config.validate()?;

        if dataset.n_assets() == 0 {
            return Err(EngineError::DataUnavailable("dataset has no assets".into()));
        }

        // window_size is the first step index; one more row is needed for a step
        let required = config.window_size + 2;
        if dataset.len() < required {
            return Err(EngineError::InsufficientData {
                required,
                available: dataset.len(),
            });
        }

        let state = PortfolioState::initial(&config, dataset.n_assets());
        Ok(Self { dataset, config, state })
    }

    #[inline]
    pub fn dataset(&self) -> &AssetDataset {
        &self.dataset
    }

    #[cfg(test)]
    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.state.weights
    }

    /// Features of every asset at the current step, then weights, then the
    /// cash fraction. Out-of-range steps yield zero features.
    pub fn observation(&self) -> Vec<f64> {
        let width = self.dataset.n_features();
        let mut obs = Vec::with_capacity(self.observation_shape());

        for series in self.dataset.series() {
            match series.row(self.state.step_index) {
                Some(row) => obs.extend(row.iter().copied()),
                None => obs.extend(std::iter::repeat(0.0).take(width)),
            }
        }
        obs.extend_from_slice(&self.state.weights);
        obs.push(self.state.cash_fraction());

        for v in obs.iter_mut() {
            *v = sanitize(*v);
        }
        obs
    }

    /// Simple per-asset returns from step t-1 to t on the reference price.
    /// No prior row at t = 0, so returns are zero there.
    fn asset_returns(&self, t: usize) -> SmallVec<[f64; 16]> {
        let mut out = SmallVec::with_capacity(self.dataset.n_assets());
        for (asset, series) in self.dataset.assets().iter().zip(self.dataset.series()) {
            let r = match (t.checked_sub(1).and_then(|p| series.price(p)), series.price(t)) {
                (Some(p0), Some(p1)) => p1 / p0 - 1.0,
                _ => 0.0,
            };
            if r.is_finite() {
                out.push(r);
            } else {
                tracing::warn!(asset = %asset, step = t, "non-finite asset return zeroed");
                out.push(0.0);
            }
        }
        out
    }
}

impl Environment for PortfolioSimulator {
    fn reset(&mut self) -> Vec<f64> {
        self.state = PortfolioState::initial(&self.config, self.dataset.n_assets());
        tracing::debug!(
            step = self.state.step_index,
            value = self.state.portfolio_value,
            assets = self.dataset.n_assets(),
            "simulator reset"
        );
        self.observation()
    }

    fn step(&mut self, action: &[f64]) -> EngineResult<StepOutcome> {
        let n = self.action_shape();
        if action.len() != n {
            return Err(EngineError::InvalidActionShape {
                expected: n,
                actual: action.len(),
            });
        }

        let t = self.state.step_index;
        if t >= self.dataset.len() {
            return Err(EngineError::SimulationExhausted(t));
        }

        let cfg = self.config;

        // 1-3. target allocation
        let target = allocation::target_weights(action, &self.state.weights, cfg.max_position);

        // 4. rebalance cost
        let turnover = allocation::turnover(&target, &self.state.weights);
        let cost = turnover * (cfg.transaction_cost + cfg.slippage);

        // 5. earned on the pre-rebalance weights
        let returns = self.asset_returns(t);
        let gross: f64 = self
            .state
            .weights
            .iter()
            .zip(returns.iter())
            .map(|(w, r)| w * r)
            .sum();
        let mut portfolio_return = (gross - cost).clamp(-MAX_STEP_RETURN, MAX_STEP_RETURN);
        if !portfolio_return.is_finite() {
            portfolio_return = 0.0;
        }

        // 6. apply
        let st = &mut self.state;
        st.portfolio_value *= 1.0 + portfolio_return;
        st.peak_value = st.peak_value.max(st.portfolio_value);
        st.weights = target;
        st.step_index += 1;

        // 7-8. risk + reward
        let drawdown = st.drawdown();
        let (reward, components) = reward::shape_reward(
            &mut st.returns,
            portfolio_return,
            drawdown,
            cfg.max_drawdown,
            cfg.reward_scaling,
        );

        // 9. out of forward-looking prices
        let terminated = st.step_index >= self.dataset.len() - 1;

        tracing::trace!(
            step = st.step_index,
            value = st.portfolio_value,
            portfolio_return,
            turnover,
            drawdown,
            reward,
            "simulator step"
        );

        let info = StepInfo {
            portfolio_value: st.portfolio_value,
            drawdown,
            turnover,
            volatility: components.volatility,
            reward_components: components,
        };

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            terminated,
            info,
        })
    }

    fn observation_shape(&self) -> usize {
        let n = self.dataset.n_assets();
        n * self.dataset.n_features() + n + 1
    }

    fn action_shape(&self) -> usize {
        self.dataset.n_assets()
    }
}
