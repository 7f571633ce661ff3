use crate::config::SimConfig;
use crate::data::{loader, AssetDataset, DatasetSource};
use crate::errors::{EngineError, EngineResult};
use crate::policy::{self, ActionProvider, PolicyKind};
use crate::sim::portfolio::PortfolioSimulator;
use crate::sim::Environment;
use crate::state::{HealthReport, StateSnapshot, StepSnapshot};
use std::path::Path;
use uuid::Uuid;

/// What `initialize` ended up with. A degraded start still yields a report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InitReport {
    pub dataset_source: DatasetSource,
    pub assets: Vec<String>,
    pub has_model: bool,
    pub policy_error: Option<String>,
}

/// Owns one simulator, one action provider and the step history of the
/// current run. Not internally synchronized: callers serialize access (the
/// session task does this).
///
/// Two flags instead of a full state machine:
/// - has_model: a provider is attached
/// - running: the current run accepts steps
pub struct SessionController {
    config: SimConfig,
    simulator: Option<PortfolioSimulator>,
    provider: Option<Box<dyn ActionProvider>>,
    observation: Vec<f64>,
    history: Vec<StepSnapshot>,
    running: bool,
    run_id: Option<Uuid>,
}

impl SessionController {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            simulator: None,
            provider: None,
            observation: Vec::new(),
            history: Vec::new(),
            running: false,
            run_id: None,
        }
    }

    /// Load the dataset (dummy fallback on failure), build the simulator and
    /// the configured provider. Only an invalid config is a hard error; a
    /// missing policy leaves the controller without a model.
    pub fn initialize(
        &mut self,
        data_dir: &Path,
        policy_kind: PolicyKind,
        policy_path: &Path,
        policy_seed: u64,
    ) -> EngineResult<InitReport> {
        self.config.validate()?;

        let dataset = loader::load_or_fallback(data_dir);
        let simulator = match PortfolioSimulator::new(dataset, self.config) {
            Ok(sim) => sim,
            Err(e @ EngineError::InvalidConfig(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "dataset unusable for simulation, falling back to dummy");
                PortfolioSimulator::new(AssetDataset::dummy(), self.config)?
            }
        };

        let (provider, policy_error) =
            match policy::load_policy(policy_kind, policy_path, policy_seed, simulator.dataset().assets()) {
                Ok(p) => (Some(p), None),
                Err(e) => {
                    tracing::error!(error = %e, kind = %policy_kind, "policy not loaded, steps will be no-ops");
                    (None, Some(e.to_string()))
                }
            };

        let report = InitReport {
            dataset_source: simulator.dataset().source(),
            assets: simulator.dataset().assets().to_vec(),
            has_model: provider.is_some(),
            policy_error,
        };

        self.attach(simulator, provider);

        tracing::info!(
            dataset = %report.dataset_source,
            assets = report.assets.len(),
            has_model = report.has_model,
            "session initialized"
        );
        Ok(report)
    }

    /// Install a simulator and (optionally) a provider directly. Leaves the
    /// session in the ready state: history cleared, not running.
    pub fn attach(&mut self, simulator: PortfolioSimulator, provider: Option<Box<dyn ActionProvider>>) {
        self.observation = simulator.observation();
        self.simulator = Some(simulator);
        self.provider = provider;
        self.history.clear();
        self.running = false;
        self.run_id = None;
    }

    #[inline]
    pub fn has_model(&self) -> bool {
        self.provider.is_some()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start a fresh run. Without a simulator this is a no-op returning the
    /// zero snapshot with `running: false`.
    pub fn reset(&mut self) -> StateSnapshot {
        let Some(sim) = self.simulator.as_mut() else {
            tracing::warn!("reset requested before initialize");
            return self.get_state();
        };

        self.observation = sim.reset();
        self.history.clear();
        self.running = true;
        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);

        tracing::info!(run_id = %run_id, initial_cash = self.config.initial_cash, "session reset");
        self.get_state()
    }

    /// Advance one step using the attached provider.
    ///
    /// Not running, no simulator, no provider, or data exhausted: returns the
    /// last snapshot with `running: false`. Provider errors and action-shape
    /// violations are returned to the caller with state untouched.
    pub fn step(&mut self) -> EngineResult<StateSnapshot> {
        if !self.running {
            return Ok(self.noop());
        }

        match (self.simulator.as_mut(), self.provider.as_mut()) {
            (Some(sim), Some(provider)) => {
                let action = provider.action_for(&self.observation)?;

                let outcome = match sim.step(&action) {
                    Ok(o) => o,
                    Err(EngineError::SimulationExhausted(step)) => {
                        tracing::warn!(step, "step after end of data");
                        self.running = false;
                        return Ok(self.noop());
                    }
                    Err(e) => return Err(e),
                };

                let snapshot = StepSnapshot {
                    step: self.history.len(),
                    portfolio_value: outcome.info.portfolio_value,
                    drawdown: outcome.info.drawdown,
                    turnover: outcome.info.turnover,
                    volatility: outcome.info.volatility,
                    weights: sim.weights().to_vec(),
                };

                self.observation = outcome.observation;
                self.running = !outcome.terminated;

                if outcome.terminated {
                    tracing::info!(
                        steps = self.history.len() + 1,
                        final_value = snapshot.portfolio_value,
                        "run finished"
                    );
                }

                let state = StateSnapshot::from_step(&snapshot, self.running);
                self.history.push(snapshot);
                Ok(state)
            }
            _ => Ok(self.noop()),
        }
    }

    /// Latest snapshot with the current running flag, or the zero snapshot
    /// when nothing has been recorded yet.
    pub fn get_state(&self) -> StateSnapshot {
        match self.history.last() {
            Some(last) => StateSnapshot::from_step(last, self.running),
            None => StateSnapshot::zero(
                self.config.initial_cash,
                self.simulator
                    .as_ref()
                    .map(|s| s.weights().to_vec())
                    .unwrap_or_default(),
                self.running,
            ),
        }
    }

    #[inline]
    pub fn get_history(&self) -> &[StepSnapshot] {
        &self.history
    }

    /// Portfolio values of the recorded steps, in order.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.history.iter().map(|s| s.portfolio_value).collect()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            model_loaded: self.has_model(),
            running: self.running,
            dataset: self.simulator.as_ref().map(|s| s.dataset().source()),
            policy: self.provider.as_ref().map(|p| p.name().to_string()),
            run_id: self.run_id,
            steps: self.history.len(),
        }
    }

    fn noop(&self) -> StateSnapshot {
        let mut state = self.get_state();
        state.running = false;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AssetSeries;
    use crate::policy::{RandomPolicy, UniformPolicy};

    fn flat_sim(n_assets: usize, len: usize, config: SimConfig) -> PortfolioSimulator {
        let pairs = (0..n_assets)
            .map(|i| {
                let rows: Vec<Vec<f64>> = (0..len).map(|t| vec![100.0 + (t % 3) as f64, 1.0]).collect();
                (format!("A{i}"), AssetSeries::from_rows(&rows))
            })
            .collect();
        PortfolioSimulator::new(AssetDataset::new(pairs, DatasetSource::Real), config).unwrap()
    }

    fn ready(n_assets: usize, len: usize) -> SessionController {
        let cfg = SimConfig { max_position: 1.0, ..SimConfig::default() };
        let mut ctl = SessionController::new(cfg);
        ctl.attach(flat_sim(n_assets, len, cfg), Some(Box::new(UniformPolicy::new(n_assets))));
        ctl
    }

    struct WrongShape;

    impl ActionProvider for WrongShape {
        fn name(&self) -> &str {
            "wrong-shape"
        }

        fn action_for(&mut self, _observation: &[f64]) -> EngineResult<Vec<f64>> {
            Ok(vec![1.0])
        }
    }

    #[test]
    fn test_fresh_reset_state() {
        let mut ctl = ready(2, 10);
        let state = ctl.reset();
        assert!(state.running);
        assert_eq!(state.portfolio_value, 1_000_000.0);
        assert_eq!(state.step, 0);
        assert_eq!(state.weights, vec![0.5, 0.5]);
        assert_eq!(ctl.get_state(), state);
        assert!(ctl.get_history().is_empty());
    }

    #[test]
    fn test_step_before_reset_is_noop() {
        let mut ctl = ready(2, 10);
        let state = ctl.step().unwrap();
        assert!(!state.running);
        assert!(ctl.get_history().is_empty());
    }

    #[test]
    fn test_uninitialized_controller_never_fails() {
        let mut ctl = SessionController::new(SimConfig::default());
        let reset = ctl.reset();
        assert!(!reset.running);
        assert!(reset.weights.is_empty());
        assert!(!ctl.step().unwrap().running);
        assert_eq!(ctl.get_state().portfolio_value, 1_000_000.0);
        assert!(!ctl.health().model_loaded);
    }

    #[test]
    fn test_no_provider_is_noop() {
        let cfg = SimConfig::default();
        let mut ctl = SessionController::new(cfg);
        ctl.attach(flat_sim(1, 10, cfg), None);
        assert!(ctl.reset().running);
        let state = ctl.step().unwrap();
        assert!(!state.running);
        assert!(ctl.get_history().is_empty());
        // the flag itself is untouched; a later provider could still run
        assert!(ctl.is_running());
    }

    #[test]
    fn test_history_ordinals_and_termination() {
        let mut ctl = ready(2, 6);
        ctl.reset();
        let mut last = None;
        for _ in 0..10 {
            let s = ctl.step().unwrap();
            if !s.running {
                last = Some(s);
                break;
            }
        }
        let last = last.expect("run must terminate");
        let history = ctl.get_history();
        assert_eq!(history.len(), 4, "window 1, len 6: steps until index 5");
        assert!(history.iter().enumerate().all(|(i, s)| s.step == i));
        assert_eq!(last.step, 3);

        // done: further steps return the last snapshot, not running
        let after = ctl.step().unwrap();
        assert!(!after.running);
        assert_eq!(after.step, 3);
        assert_eq!(ctl.get_history().len(), 4);
        assert!(!ctl.get_state().running);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut ctl = ready(2, 10);
        ctl.reset();
        ctl.step().unwrap();
        ctl.step().unwrap();
        assert_eq!(ctl.get_history().len(), 2);
        let first_run = ctl.health().run_id;
        ctl.reset();
        assert!(ctl.get_history().is_empty());
        assert_ne!(ctl.health().run_id, first_run);
    }

    #[test]
    fn test_wrong_shape_surfaces_error() {
        let cfg = SimConfig::default();
        let mut ctl = SessionController::new(cfg);
        ctl.attach(flat_sim(3, 10, cfg), Some(Box::new(WrongShape)));
        ctl.reset();
        let err = ctl.step().unwrap_err();
        assert!(matches!(err, EngineError::InvalidActionShape { expected: 3, actual: 1 }));
        assert!(ctl.get_history().is_empty());
        assert!(ctl.is_running());
    }

    #[test]
    fn test_identical_runs_match() {
        let run = || {
            let cfg = SimConfig::default();
            let mut ctl = SessionController::new(cfg);
            ctl.attach(flat_sim(3, 40, cfg), Some(Box::new(RandomPolicy::new(3, 99))));
            ctl.reset();
            while ctl.step().unwrap().running {}
            ctl.get_history().to_vec()
        };
        let a = run();
        assert!(!a.is_empty());
        assert_eq!(a, run());
    }

    #[test]
    fn test_initialize_degrades_without_data_or_policy() {
        let missing = std::env::temp_dir().join(format!("aegris-none-{}", Uuid::new_v4()));
        let mut ctl = SessionController::new(SimConfig::default());
        let report = ctl
            .initialize(&missing, PolicyKind::Weights, &missing.join("policy.json"), 0)
            .unwrap();
        assert_eq!(report.dataset_source, DatasetSource::Dummy);
        assert_eq!(report.assets, vec!["CASH".to_string()]);
        assert!(!report.has_model);
        assert!(report.policy_error.is_some());

        assert!(ctl.reset().running);
        assert!(!ctl.step().unwrap().running);
        assert_eq!(ctl.health().dataset, Some(DatasetSource::Dummy));
    }

    #[test]
    fn test_initialize_with_heuristic_policy() {
        let missing = std::env::temp_dir().join(format!("aegris-none-{}", Uuid::new_v4()));
        let mut ctl = SessionController::new(SimConfig::default());
        let report = ctl
            .initialize(&missing, PolicyKind::Uniform, Path::new("unused"), 0)
            .unwrap();
        assert!(report.has_model);
        ctl.reset();
        let s = ctl.step().unwrap();
        assert!(s.running);
        // constant dummy price, single asset stays fully invested despite the cap
        assert_eq!(s.portfolio_value, 1_000_000.0);
        assert_eq!(s.turnover, 0.0);
        assert_eq!(s.weights, vec![1.0]);
    }
}
