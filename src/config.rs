use crate::data::DUMMY_ROWS;
use crate::errors::{EngineError, EngineResult};
use crate::metrics::DEFAULT_RISK_FREE_RATE;
use crate::policy::PolicyKind;
use std::path::PathBuf;

/// Simulator parameters. Validated once when a simulator is built.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SimConfig {
    pub initial_cash: f64,
    /// Max fraction of the portfolio held in any single asset
    pub max_position: f64,
    /// Proportional cost per unit turnover
    pub transaction_cost: f64,
    pub slippage: f64,
    /// Drawdown above this is penalized in the reward
    pub max_drawdown: f64,
    pub reward_scaling: f64,
    /// First valid step index
    pub window_size: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_cash: 1_000_000.0,
            max_position: 0.15,
            transaction_cost: 0.001,
            slippage: 0.0005,
            max_drawdown: 0.25,
            reward_scaling: 1e3,
            window_size: 1,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_cash must be > 0, got {}",
                self.initial_cash
            )));
        }
        if !(self.max_position > 0.0 && self.max_position <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "max_position must be in (0, 1], got {}",
                self.max_position
            )));
        }
        if !(self.transaction_cost.is_finite() && self.transaction_cost >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "transaction_cost must be >= 0, got {}",
                self.transaction_cost
            )));
        }
        if !(self.slippage.is_finite() && self.slippage >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "slippage must be >= 0, got {}",
                self.slippage
            )));
        }
        if !(self.max_drawdown > 0.0 && self.max_drawdown < 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "max_drawdown must be in (0, 1), got {}",
                self.max_drawdown
            )));
        }
        if !self.reward_scaling.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "reward_scaling must be finite, got {}",
                self.reward_scaling
            )));
        }
        // must also fit the fallback dataset
        if self.window_size + 2 > DUMMY_ROWS {
            return Err(EngineError::InvalidConfig(format!(
                "window_size must be <= {}, got {}",
                DUMMY_ROWS - 2,
                self.window_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub policy_kind: PolicyKind,
    pub policy_path: PathBuf,
    pub policy_seed: u64,
    pub report_dir: PathBuf,
    pub risk_free_rate: f64,
    pub quote_base_url: String,
    pub quote_cache_ttl_secs: i64,
    pub server_port: u16,
    pub sim: SimConfig,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = SimConfig::default();
        let sim = SimConfig {
            initial_cash: parse_var("INITIAL_CASH", defaults.initial_cash)?,
            max_position: parse_var("MAX_POSITION", defaults.max_position)?,
            transaction_cost: parse_var("TRANSACTION_COST", defaults.transaction_cost)?,
            slippage: parse_var("SLIPPAGE", defaults.slippage)?,
            max_drawdown: parse_var("MAX_DRAWDOWN", defaults.max_drawdown)?,
            reward_scaling: parse_var("REWARD_SCALING", defaults.reward_scaling)?,
            window_size: parse_var("WINDOW_SIZE", defaults.window_size)?,
        };
        sim.validate()?;

        let policy_kind = env_var_or("POLICY_KIND", "weights")
            .parse::<PolicyKind>()
            .map_err(|e| EngineError::InvalidConfig(format!("POLICY_KIND: {e}")))?;

        Ok(Self {
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "datasets/processed")),
            policy_kind,
            policy_path: PathBuf::from(env_var_or("POLICY_PATH", "models/checkpoints/policy.json")),
            policy_seed: parse_var("POLICY_SEED", 42u64)?,
            report_dir: PathBuf::from(env_var_or("REPORT_DIR", "reports")),
            risk_free_rate: parse_var("RISK_FREE_RATE", DEFAULT_RISK_FREE_RATE)?,
            quote_base_url: env_var_or("QUOTE_BASE_URL", "https://query1.finance.yahoo.com"),
            quote_cache_ttl_secs: parse_var("QUOTE_CACHE_TTL_SECS", 60i64)?,
            server_port: parse_var("SERVER_PORT", 8000u16)?,
            sim,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> EngineResult<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    env_var_or(key, &default.to_string())
        .parse::<T>()
        .map_err(|e| EngineError::InvalidConfig(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let bad_cash = SimConfig { initial_cash: 0.0, ..SimConfig::default() };
        assert!(matches!(bad_cash.validate(), Err(EngineError::InvalidConfig(_))));

        let bad_cap = SimConfig { max_position: 1.5, ..SimConfig::default() };
        assert!(bad_cap.validate().is_err());

        let bad_dd = SimConfig { max_drawdown: 1.0, ..SimConfig::default() };
        assert!(bad_dd.validate().is_err());

        let bad_cost = SimConfig { slippage: -0.01, ..SimConfig::default() };
        assert!(bad_cost.validate().is_err());
    }

    #[test]
    fn test_window_must_fit_fallback_data() {
        let widest = SimConfig { window_size: DUMMY_ROWS - 2, ..SimConfig::default() };
        assert!(widest.validate().is_ok());

        let too_wide = SimConfig { window_size: DUMMY_ROWS - 1, ..SimConfig::default() };
        assert!(matches!(too_wide.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_risk_free_default_matches_metrics() {
        std::env::remove_var("RISK_FREE_RATE");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.risk_free_rate, DEFAULT_RISK_FREE_RATE);
    }
}
