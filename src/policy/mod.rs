pub mod heuristic;
pub mod weights;

use crate::errors::{EngineError, EngineResult};
use std::path::Path;

pub use heuristic::{RandomPolicy, UniformPolicy};
pub use weights::StaticWeightsPolicy;

/// Produces one allocation score per asset for an observation.
/// Called once per session step. Send so it can live inside the session task.
pub trait ActionProvider: Send {
    fn name(&self) -> &str;

    /// Return one non-negative score per asset. Length mismatches are caught
    /// by the simulator, not here.
    fn action_for(&mut self, observation: &[f64]) -> EngineResult<Vec<f64>>;
}

/// Which provider the service attaches at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Static target weights loaded from a JSON artifact
    Weights,
    Uniform,
    Random,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weights" => Ok(Self::Weights),
            "uniform" => Ok(Self::Uniform),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown policy kind: {other}")),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weights => write!(f, "weights"),
            Self::Uniform => write!(f, "uniform"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Build the configured provider for a dataset's asset list.
pub fn load_policy(
    kind: PolicyKind,
    artifact: &Path,
    seed: u64,
    assets: &[String],
) -> EngineResult<Box<dyn ActionProvider>> {
    if assets.is_empty() {
        return Err(EngineError::PolicyUnavailable("no assets to allocate".into()));
    }
    let provider: Box<dyn ActionProvider> = match kind {
        PolicyKind::Weights => Box::new(StaticWeightsPolicy::load(artifact, assets)?),
        PolicyKind::Uniform => Box::new(UniformPolicy::new(assets.len())),
        PolicyKind::Random => Box::new(RandomPolicy::new(assets.len(), seed)),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("Uniform".parse::<PolicyKind>(), Ok(PolicyKind::Uniform));
        assert_eq!(" random ".parse::<PolicyKind>(), Ok(PolicyKind::Random));
        assert!("sac".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let assets = vec!["A".to_string()];
        let res = load_policy(
            PolicyKind::Weights,
            Path::new("/nonexistent/policy.json"),
            0,
            &assets,
        );
        assert!(matches!(res, Err(EngineError::PolicyUnavailable(_))));
    }

    #[test]
    fn test_heuristics_always_load() {
        let assets = vec!["A".to_string(), "B".to_string()];
        let p = load_policy(PolicyKind::Uniform, Path::new("unused"), 0, &assets).unwrap();
        assert_eq!(p.name(), "uniform");
    }
}
