use super::ActionProvider;
use crate::errors::{EngineError, EngineResult};
use std::collections::HashMap;
use std::path::Path;

// Artifact format:
// {
//   "name": "balanced-v2",
//   "weights": { "AAPL": 0.12, "MSFT": 0.10, "TLT": 0.15 }
// }

#[derive(serde::Deserialize)]
struct WeightsArtifact {
    name: Option<String>,
    weights: HashMap<String, f64>,
}

/// Fixed target allocation read from a policy artifact. Assets missing from
/// the artifact score 0.
#[derive(Debug, Clone)]
pub struct StaticWeightsPolicy {
    name: String,
    scores: Vec<f64>,
}

impl StaticWeightsPolicy {
    pub fn load(path: &Path, assets: &[String]) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::PolicyUnavailable(format!("{}: {e}", path.display()))
        })?;
        let artifact: WeightsArtifact = serde_json::from_str(&raw)?;

        let scores: Vec<f64> = assets
            .iter()
            .map(|a| artifact.weights.get(a).copied().unwrap_or(0.0))
            .collect();

        let unknown: Vec<&String> = artifact
            .weights
            .keys()
            .filter(|k| !assets.contains(k))
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "policy artifact names assets not in dataset");
        }

        let name = artifact.name.unwrap_or_else(|| "static-weights".to_string());
        tracing::info!(policy = %name, path = %path.display(), "policy artifact loaded");
        Ok(Self { name, scores })
    }
}

impl ActionProvider for StaticWeightsPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_for(&mut self, _observation: &[f64]) -> EngineResult<Vec<f64>> {
        Ok(self.scores.clone())
    }
}
