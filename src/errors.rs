/// Domain-specific error types for the simulation engine.
/// Construction-time data and policy problems degrade the session instead of
/// failing the process; only action-shape and provider errors reach a
/// step() caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    #[error("inconsistent dataset: {0}")]
    InconsistentDataset(String),

    #[error("invalid action shape: expected {expected} weights, got {actual}")]
    InvalidActionShape { expected: usize, actual: usize },

    #[error("policy unavailable: {0}")]
    PolicyUnavailable(String),

    #[error("simulation exhausted at step {0}")]
    SimulationExhausted(usize),

    #[error("config error: {0}")]
    InvalidConfig(String),

    #[error("insufficient data: need at least {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("quote feed error: {0}")]
    QuoteFeed(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<ndarray::ShapeError> for EngineError {
    fn from(e: ndarray::ShapeError) -> Self {
        EngineError::InconsistentDataset(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
