use crate::config::AppConfig;
use crate::data::DatasetSource;
use crate::market::QuoteService;
use crate::session::SessionHandle;
use portable_atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

// ── Session records ──

/// One recorded step. Immutable once appended to the history.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StepSnapshot {
    pub step: usize,
    pub portfolio_value: f64,
    pub drawdown: f64,
    pub turnover: f64,
    pub volatility: f64,
    pub weights: Vec<f64>,
}

/// Wire shape returned by reset / step / state queries.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StateSnapshot {
    pub step: usize,
    pub portfolio_value: f64,
    pub drawdown: f64,
    pub volatility: f64,
    pub turnover: f64,
    pub weights: Vec<f64>,
    pub running: bool,
}

impl StateSnapshot {
    pub fn from_step(snapshot: &StepSnapshot, running: bool) -> Self {
        Self {
            step: snapshot.step,
            portfolio_value: snapshot.portfolio_value,
            drawdown: snapshot.drawdown,
            volatility: snapshot.volatility,
            turnover: snapshot.turnover,
            weights: snapshot.weights.clone(),
            running,
        }
    }

    /// Placeholder for a session with no recorded steps.
    pub fn zero(initial_cash: f64, weights: Vec<f64>, running: bool) -> Self {
        Self {
            step: 0,
            portfolio_value: initial_cash,
            drawdown: 0.0,
            volatility: 0.0,
            turnover: 0.0,
            weights,
            running,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model_loaded: bool,
    pub running: bool,
    pub dataset: Option<DatasetSource>,
    pub policy: Option<String>,
    pub run_id: Option<uuid::Uuid>,
    pub steps: usize,
}

// ── Messages OUT of the session (websocket push) ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Sent once to each client on connect
    #[serde(rename = "session_state")]
    SessionState { state: StateSnapshot },

    #[serde(rename = "session_reset")]
    SessionReset { state: StateSnapshot },

    #[serde(rename = "session_step")]
    SessionStep { state: StateSnapshot },
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub steps_processed: AtomicU64,
    pub resets: AtomicU64,
    pub noop_steps: AtomicU64,
    pub step_errors: AtomicU64,
    pub quote_fetches: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            steps_processed: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            noop_steps: AtomicU64::new(0),
            step_errors: AtomicU64::new(0),
            quote_fetches: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,

    // Request layer -> session task: the only way to touch the controller
    pub session: SessionHandle,

    // Session -> Dashboard: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_rx: watch::Receiver<StateSnapshot>,

    // Session -> Dashboard: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    pub quotes: QuoteService,

    // Lock-free performance counters
    pub counters: Arc<PerfCounters>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        session: SessionHandle,
        snapshot_rx: watch::Receiver<StateSnapshot>,
        ws_tx: broadcast::Sender<WsMessage>,
        quotes: QuoteService,
        counters: Arc<PerfCounters>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            session,
            snapshot_rx,
            ws_tx,
            quotes,
            counters,
        })
    }
}
