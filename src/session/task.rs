use super::controller::SessionController;
use crate::errors::{EngineError, EngineResult};
use crate::state::{HealthReport, PerfCounters, StateSnapshot, StepSnapshot, WsMessage};
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const COMMAND_BUFFER: usize = 256;

/// Requests into the session task. Each carries its own reply channel.
#[derive(Debug)]
pub enum SessionCommand {
    Reset { reply: oneshot::Sender<StateSnapshot> },
    Step { reply: oneshot::Sender<EngineResult<StateSnapshot>> },
    GetHistory { reply: oneshot::Sender<Vec<StepSnapshot>> },
    EquityCurve { reply: oneshot::Sender<Vec<f64>> },
    Health { reply: oneshot::Sender<HealthReport> },
    Shutdown,
}

/// Where the session task publishes what changed.
pub struct SessionChannels {
    pub snapshot_tx: watch::Sender<StateSnapshot>,
    pub ws_tx: broadcast::Sender<WsMessage>,
    pub counters: Arc<PerfCounters>,
}

impl SessionChannels {
    fn publish(&self, msg: WsMessage, state: &StateSnapshot) {
        let _ = self.snapshot_tx.send(state.clone());
        // Ignore send errors (no receivers is fine)
        if self.ws_tx.send(msg).is_ok() {
            self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Dedicated session task. This is the ONLY task that touches the controller,
/// so every reset/step is applied in arrival order.
pub async fn run_session(
    mut controller: SessionController,
    mut rx: mpsc::Receiver<SessionCommand>,
    out: SessionChannels,
) {
    tracing::info!("session task started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCommand::Reset { reply } => {
                let state = controller.reset();
                out.counters.resets.fetch_add(1, Ordering::Relaxed);
                out.publish(WsMessage::SessionReset { state: state.clone() }, &state);
                let _ = reply.send(state);
            }
            SessionCommand::Step { reply } => {
                let before = controller.get_history().len();
                let result = controller.step();
                match &result {
                    Ok(state) if controller.get_history().len() > before => {
                        out.counters.steps_processed.fetch_add(1, Ordering::Relaxed);
                        out.publish(WsMessage::SessionStep { state: state.clone() }, state);
                    }
                    Ok(_) => {
                        out.counters.noop_steps.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        out.counters.step_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(error = %e, "step failed");
                    }
                }
                let _ = reply.send(result);
            }
            SessionCommand::GetHistory { reply } => {
                let _ = reply.send(controller.get_history().to_vec());
            }
            SessionCommand::EquityCurve { reply } => {
                let _ = reply.send(controller.equity_curve());
            }
            SessionCommand::Health { reply } => {
                let _ = reply.send(controller.health());
            }
            SessionCommand::Shutdown => {
                tracing::info!("shutdown command received");
                break;
            }
        }
    }

    tracing::info!("session task shutting down");
}

/// Cloneable front door to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Spawn the session task on the current runtime.
    pub fn spawn(controller: SessionController, out: SessionChannels) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(async move {
            run_session(controller, rx, out).await;
        });
        Self { tx }
    }

    pub async fn reset(&self) -> EngineResult<StateSnapshot> {
        self.request(|reply| SessionCommand::Reset { reply }).await
    }

    pub async fn step(&self) -> EngineResult<StateSnapshot> {
        self.request(|reply| SessionCommand::Step { reply }).await?
    }

    pub async fn history(&self) -> EngineResult<Vec<StepSnapshot>> {
        self.request(|reply| SessionCommand::GetHistory { reply }).await
    }

    pub async fn equity_curve(&self) -> EngineResult<Vec<f64>> {
        self.request(|reply| SessionCommand::EquityCurve { reply }).await
    }

    pub async fn health(&self) -> EngineResult<HealthReport> {
        self.request(|reply| SessionCommand::Health { reply }).await
    }

    pub async fn shutdown(&self) -> EngineResult<()> {
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| EngineError::ChannelClosed("session".into()))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> EngineResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed("session".into()))?;
        reply_rx
            .await
            .map_err(|_| EngineError::ChannelClosed("session reply".into()))
    }
}
