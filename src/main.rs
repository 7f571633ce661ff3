mod cli;
mod config;
mod data;
mod errors;
mod market;
mod metrics;
mod policy;
mod server;
mod session;
mod sim;
mod state;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::metrics::PerformanceReport;
use crate::session::{SessionChannels, SessionController, SessionHandle};
use crate::state::{AppState, PerfCounters, WsMessage};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const LOG_EVERY: usize = 100;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(cfg, port).await,
        Commands::Evaluate { steps, report_dir } => evaluate(&cfg, steps, report_dir).map(|_| ()),
    };

    if let Err(e) = result {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn build_controller(cfg: &AppConfig) -> EngineResult<SessionController> {
    let mut controller = SessionController::new(cfg.sim);
    controller.initialize(&cfg.data_dir, cfg.policy_kind, &cfg.policy_path, cfg.policy_seed)?;
    Ok(controller)
}

async fn serve(cfg: AppConfig, port: Option<u16>) -> EngineResult<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "aegris_sim service starting");

    let controller = build_controller(&cfg)?;

    // ── Channels ──
    let counters = Arc::new(PerfCounters::new());
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.get_state());
    let (ws_tx, _) = broadcast::channel::<WsMessage>(1024);

    // ── Session task (sole owner of the controller) ──
    let session = SessionHandle::spawn(
        controller,
        SessionChannels {
            snapshot_tx,
            ws_tx: ws_tx.clone(),
            counters: counters.clone(),
        },
    );

    let quotes = market::QuoteService::new(&cfg.quote_base_url, cfg.quote_cache_ttl_secs, counters.clone());

    let port = port.unwrap_or(cfg.server_port);
    let app_state = AppState::new(cfg, session.clone(), snapshot_rx, ws_tx, quotes, counters);
    let app = server::router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("ctrl-c received, shutting down");
        })
        .await;

    let _ = session.shutdown().await;
    served.map_err(EngineError::from)
}

/// Offline replay: one run from reset until the data ends or `max_steps`.
fn evaluate(cfg: &AppConfig, max_steps: usize, report_dir: Option<PathBuf>) -> EngineResult<PerformanceReport> {
    let mut controller = build_controller(cfg)?;
    if !controller.has_model() {
        return Err(EngineError::PolicyUnavailable(format!(
            "{} policy could not be loaded",
            cfg.policy_kind
        )));
    }

    controller.reset();
    for i in 0..max_steps {
        let state = controller.step()?;
        if (i + 1) % LOG_EVERY == 0 {
            tracing::info!(
                step = state.step,
                value = state.portfolio_value,
                drawdown = state.drawdown,
                "evaluation progress"
            );
        }
        if !controller.is_running() {
            break;
        }
    }

    let curve = controller.equity_curve();
    let report = PerformanceReport::from_curve(&curve, cfg.risk_free_rate)?;
    let dir = report_dir.unwrap_or_else(|| cfg.report_dir.clone());
    metrics::write_report(&dir, &curve, &report)?;

    tracing::info!(
        steps = curve.len(),
        final_equity = report.final_equity,
        total_return_pct = report.total_return_pct,
        sharpe = report.sharpe_ratio,
        "evaluation complete"
    );
    Ok(report)
}
