use super::{cagr, compute_returns, max_drawdown, sharpe_ratio, volatility, win_rate};
use crate::errors::{EngineError, EngineResult};
use std::path::{Path, PathBuf};

pub const METRICS_FILE: &str = "performance_metrics.csv";
pub const EQUITY_FILE: &str = "equity_curve.csv";

/// Summary table for one equity curve. Percent fields are scaled by 100.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PerformanceReport {
    #[serde(rename = "Final Equity")]
    pub final_equity: f64,
    #[serde(rename = "Total Return (%)")]
    pub total_return_pct: f64,
    #[serde(rename = "CAGR (%)")]
    pub cagr_pct: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Max Drawdown (%)")]
    pub max_drawdown_pct: f64,
    #[serde(rename = "Volatility (%)")]
    pub volatility_pct: f64,
    #[serde(rename = "Win Rate (%)")]
    pub win_rate_pct: f64,
}

impl PerformanceReport {
    pub fn from_curve(curve: &[f64], risk_free_rate: f64) -> EngineResult<Self> {
        let (Some(first), Some(last)) = (curve.first().copied(), curve.last().copied()) else {
            return Err(EngineError::InsufficientData {
                required: 1,
                available: 0,
            });
        };
        let returns = compute_returns(curve);
        let total_return = if first != 0.0 { last / first - 1.0 } else { 0.0 };

        Ok(Self {
            final_equity: last,
            total_return_pct: total_return * 100.0,
            cagr_pct: cagr(curve) * 100.0,
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
            max_drawdown_pct: max_drawdown(curve) * 100.0,
            volatility_pct: volatility(&returns) * 100.0,
            win_rate_pct: win_rate(&returns) * 100.0,
        })
    }
}

#[derive(serde::Serialize)]
struct EquityRow {
    equity: f64,
}

/// Write the metric table and the raw curve as CSV under `dir`.
/// Returns the two file paths (metrics, equity).
pub fn write_report(
    dir: &Path,
    curve: &[f64],
    report: &PerformanceReport,
) -> EngineResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;

    let metrics_path = dir.join(METRICS_FILE);
    let mut writer = csv::Writer::from_path(&metrics_path)?;
    writer.serialize(report)?;
    writer.flush()?;

    let equity_path = dir.join(EQUITY_FILE);
    let mut writer = csv::Writer::from_path(&equity_path)?;
    for &equity in curve {
        writer.serialize(EquityRow { equity })?;
    }
    writer.flush()?;

    tracing::info!(
        dir = %dir.display(),
        final_equity = report.final_equity,
        sharpe = report.sharpe_ratio,
        max_drawdown_pct = report.max_drawdown_pct,
        "performance report written"
    );
    Ok((metrics_path, equity_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_curve_rejected() {
        assert!(PerformanceReport::from_curve(&[], 0.02).is_err());
    }

    #[test]
    fn test_report_values() {
        let curve = [100.0, 110.0, 99.0, 121.0];
        let r = PerformanceReport::from_curve(&curve, 0.02).unwrap();
        assert_eq!(r.final_equity, 121.0);
        assert!((r.total_return_pct - 21.0).abs() < 1e-9);
        assert!((r.max_drawdown_pct + 10.0).abs() < 1e-9);
        assert!((r.win_rate_pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_writes_artifacts() {
        let dir = std::env::temp_dir().join(format!("aegris-report-{}", uuid::Uuid::new_v4()));
        let curve = [100.0, 101.0, 102.5];
        let report = PerformanceReport::from_curve(&curve, 0.02).unwrap();
        let (metrics, equity) = write_report(&dir, &curve, &report).unwrap();

        let metrics_csv = std::fs::read_to_string(metrics).unwrap();
        assert!(metrics_csv.starts_with("Final Equity,Total Return (%),CAGR (%)"));
        let equity_csv = std::fs::read_to_string(equity).unwrap();
        assert_eq!(equity_csv.lines().count(), 4, "header + 3 rows");

        std::fs::remove_dir_all(&dir).ok();
    }
}
