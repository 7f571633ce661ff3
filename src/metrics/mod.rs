//! Performance statistics over an equity curve.
//! All functions are pure -- they take a curve or a return series and return
//! computed values. Standard deviations are population (ddof = 0).

pub mod report;

use statrs::statistics::Statistics;

pub use report::{write_report, PerformanceReport};

pub const TRADING_DAYS: f64 = 252.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

const SHARPE_EPS: f64 = 1e-8;

/// Simple returns between adjacent points.
pub fn compute_returns(curve: &[f64]) -> Vec<f64> {
    curve.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized Sharpe ratio of excess returns. 0 with fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = excess.iter().mean();
    let std = excess.iter().population_std_dev();
    TRADING_DAYS.sqrt() * mean / (std + SHARPE_EPS)
}

/// Worst peak-to-trough decline as a non-positive fraction.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in curve {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v - peak) / peak);
        }
    }
    worst
}

/// Compound annual growth rate, treating each point as one trading day.
pub fn cagr(curve: &[f64]) -> f64 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if *first <= 0.0 {
        return 0.0;
    }
    let years = curve.len() as f64 / TRADING_DAYS;
    (last / first).powf(1.0 / years) - 1.0
}

/// Annualized volatility of returns.
pub fn volatility(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().population_std_dev() * TRADING_DAYS.sqrt()
}

/// Fraction of strictly positive returns.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}
