use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Rolling window of log returns used for the volatility estimate
pub const RETURN_WINDOW: usize = 50;

/// Added to the rolling std dev so the Sharpe proxy never divides by zero
const VOL_FLOOR: f64 = 1e-8;

/// Slope of the linear penalty once drawdown exceeds the limit
const DRAWDOWN_PENALTY_SLOPE: f64 = 5.0;

/// Breakdown of one step's reward, before scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct RewardComponents {
    pub log_return: f64,
    pub volatility: f64,
    pub sharpe_proxy: f64,
    pub drawdown_penalty: f64,
}

/// Bounded buffer of per-step log returns. Oldest entries are evicted once
/// the window is full.
#[derive(Debug, Clone, Default)]
pub struct ReturnBuffer {
    returns: VecDeque<f64>,
}

impl ReturnBuffer {
    pub fn new() -> Self {
        Self {
            returns: VecDeque::with_capacity(RETURN_WINDOW + 1),
        }
    }

    pub fn push(&mut self, log_return: f64) {
        self.returns.push_back(log_return);
        while self.returns.len() > RETURN_WINDOW {
            self.returns.pop_front();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Population std dev of the window plus the floor.
    pub fn volatility(&self) -> f64 {
        if self.returns.is_empty() {
            return VOL_FLOOR;
        }
        let std = self.returns.iter().population_std_dev();
        if std.is_finite() {
            std + VOL_FLOOR
        } else {
            VOL_FLOOR
        }
    }
}

/// Zero unless drawdown exceeds the limit, then linear in the excess.
#[inline]
pub fn drawdown_penalty(drawdown: f64, max_drawdown: f64) -> f64 {
    -DRAWDOWN_PENALTY_SLOPE * (drawdown - max_drawdown).max(0.0)
}

/// Record the step's return and compute the shaped reward.
/// Returns (scaled reward, components). Non-finite rewards become 0.
pub fn shape_reward(
    buffer: &mut ReturnBuffer,
    portfolio_return: f64,
    drawdown: f64,
    max_drawdown: f64,
    reward_scaling: f64,
) -> (f64, RewardComponents) {
    let log_return = portfolio_return.ln_1p();
    buffer.push(log_return);

    let volatility = buffer.volatility();
    let sharpe_proxy = log_return / volatility;
    let penalty = drawdown_penalty(drawdown, max_drawdown);

    let reward = (sharpe_proxy + penalty) * reward_scaling;
    let reward = if reward.is_finite() { reward } else { 0.0 };

    (
        reward,
        RewardComponents {
            log_return,
            volatility,
            sharpe_proxy,
            drawdown_penalty: penalty,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buf = ReturnBuffer::new();
        for i in 0..(RETURN_WINDOW + 10) {
            buf.push(i as f64);
        }
        assert_eq!(buf.len(), RETURN_WINDOW);
        assert_eq!(buf.returns.front().copied(), Some(10.0));
    }

    #[test]
    fn test_volatility_floor() {
        let mut buf = ReturnBuffer::new();
        assert_eq!(buf.volatility(), 1e-8);
        buf.push(0.01);
        assert_eq!(buf.volatility(), 1e-8, "single sample has zero spread");
    }

    #[test]
    fn test_volatility_population() {
        let mut buf = ReturnBuffer::new();
        buf.push(0.01);
        buf.push(-0.01);
        // population std of [0.01, -0.01] is 0.01
        assert!((buf.volatility() - (0.01 + 1e-8)).abs() < 1e-12);
    }

    #[test]
    fn test_penalty_zero_below_limit() {
        assert_eq!(drawdown_penalty(0.10, 0.25), 0.0);
        assert_eq!(drawdown_penalty(0.25, 0.25), 0.0);
    }

    #[test]
    fn test_penalty_negative_above_limit() {
        let p = drawdown_penalty(0.35, 0.25);
        assert!(p < 0.0);
        assert!((p + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_flat_return_zero_reward() {
        let mut buf = ReturnBuffer::new();
        let (reward, c) = shape_reward(&mut buf, 0.0, 0.0, 0.25, 1e3);
        assert_eq!(reward, 0.0);
        assert_eq!(c.sharpe_proxy, 0.0);
        assert_eq!(c.drawdown_penalty, 0.0);
    }

    #[test]
    fn test_reward_sign_follows_return() {
        let mut buf = ReturnBuffer::new();
        buf.push(0.02);
        let (up, _) = shape_reward(&mut buf, 0.01, 0.0, 0.25, 1.0);
        assert!(up > 0.0);
        let (down, _) = shape_reward(&mut buf, -0.01, 0.01, 0.25, 1.0);
        assert!(down < 0.0);
    }
}
