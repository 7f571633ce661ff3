//! Target-weight construction from raw action scores.
//!
//! clip -> normalize -> cap-and-redistribute. Pure functions, deterministic
//! for identical inputs.

/// Tolerance used when deciding whether a weight sits above the cap
const CAP_EPS: f64 = 1e-12;

/// Clip each score to [0, 1]. NaN scores count as 0.
#[inline]
pub fn clip_scores(action: &[f64]) -> Vec<f64> {
    action
        .iter()
        .map(|&a| if a.is_nan() { 0.0 } else { a.clamp(0.0, 1.0) })
        .collect()
}

/// Build the target weights for one step.
///
/// A zero-sum action keeps the previous allocation as is. Otherwise scores
/// are normalized to sum to 1 and passed through [`cap_and_redistribute`].
pub fn target_weights(action: &[f64], previous: &[f64], max_position: f64) -> Vec<f64> {
    let clipped = clip_scores(action);
    let sum: f64 = clipped.iter().sum();

    if sum <= 0.0 {
        return previous.to_vec();
    }

    let mut weights: Vec<f64> = clipped.iter().map(|a| a / sum).collect();
    cap_and_redistribute(&mut weights, max_position);
    weights
}

/// Pin every weight above `cap` at the cap and share the remaining mass
/// among the unpinned weights in proportion to their size. Repeats until no
/// unpinned weight exceeds the cap.
///
/// Input must sum to 1. When `n * cap < 1` no fully invested allocation
/// fits under the cap; weights are then clamped to the cap once and
/// renormalized to sum to 1, so the cap is exceeded rather than holding cash.
pub fn cap_and_redistribute(weights: &mut [f64], cap: f64) {
    let n = weights.len();
    if (n as f64) * cap < 1.0 {
        clamp_and_renormalize(weights, cap);
        return;
    }

    let mut pinned = vec![false; n];

    loop {
        let mut newly_pinned = false;
        for (w, p) in weights.iter_mut().zip(pinned.iter_mut()) {
            if !*p && *w > cap + CAP_EPS {
                *w = cap;
                *p = true;
                newly_pinned = true;
            }
        }
        if !newly_pinned {
            break;
        }

        let pinned_mass = pinned.iter().filter(|p| **p).count() as f64 * cap;
        let free_target = (1.0 - pinned_mass).max(0.0);
        let free_sum: f64 = weights
            .iter()
            .zip(&pinned)
            .filter(|(_, p)| !**p)
            .map(|(w, _)| *w)
            .sum();

        if free_sum <= 0.0 {
            break;
        }

        let scale = free_target / free_sum;
        for (w, p) in weights.iter_mut().zip(&pinned) {
            if !*p {
                *w *= scale;
            }
        }
    }
}

fn clamp_and_renormalize(weights: &mut [f64], cap: f64) {
    for w in weights.iter_mut() {
        *w = w.min(cap);
    }
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
}

/// Sum of absolute weight changes
#[inline]
pub fn turnover(new: &[f64], previous: &[f64]) -> f64 {
    new.iter().zip(previous).map(|(a, b)| (a - b).abs()).sum()
}
