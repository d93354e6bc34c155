//! Payoffs of the signaling game and their conversion to fitness.

use crate::acceptance::AcceptanceTable;
use anyhow::{Result, bail};

/// Fitness of a single payoff: `exp(selection_strength * payoff)`.
pub fn fitness(payoff: f64, selection_strength: f64) -> f64 {
    (selection_strength * payoff).exp()
}

/// Fitness of every payoff divided by the largest one.
///
/// Computed in the log domain, so the result is proportional to [`fitness`]
/// but its maximum is exactly 1 and its sum can neither overflow nor vanish.
/// Log fitness beyond the range of `f64` is clamped to `±f64::MAX`, which
/// gives such individuals all or none of the selection weight.
pub fn relative_fitness(payoffs: &[f64], selection_strength: f64) -> Result<Vec<f64>> {
    if let Some(bad) = payoffs.iter().find(|val| val.is_nan()) {
        bail!("payoff must not be NaN, but is {bad}");
    }
    if selection_strength == 0.0 {
        return Ok(vec![1.0; payoffs.len()]);
    }
    let log_fit: Vec<f64> = payoffs
        .iter()
        .map(|&p| (selection_strength * p).clamp(-f64::MAX, f64::MAX))
        .collect();
    let max = log_fit.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(log_fit.iter().map(|&val| (val - max).exp()).collect())
}

/// Payoff of a sender: share of receivers accepting it minus the signal cost `signal / quality`.
pub fn sender_payoff(acceptance_rate: f64, signal: f64, quality: f64) -> f64 {
    acceptance_rate - signal / quality
}

/// Payoff of a receiver: `log2(quality)` summed over every accepted sender,
/// normalized by the total number of senders.
pub fn receiver_payoff(table: &AcceptanceTable, qualities: &[f64], i_receiver: usize) -> f64 {
    let n_senders = table.n_senders();
    if n_senders == 0 {
        return 0.0;
    }
    let reward: f64 = qualities
        .iter()
        .enumerate()
        .map(|(i_class, &quality)| quality.log2() * table.accepted_count(i_class, i_receiver) as f64)
        .sum();
    reward / n_senders as f64
}
