//! Heritable strategies of senders and receivers.

use anyhow::{Context, Error, Result, bail};
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Strategy kind of a population.
///
/// Reproduction is written once against this trait; only sampling and
/// mutation differ between roles.
pub trait Strategy: Clone + Send + Sync {
    /// Draw an independent random strategy.
    fn random<R: Rng>(rng: &mut R) -> Self;

    /// Perturb every component with Gaussian noise of scale `sigma`
    /// and clamp the result back into `[0, 1]`.
    fn mutate<R: Rng>(&self, rng: &mut R, sigma: f64) -> Result<Self>;
}

/// Signal intensity emitted by a sender, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Signal(pub(crate) f64);

impl Signal {
    pub fn new(val: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&val) {
            bail!("signal must be in the range [0, 1], but is {val}");
        }
        Ok(Self(val))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Signal {
    type Error = Error;

    fn try_from(val: f64) -> Result<Self> {
        Self::new(val)
    }
}

impl From<Signal> for f64 {
    fn from(signal: Signal) -> Self {
        signal.0
    }
}

impl Strategy for Signal {
    fn random<R: Rng>(rng: &mut R) -> Self {
        Signal(rng.random::<f64>())
    }

    fn mutate<R: Rng>(&self, rng: &mut R, sigma: f64) -> Result<Self> {
        Ok(Signal(perturb(self.0, rng, sigma)?))
    }
}

/// Range of signals accepted by a receiver.
///
/// Always satisfies `0 <= low <= high <= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Bounds")]
pub struct Interval {
    low: f64,
    high: f64,
}

#[derive(Deserialize)]
struct Bounds {
    low: f64,
    high: f64,
}

impl TryFrom<Bounds> for Interval {
    type Error = Error;

    fn try_from(bounds: Bounds) -> Result<Self> {
        let Bounds { low, high } = bounds;
        if !(0.0 <= low && low <= high && high <= 1.0) {
            bail!("interval must satisfy 0 <= low <= high <= 1, but is ({low}, {high})");
        }
        Ok(Self { low, high })
    }
}

impl Interval {
    /// Create an interval from two bounds, clamped into `[0, 1]` and ordered.
    pub fn new(a: f64, b: f64) -> Self {
        let a = a.clamp(0.0, 1.0);
        let b = b.clamp(0.0, 1.0);
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Whether `signal` lies strictly inside the interval.
    pub fn accepts(&self, signal: Signal) -> bool {
        self.low < signal.0 && signal.0 < self.high
    }
}

impl Strategy for Interval {
    fn random<R: Rng>(rng: &mut R) -> Self {
        let width = rng.random_range(0.0..=0.5);
        let center = rng.random_range(-width..=1.0 + width);
        Self {
            low: f64::max(0.0, center - width),
            high: f64::min(1.0, center + width),
        }
    }

    fn mutate<R: Rng>(&self, rng: &mut R, sigma: f64) -> Result<Self> {
        let low = perturb(self.low, rng, sigma).context("failed to mutate lower bound")?;
        let high = perturb(self.high, rng, sigma).context("failed to mutate upper bound")?;
        // Bounds that cross are swapped rather than collapsed.
        Ok(Self::new(low, high))
    }
}

fn perturb<R: Rng>(val: f64, rng: &mut R, sigma: f64) -> Result<f64> {
    if sigma == 0.0 {
        return Ok(val);
    }
    let noise_dist = Normal::new(0.0, sigma)?;
    Ok((val + noise_dist.sample(rng)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn acceptance_is_strict() {
        let interval = Interval::new(0.2, 0.8);
        assert!(interval.accepts(Signal(0.5)));
        assert!(interval.accepts(Signal(0.2000001)));
        assert!(!interval.accepts(Signal(0.2)));
        assert!(!interval.accepts(Signal(0.8)));
        assert!(!interval.accepts(Signal(0.1)));
    }

    #[test]
    fn signal_outside_unit_interval_is_rejected() {
        assert_eq!(Signal::new(0.25).unwrap(), Signal(0.25));
        assert!(Signal::new(1.5).is_err());
        assert!(Signal::new(-0.1).is_err());
        assert!(Signal::new(f64::NAN).is_err());
    }

    #[test]
    fn deserialization_checks_bounds() {
        let bytes = rmp_serde::to_vec(&0.4).unwrap();
        assert_eq!(rmp_serde::from_slice::<Signal>(&bytes).unwrap(), Signal(0.4));
        let bytes = rmp_serde::to_vec(&1.5).unwrap();
        assert!(rmp_serde::from_slice::<Signal>(&bytes).is_err());

        let interval = Interval::new(0.2, 0.7);
        let bytes = rmp_serde::to_vec(&interval).unwrap();
        assert_eq!(rmp_serde::from_slice::<Interval>(&bytes).unwrap(), interval);
        let bytes = rmp_serde::to_vec(&(0.7, 0.2)).unwrap();
        assert!(rmp_serde::from_slice::<Interval>(&bytes).is_err());
        let bytes = rmp_serde::to_vec(&(-0.1, 0.2)).unwrap();
        assert!(rmp_serde::from_slice::<Interval>(&bytes).is_err());
    }

    #[test]
    fn new_interval_is_clamped_and_ordered() {
        let interval = Interval::new(1.3, -0.2);
        assert_eq!(interval.low(), 0.0);
        assert_eq!(interval.high(), 1.0);
    }

    #[test]
    fn random_strategies_are_in_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        for _ in 0..10_000 {
            let signal = Signal::random(&mut rng);
            assert!((0.0..=1.0).contains(&signal.value()));

            let interval = Interval::random(&mut rng);
            assert!(0.0 <= interval.low());
            assert!(interval.low() <= interval.high());
            assert!(interval.high() <= 1.0);
        }
    }

    #[test]
    fn random_intervals_reach_both_edges() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let intervals: Vec<_> = (0..10_000).map(|_| Interval::random(&mut rng)).collect();
        assert!(intervals.iter().any(|i| i.low() == 0.0));
        assert!(intervals.iter().any(|i| i.high() == 1.0));
        assert!(intervals.iter().all(|i| i.high() - i.low() <= 1.0));
    }

    #[test]
    fn mutation_stays_in_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut signal = Signal(0.99);
        let mut interval = Interval::new(0.0, 0.01);
        for _ in 0..10_000 {
            signal = signal.mutate(&mut rng, 0.3).unwrap();
            assert!((0.0..=1.0).contains(&signal.value()));

            interval = interval.mutate(&mut rng, 0.3).unwrap();
            assert!(0.0 <= interval.low());
            assert!(interval.low() <= interval.high());
            assert!(interval.high() <= 1.0);
        }
    }

    #[test]
    fn zero_sigma_carries_strategy_over() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let signal = Signal(0.37);
        let interval = Interval::new(0.25, 0.75);
        assert_eq!(signal.mutate(&mut rng, 0.0).unwrap(), signal);
        assert_eq!(interval.mutate(&mut rng, 0.0).unwrap(), interval);
    }
}
