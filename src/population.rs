use crate::payoff::relative_fitness;
use crate::strategy::Strategy;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, weighted::WeightedIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters of one reproduction pass.
#[derive(Debug, Clone, Copy)]
pub struct Reproduction {
    pub selection_strength: f64,
    pub mutation_rate: f64,
    pub sigma: f64,
}

/// Population of a single role with its full strategy history.
///
/// The population size is fixed at construction; generations are only appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population<S> {
    size: usize,
    history: Vec<Vec<S>>,
}

impl<S: Strategy> Population<S> {
    /// Create a population whose first generation is drawn at random.
    pub fn random<R: Rng>(size: usize, n_generations: usize, rng: &mut R) -> Result<Self> {
        let strategies = (0..size).map(|_| S::random(&mut *rng)).collect();
        Self::from_strategies(strategies, n_generations)
    }

    /// Create a population from the strategies of its first generation.
    pub fn from_strategies(strategies: Vec<S>, n_generations: usize) -> Result<Self> {
        if strategies.is_empty() {
            bail!("population must have at least one individual");
        }
        let mut history = Vec::with_capacity(n_generations);
        let size = strategies.len();
        history.push(strategies);
        Ok(Self { size, history })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Strategies of every generation produced so far.
    pub fn history(&self) -> &[Vec<S>] {
        &self.history
    }

    /// Strategies of the most recent generation.
    pub fn current(&self) -> &[S] {
        // History is never empty after construction.
        &self.history[self.history.len() - 1]
    }

    /// Produce the next generation.
    ///
    /// `payoff` is evaluated for every individual of the current generation
    /// and must only read state of previous generations.
    pub fn update<F>(&mut self, payoff: F, params: &Reproduction, seed: u64) -> Result<()>
    where
        F: Fn(usize, &S) -> f64 + Sync,
    {
        let old = self.current();
        let payoffs: Vec<f64> = old
            .par_iter()
            .enumerate()
            .map(|(i_agt, strategy)| payoff(i_agt, strategy))
            .collect();
        let fitness = relative_fitness(&payoffs, params.selection_strength)
            .context("failed to compute fitness")?;

        let new = reproduce(
            old,
            &fitness,
            self.size,
            params.mutation_rate,
            params.sigma,
            seed,
        )?;
        self.history.push(new);

        Ok(())
    }
}

/// Produce `population_size` offspring from `old`.
///
/// Each offspring is, with probability `mutation_rate`, a fresh random strategy,
/// and otherwise a mutated copy of a parent chosen with probability proportional
/// to its fitness. Every offspring draws from its own random stream derived from
/// `seed`, so the result does not depend on how the work is scheduled.
pub fn reproduce<S: Strategy>(
    old: &[S],
    fitness: &[f64],
    population_size: usize,
    mutation_rate: f64,
    sigma: f64,
    seed: u64,
) -> Result<Vec<S>> {
    if old.len() != fitness.len() {
        bail!(
            "fitness length must be {}, but is {}",
            old.len(),
            fitness.len()
        );
    }
    // Roulette wheel: the first index whose cumulative fitness exceeds a uniform draw.
    let parent_dist = WeightedIndex::new(fitness).context("invalid fitness")?;
    let mut_dist = Bernoulli::new(mutation_rate)?;

    (0..population_size)
        .into_par_iter()
        .map(|i_agt| {
            let mut rng = offspring_rng(seed, i_agt);
            if mut_dist.sample(&mut rng) {
                return Ok(S::random(&mut rng));
            }
            let parent = parent_dist.sample(&mut rng);
            old[parent].mutate(&mut rng, sigma)
        })
        .collect()
}

fn offspring_rng(seed: u64, i_agt: usize) -> ChaCha12Rng {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    rng.set_stream(i_agt as u64);
    rng
}
