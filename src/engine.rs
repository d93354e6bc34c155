use crate::acceptance::AcceptanceTable;
use crate::config::Config;
use crate::payoff::{receiver_payoff, sender_payoff};
use crate::population::{Population, Reproduction};
use crate::strategy::{Interval, Signal};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    ops::Range,
    path::Path,
};

/// Senders sharing one quality class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderClass {
    quality: f64,
    population: Population<Signal>,
}

impl SenderClass {
    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn population(&self) -> &Population<Signal> {
        &self.population
    }
}

/// Coevolution engine.
///
/// Holds the configuration, the sender classes, the receivers and the random
/// number generator, and advances all populations one generation at a time.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    senders: Vec<SenderClass>,
    receivers: Population<Interval>,
    generation: usize,
    table: AcceptanceTable,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Seed random initial populations and run every generation.
    pub fn simulate(cfg: Config) -> Result<Self> {
        let mut engine =
            Self::generate_initial_condition(cfg).context("failed to generate initial condition")?;
        engine.run().context("failed to run coevolution")?;
        Ok(engine)
    }

    /// Create a new `Engine` with the given configuration and random initial populations.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let n_generations = cfg.init.n_generations;
        let mut senders = Vec::with_capacity(cfg.init.senders.len());
        for class in &cfg.init.senders {
            let population = Population::random(class.n_agents, n_generations, &mut rng)?;
            senders.push(SenderClass {
                quality: class.quality,
                population,
            });
        }
        let receivers = Population::random(cfg.init.n_receivers, n_generations, &mut rng)?;

        Ok(Self {
            cfg,
            senders,
            receivers,
            generation: 0,
            table: AcceptanceTable::default(),
            rng,
        })
    }

    /// Create a new `Engine` whose first generation is given explicitly.
    ///
    /// `senders` holds one strategy list per configured sender class, in order.
    pub fn from_strategies(
        cfg: Config,
        senders: Vec<Vec<Signal>>,
        receivers: Vec<Interval>,
    ) -> Result<Self> {
        let mut engine = Self::generate_initial_condition(cfg)?;
        let n_generations = engine.cfg.init.n_generations;

        if senders.len() != engine.senders.len() {
            bail!(
                "expected strategies of {} sender classes, but got {}",
                engine.senders.len(),
                senders.len()
            );
        }
        for (class, signals) in engine.senders.iter_mut().zip(senders) {
            if signals.len() != class.population.size() {
                bail!(
                    "sender class {} must have {} strategies, but has {}",
                    class.quality,
                    class.population.size(),
                    signals.len()
                );
            }
            if let Some(bad) = signals.iter().find(|s| !(0.0..=1.0).contains(&s.value())) {
                bail!("signal must be in the range [0, 1], but is {}", bad.value());
            }
            class.population = Population::from_strategies(signals, n_generations)?;
        }

        if receivers.len() != engine.receivers.size() {
            bail!(
                "receivers must have {} strategies, but have {}",
                engine.receivers.size(),
                receivers.len()
            );
        }
        engine.receivers = Population::from_strategies(receivers, n_generations)?;

        Ok(engine)
    }

    /// Run every remaining generation.
    pub fn run(&mut self) -> Result<()> {
        let n_generations = self.cfg.init.n_generations;
        let gens_per_log = self.cfg.output.gens_per_log;

        while self.generation + 1 < n_generations {
            self.perform_generation()
                .with_context(|| format!("failed to perform generation {}", self.generation + 1))?;

            if self.generation % gens_per_log == 0 || self.generation + 1 == n_generations {
                let progress = 100.0 * self.generation as f64 / (n_generations - 1) as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        Ok(())
    }

    /// Save the entire engine, including histories and random number generator.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Index of the most recent generation.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn senders(&self) -> &[SenderClass] {
        &self.senders
    }

    pub fn qualities(&self) -> Vec<f64> {
        self.senders.iter().map(|class| class.quality).collect()
    }

    pub fn sender_history(&self, i_class: usize) -> &[Vec<Signal>] {
        self.senders[i_class].population.history()
    }

    pub fn receiver_history(&self) -> &[Vec<Interval>] {
        self.receivers.history()
    }

    /// Acceptance table used to produce the most recent generation.
    pub fn acceptance_table(&self) -> &AcceptanceTable {
        &self.table
    }

    /// Fraction of the receivers of a generation accepting `signal`.
    pub fn acceptance_rate(&self, generation: usize, signal: Signal) -> Result<f64> {
        let receivers = self
            .receivers
            .history()
            .get(generation)
            .with_context(|| format!("generation {generation} has not been produced"))?;
        let n_accepted = receivers.iter().filter(|rcv| rcv.accepts(signal)).count();
        Ok(n_accepted as f64 / receivers.len() as f64)
    }

    /// Average acceptance over generation ranges and signal bins.
    ///
    /// Element `[b][j]` is the acceptance rate of the signal at the center of bin
    /// `signal_edges[j]..signal_edges[j + 1]`, averaged over generations
    /// `gen_edges[b]..gen_edges[b + 1]`.
    pub fn acceptance_profile(
        &self,
        gen_edges: &[usize],
        signal_edges: &[f64],
    ) -> Result<Vec<Vec<f64>>> {
        let signals: Vec<Signal> = signal_edges
            .windows(2)
            .map(|pair| Signal((pair[0] + pair[1]) / 2.0))
            .collect();

        let mut profile = Vec::with_capacity(gen_edges.len().saturating_sub(1));
        for pair in gen_edges.windows(2) {
            let gens: Range<usize> = pair[0]..pair[1];
            if gens.is_empty() {
                bail!("generation range {gens:?} is empty");
            }
            let n_gens = gens.len() as f64;
            let mut row = Vec::with_capacity(signals.len());
            for &signal in &signals {
                let mut sum = 0.0;
                for generation in gens.clone() {
                    sum += self.acceptance_rate(generation, signal)?;
                }
                row.push(sum / n_gens);
            }
            profile.push(row);
        }

        Ok(profile)
    }

    fn perform_generation(&mut self) -> Result<()> {
        // Build the acceptance table from the previous generation.
        let signals: Vec<&[Signal]> = self
            .senders
            .iter()
            .map(|class| class.population.current())
            .collect();
        let table = AcceptanceTable::build(&signals, self.receivers.current());
        let qualities = self.qualities();

        let model = &self.cfg.model;
        let sender_params = Reproduction {
            selection_strength: model.selection_strength,
            mutation_rate: model.mutation_rate,
            sigma: model.sender_sigma,
        };
        let receiver_params = Reproduction {
            selection_strength: model.selection_strength,
            mutation_rate: model.mutation_rate,
            sigma: model.receiver_sigma,
        };

        // Update every sender class.
        for (i_class, class) in self.senders.iter_mut().enumerate() {
            let quality = class.quality;
            let seed = self.rng.random();
            class
                .population
                .update(
                    |i_agt, signal| {
                        let acceptance_rate = table.acceptance_rate(i_class, i_agt);
                        sender_payoff(acceptance_rate, signal.value(), quality)
                    },
                    &sender_params,
                    seed,
                )
                .with_context(|| format!("failed to update senders of quality {quality}"))?;
        }

        // Update the receivers.
        let seed = self.rng.random();
        self.receivers
            .update(
                |i_agt, _| receiver_payoff(&table, &qualities, i_agt),
                &receiver_params,
                seed,
            )
            .context("failed to update receivers")?;

        self.table = table;
        self.generation += 1;

        Ok(())
    }
}
