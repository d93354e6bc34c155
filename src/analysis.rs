use crate::engine::Engine;
use crate::stats::{Accumulator, AccumulatorReport, histogram};
use crate::strategy::Signal;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Analysis of one sender class.
#[derive(Debug, Serialize, Deserialize)]
pub struct SenderReport {
    pub quality: f64,
    /// Signal mean and standard deviation of every generation.
    pub signal_by_gen: Vec<AccumulatorReport>,
    /// Counts of every signal of every generation, by signal bin.
    pub signal_hist: Vec<usize>,
    /// Counts of the per-generation mean signals, by signal bin.
    pub mean_signal_hist: Vec<usize>,
    /// Normalized density of signals, indexed by generation bin and signal bin.
    pub density: Vec<Vec<f64>>,
}

/// Data consumed by plotting: sender densities and receiver acceptance
/// over a common generation x signal grid.
#[derive(Debug, Serialize, Deserialize)]
pub struct Results {
    pub gen_edges: Vec<usize>,
    pub signal_edges: Vec<f64>,
    pub senders: Vec<SenderReport>,
    /// Average receiver acceptance, indexed by generation bin and signal bin.
    pub acceptance: Vec<Vec<f64>>,
}

impl Results {
    pub fn new(engine: &Engine) -> Result<Self> {
        let cfg = engine.cfg();
        let n_generations = engine.receiver_history().len();
        let gen_bins = cfg.output.gen_bins.min(n_generations);
        let signal_bins = cfg.output.signal_bins;

        let gen_edges: Vec<usize> = (0..=gen_bins)
            .map(|i_bin| i_bin * n_generations / gen_bins)
            .collect();
        let signal_edges: Vec<f64> = (0..=signal_bins)
            .map(|i_bin| i_bin as f64 / signal_bins as f64)
            .collect();

        let senders = engine
            .senders()
            .iter()
            .map(|class| {
                let history = class.population().history();
                let signal_by_gen: Vec<_> = history
                    .iter()
                    .map(|signals| {
                        let acc: Accumulator = signals.iter().map(|s| s.value()).collect();
                        acc.report()
                    })
                    .collect();
                let signal_hist = histogram(
                    history.iter().flatten().map(|s| s.value()),
                    signal_bins,
                );
                let mean_signal_hist =
                    histogram(signal_by_gen.iter().map(|rep| rep.mean), signal_bins);
                SenderReport {
                    quality: class.quality(),
                    signal_by_gen,
                    signal_hist,
                    mean_signal_hist,
                    density: signal_density(history, gen_bins, signal_bins),
                }
            })
            .collect();

        let acceptance = engine
            .acceptance_profile(&gen_edges, &signal_edges)
            .context("failed to compute acceptance profile")?;

        Ok(Self {
            gen_edges,
            signal_edges,
            senders,
            acceptance,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let results = decode::from_read(&mut reader).context("failed to deserialize results")?;
        Ok(results)
    }
}

/// Two-dimensional histogram of signals over generations.
///
/// Counts are divided by the average over generation bins of the largest
/// count in each bin, so a concentrated population reads close to 1.
fn signal_density(history: &[Vec<Signal>], gen_bins: usize, signal_bins: usize) -> Vec<Vec<f64>> {
    let n_generations = history.len();
    let mut density = vec![vec![0.0; signal_bins]; gen_bins];
    for (generation, signals) in history.iter().enumerate() {
        let i_gen_bin = generation * gen_bins / n_generations;
        for signal in signals {
            let i_signal_bin =
                ((signal.value() * signal_bins as f64) as usize).min(signal_bins - 1);
            density[i_gen_bin][i_signal_bin] += 1.0;
        }
    }

    let max_sum: f64 = density
        .iter()
        .map(|row| row.iter().copied().fold(0.0, f64::max))
        .sum();
    let norm = max_sum / gen_bins as f64;
    if norm > 0.0 {
        density
            .iter_mut()
            .flatten()
            .for_each(|count| *count /= norm);
    }
    density
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::strategy::Interval;

    #[test]
    fn density_is_normalized_by_mean_bin_maximum() {
        let history = vec![
            vec![Signal(0.1), Signal(0.1)],
            vec![Signal(0.1), Signal(0.9)],
            vec![Signal(1.0), Signal(0.9)],
            vec![Signal(0.9), Signal(0.9)],
        ];
        let density = signal_density(&history, 2, 2);
        // Raw counts: [[3, 1], [0, 4]], mean maximum 3.5.
        assert_eq!(density[0][0], 3.0 / 3.5);
        assert_eq!(density[0][1], 1.0 / 3.5);
        assert_eq!(density[1][0], 0.0);
        assert_eq!(density[1][1], 4.0 / 3.5);
    }

    #[test]
    fn results_cover_the_whole_run() {
        let cfg = test_config();
        let engine = Engine::simulate(cfg.clone()).unwrap();
        let results = Results::new(&engine).unwrap();

        assert_eq!(results.gen_edges.first(), Some(&0));
        assert_eq!(results.gen_edges.last(), Some(&cfg.init.n_generations));
        assert_eq!(results.signal_edges.len(), cfg.output.signal_bins + 1);
        assert_eq!(results.acceptance.len(), cfg.output.gen_bins);
        assert!(
            results
                .acceptance
                .iter()
                .flatten()
                .all(|rate| (0.0..=1.0).contains(rate))
        );

        assert_eq!(results.senders.len(), cfg.init.senders.len());
        for (report, class_cfg) in results.senders.iter().zip(&cfg.init.senders) {
            assert_eq!(report.quality, class_cfg.quality);
            assert_eq!(report.signal_by_gen.len(), cfg.init.n_generations);
            assert_eq!(report.density.len(), cfg.output.gen_bins);
            assert!(report.density.iter().all(|row| row.len() == cfg.output.signal_bins));

            let n_signals = cfg.init.n_generations * class_cfg.n_agents;
            assert_eq!(report.signal_hist.len(), cfg.output.signal_bins);
            assert_eq!(report.signal_hist.iter().sum::<usize>(), n_signals);
            assert_eq!(report.mean_signal_hist.len(), cfg.output.signal_bins);
            assert_eq!(
                report.mean_signal_hist.iter().sum::<usize>(),
                cfg.init.n_generations
            );
        }
    }

    #[test]
    fn histograms_pool_signals_and_generation_means() {
        let mut cfg = test_config();
        cfg.init.n_generations = 3;
        cfg.output.gen_bins = 1;
        cfg.output.signal_bins = 4;
        let low = vec![Signal(0.1), Signal(0.2)];
        let high = vec![Signal(0.9), Signal(1.0)];
        let receivers = vec![Interval::new(0.0, 1.0); cfg.init.n_receivers];
        cfg.init.senders[0].n_agents = 2;
        cfg.init.senders[1].n_agents = 2;
        cfg.model.selection_strength = 0.0;
        cfg.model.mutation_rate = 0.0;
        cfg.model.sender_sigma = 0.0;
        cfg.model.receiver_sigma = 0.0;
        let mut engine = Engine::from_strategies(cfg, vec![low, high], receivers).unwrap();
        engine.run().unwrap();
        let results = Results::new(&engine).unwrap();

        // Without noise every generation copies its parents, so means stay in the
        // first bin for the low class and the last bin for the high class.
        let low = &results.senders[0];
        assert_eq!(low.signal_hist.iter().sum::<usize>(), 6);
        assert_eq!(low.mean_signal_hist, vec![3, 0, 0, 0]);
        let high = &results.senders[1];
        assert_eq!(high.signal_hist, vec![0, 0, 0, 6]);
        assert_eq!(high.mean_signal_hist, vec![0, 0, 0, 3]);
    }
}
