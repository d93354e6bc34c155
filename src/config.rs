use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Coevolution game parameters.
    pub model: ModelConfig,
    /// Initial populations.
    pub init: InitConfig,
    /// Logging and analysis output.
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Coefficient of the exponential payoff to fitness transform.
    pub selection_strength: f64,
    /// Probability that an offspring is drawn at random instead of inherited.
    pub mutation_rate: f64,
    /// Standard deviation of sender signal mutations.
    pub sender_sigma: f64,
    /// Standard deviation of receiver bound mutations.
    pub receiver_sigma: f64,
    /// Receiver strategy encoding.
    #[serde(default)]
    pub receiver_kind: ReceiverKind,
}

#[derive(Debug, Default, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverKind {
    /// Accept signals strictly inside `(low, high)`.
    #[default]
    Interval,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Total number of generations, including the random generation 0.
    pub n_generations: usize,
    /// Number of receivers.
    pub n_receivers: usize,
    /// Sender sub-populations, one per quality class.
    pub senders: Vec<SenderConfig>,
    /// Seed of the random number generator (entropy from the OS if absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    pub quality: f64,
    pub n_agents: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of generations between progress messages.
    pub gens_per_log: usize,
    /// Number of generation bins of the analysis histograms.
    pub gen_bins: usize,
    /// Number of signal bins of the analysis histograms.
    pub signal_bins: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate().context("invalid model parameters")?;
        self.init.validate().context("invalid initial populations")?;

        let output = &self.output;
        check_num(output.gens_per_log, 1..).context("invalid number of generations per log")?;
        check_num(output.gen_bins, 1..=self.init.n_generations)
            .context("invalid number of generation bins")?;
        check_num(output.signal_bins, 1..10_000).context("invalid number of signal bins")?;

        Ok(())
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        check_finite(self.selection_strength).context("invalid selection strength")?;
        check_num(self.mutation_rate, 0.0..=1.0).context("invalid mutation rate")?;
        check_finite(self.sender_sigma)
            .and_then(|_| check_num(self.sender_sigma, 0.0..))
            .context("invalid sender sigma")?;
        check_finite(self.receiver_sigma)
            .and_then(|_| check_num(self.receiver_sigma, 0.0..))
            .context("invalid receiver sigma")?;
        Ok(())
    }
}

impl InitConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.n_generations, 2..100_000_000).context("invalid number of generations")?;
        check_num(self.n_receivers, 1..1_000_000).context("invalid number of receivers")?;

        if self.senders.is_empty() {
            bail!("at least one sender class is required");
        }
        for (i_class, class) in self.senders.iter().enumerate() {
            check_finite(class.quality)
                .and_then(|_| check_num(class.quality, f64::MIN_POSITIVE..))
                .with_context(|| format!("invalid quality of sender class {i_class}"))?;
            check_num(class.n_agents, 1..1_000_000)
                .with_context(|| format!("invalid number of agents of sender class {i_class}"))?;
            if self.senders[..i_class]
                .iter()
                .any(|other| other.quality == class.quality)
            {
                bail!("duplicate sender quality {}", class.quality);
            }
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_finite(num: f64) -> Result<()> {
    if !num.is_finite() {
        bail!("number must be finite, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> Config {
        Config {
            model: ModelConfig {
                selection_strength: 1.0,
                mutation_rate: 0.005,
                sender_sigma: 0.006,
                receiver_sigma: 0.002,
                receiver_kind: ReceiverKind::Interval,
            },
            init: InitConfig {
                n_generations: 40,
                n_receivers: 12,
                senders: vec![
                    SenderConfig {
                        quality: 0.5,
                        n_agents: 10,
                    },
                    SenderConfig {
                        quality: 2.0,
                        n_agents: 6,
                    },
                ],
                seed: Some(7),
            },
            output: OutputConfig {
                gens_per_log: 10,
                gen_bins: 8,
                signal_bins: 10,
            },
        }
    }

    #[test]
    fn parses_sectioned_toml() {
        let contents = r#"
[model]
selection_strength = 1.0
mutation_rate = 0.005
sender_sigma = 0.006
receiver_sigma = 0.0

[init]
n_generations = 100
n_receivers = 50
senders = [ { quality = 0.5, n_agents = 50 }, { quality = 2.0, n_agents = 25 } ]

[output]
gens_per_log = 10
gen_bins = 10
signal_bins = 20
"#;
        let cfg: Config = toml::from_str(contents).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.model.receiver_kind, ReceiverKind::Interval);
        assert_eq!(cfg.init.seed, None);
        assert_eq!(cfg.init.senders.len(), 2);
        assert_eq!(cfg.init.senders[1].quality, 2.0);
    }

    #[test]
    fn accepts_test_config() {
        test_config().validate().unwrap();
    }

    #[test]
    fn rejects_too_few_generations() {
        let mut cfg = test_config();
        cfg.init.n_generations = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_too_many_generations() {
        let mut cfg = test_config();
        cfg.init.n_generations = usize::MAX / 2;
        assert!(cfg.validate().is_err());

        let mut cfg = test_config();
        cfg.init.n_generations = 99_999_999;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_empty_populations() {
        let mut cfg = test_config();
        cfg.init.n_receivers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = test_config();
        cfg.init.senders[0].n_agents = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = test_config();
        cfg.init.senders.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mutation_rate_outside_unit_interval() {
        for rate in [-0.1, 1.5, f64::NAN] {
            let mut cfg = test_config();
            cfg.model.mutation_rate = rate;
            assert!(cfg.validate().is_err(), "rate {rate} accepted");
        }
    }

    #[test]
    fn rejects_non_positive_quality() {
        for quality in [0.0, -2.0, f64::INFINITY, f64::NAN] {
            let mut cfg = test_config();
            cfg.init.senders[0].quality = quality;
            assert!(cfg.validate().is_err(), "quality {quality} accepted");
        }
    }

    #[test]
    fn rejects_duplicate_quality() {
        let mut cfg = test_config();
        cfg.init.senders[1].quality = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_negative_sigma_and_infinite_selection() {
        let mut cfg = test_config();
        cfg.model.sender_sigma = -0.01;
        assert!(cfg.validate().is_err());

        let mut cfg = test_config();
        cfg.model.selection_strength = f64::INFINITY;
        assert!(cfg.validate().is_err());

        let mut cfg = test_config();
        cfg.model.selection_strength = -3.0;
        assert!(cfg.validate().is_ok());
    }
}
