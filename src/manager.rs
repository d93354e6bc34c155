use crate::analysis::Results;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Runs and analyzes simulations stored in a directory.
///
/// The directory holds a `config.toml` and one `run-NNNN` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a new simulation in the next free run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let engine = Engine::simulate(self.cfg.clone()).context("failed to simulate")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let engine_file = self.engine_file(run_idx);
        engine
            .save(&engine_file)
            .with_context(|| format!("failed to save {engine_file:?}"))?;
        log::info!("saved {engine_file:?}");

        Ok(())
    }

    /// Analyze every run and write its results next to it.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let engine_file = self.engine_file(run_idx);
            let engine = Engine::load(&engine_file)
                .with_context(|| format!("failed to load {engine_file:?}"))?;
            if engine.cfg() != &self.cfg {
                bail!("config of {engine_file:?} differs from the current config");
            }
            log::info!("loaded {engine_file:?}");

            let results = Results::new(&engine).context("failed to analyze run")?;

            let results_file = self.results_file(run_idx);
            results
                .save(&results_file)
                .with_context(|| format!("failed to save {results_file:?}"))?;
            log::info!("saved {results_file:?}");
        }

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn engine_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("engine.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}
