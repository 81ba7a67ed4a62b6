use crate::analysis::Analyzer;
use crate::config::Config;
use crate::error::Error;
use crate::random::seeded_rng;
use crate::sirv::{Trajectory, integrate};
use crate::types::{NetworkRecord, OdeRecord, write_msgpack};
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Owns a simulation directory: its `config.toml` and its `run-NNNN` dirs.
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

    /// Run the network model in a new run dir and return that dir.
    pub fn run_network(&self) -> Result<PathBuf> {
        let run_dir = self.create_run_dir()?;

        let seed = self.cfg.seed.unwrap_or_else(rand::random);
        log::info!("network seed {seed}");
        let mut rng = seeded_rng(seed);

        let params = self.cfg.network.clone();
        let (graph, history) = params
            .simulate(&mut rng)
            .context("failed to simulate network model")?;
        log::info!(
            "built graph with {} nodes and {} edges",
            graph.n_nodes(),
            graph.n_edges()
        );
        if let Some(last) = history.last() {
            log::info!("final counts {:?}", last.counts());
        }

        let file = self.network_file(&run_dir);
        let record = NetworkRecord {
            seed,
            params,
            graph,
            history,
        };
        write_msgpack(&record, &file).with_context(|| format!("failed to write {file:?}"))?;
        log::info!("wrote {file:?}");

        Ok(run_dir)
    }

    /// Integrate the compartmental model in a new run dir and return that dir.
    ///
    /// If integration fails the partial trajectory is still written.
    pub fn run_ode(&self) -> Result<PathBuf> {
        let run_dir = self.create_run_dir()?;

        let ode = &self.cfg.ode;
        let initial = ode
            .scenario()
            .initial_state()
            .context("failed to build initial state")?;
        let params = ode.params();
        log::info!(
            "effective beta {:.4}, R0 {:.4}",
            params.effective_beta(),
            params.r0()
        );

        let (trajectory, failure) = match integrate(initial, &params, ode.horizon_days, None) {
            Ok(trajectory) => (trajectory, None),
            Err(Error::IntegrationFailure { t, reason, partial }) => {
                log::warn!("integration stopped at t = {t}: {reason}");
                (partial, Some(format!("integration failed at t = {t}: {reason}")))
            }
            Err(error) => return Err(error).context("failed to integrate compartmental model"),
        };
        log_trajectory(&trajectory);

        let file = self.ode_file(&run_dir);
        let record = OdeRecord {
            config: ode.clone(),
            trajectory,
            failure,
        };
        write_msgpack(&record, &file).with_context(|| format!("failed to write {file:?}"))?;
        log::info!("wrote {file:?}");

        if let Some(failure) = record.failure {
            bail!(failure);
        }
        Ok(run_dir)
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new();

        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            let network_file = self.network_file(&run_dir);
            if network_file.is_file() {
                analyzer
                    .add_network_file(&network_file)
                    .context("failed to add network file")?;
            }
            let ode_file = self.ode_file(&run_dir);
            if ode_file.is_file() {
                analyzer
                    .add_ode_file(&ode_file)
                    .context("failed to add ode file")?;
            }
        }

        let file = self.analysis_file();
        analyzer
            .save_results(&file)
            .context("failed to save results")?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let file = self.analysis_file();
        if file.is_file() {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        Ok(())
    }

    fn create_run_dir(&self) -> Result<PathBuf> {
        let run_idx = self.run_dirs().context("failed to list run dirs")?.len();

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        Ok(run_dir)
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut run_dirs: Vec<_> = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        run_dirs.sort();
        Ok(run_dirs)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn network_file(&self, run_dir: &Path) -> PathBuf {
        run_dir.join("network.msgpack")
    }

    fn ode_file(&self, run_dir: &Path) -> PathBuf {
        run_dir.join("ode.msgpack")
    }

    fn analysis_file(&self) -> PathBuf {
        self.sim_dir.join("analysis.msgpack")
    }
}

fn log_trajectory(trajectory: &Trajectory) {
    for sample in trajectory.samples() {
        let s = &sample.state;
        log::debug!(
            "t = {:7.2}: su = {:.2}, sv = {:.2}, i = {:.2}, r = {:.2}",
            sample.t,
            s.su,
            s.sv,
            s.i,
            s.r
        );
    }
    if let Some((t, i)) = trajectory.peak_infected() {
        log::info!("peak infected {i:.2} at t = {t}");
    }
}
