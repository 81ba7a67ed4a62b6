use crate::stats::{Accumulator, AccumulatorReport};
use crate::types::{NetworkRecord, OdeRecord, read_msgpack, write_msgpack};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Statistic collected over network runs.
pub trait Obs {
    fn update(&mut self, record: &NetworkRecord) -> Result<()>;
    fn report(&self) -> ObsReport;
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ObsReport {
    /// Per-step mean and standard deviation of the S, I and R counts.
    CountsPerStep {
        susceptible: Vec<AccumulatorReport>,
        infected: Vec<AccumulatorReport>,
        recovered: Vec<AccumulatorReport>,
    },
    /// Fraction of nodes ever infected by the final step.
    AttackRate(AccumulatorReport),
}

#[derive(Default)]
pub struct CountsPerStep {
    acc_vecs: [Vec<Accumulator>; 3],
}

impl Obs for CountsPerStep {
    fn update(&mut self, record: &NetworkRecord) -> Result<()> {
        let counts_vec = record.history.counts();
        for acc_vec in &mut self.acc_vecs {
            if acc_vec.len() < counts_vec.len() {
                acc_vec.resize_with(counts_vec.len(), Accumulator::new);
            }
        }
        let [acc_s, acc_i, acc_r] = &mut self.acc_vecs;
        for (i_step, counts) in counts_vec.iter().enumerate() {
            acc_s[i_step].add(counts.susceptible as f64);
            acc_i[i_step].add(counts.infected as f64);
            acc_r[i_step].add(counts.recovered as f64);
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        let reports = |acc_vec: &Vec<Accumulator>| -> Vec<AccumulatorReport> {
            acc_vec.iter().map(Accumulator::report).collect()
        };
        let [acc_s, acc_i, acc_r] = &self.acc_vecs;
        ObsReport::CountsPerStep {
            susceptible: reports(acc_s),
            infected: reports(acc_i),
            recovered: reports(acc_r),
        }
    }
}

#[derive(Default)]
pub struct AttackRate {
    acc: Accumulator,
}

impl Obs for AttackRate {
    fn update(&mut self, record: &NetworkRecord) -> Result<()> {
        let last = record
            .history
            .last()
            .context("network history has no snapshots")?;
        let counts = last.counts();
        let n_nodes = counts.total();
        if n_nodes > 0 {
            self.acc.add((n_nodes - counts.susceptible) as f64 / n_nodes as f64);
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport::AttackRate(self.acc.report())
    }
}

/// Summary of one compartmental model run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdeSummary {
    pub run_dir: PathBuf,
    /// Day of the sampled infection peak.
    pub peak_day: f64,
    pub peak_infected: f64,
    /// Everyone ever infected at the last sample (`i + r`).
    pub final_cumulative_infected: f64,
    /// Vaccinated and unvaccinated susceptible at the last sample.
    pub final_susceptible: f64,
    pub complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub n_network_runs: usize,
    pub network: Vec<ObsReport>,
    pub ode: Vec<OdeSummary>,
}

/// Collects statistics over every run of a simulation directory.
pub struct Analyzer {
    n_network_runs: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    ode_vec: Vec<OdeSummary>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(CountsPerStep::default()),
            Box::new(AttackRate::default()),
        ];
        Self {
            n_network_runs: 0,
            obs_ptr_vec,
            ode_vec: Vec::new(),
        }
    }

    pub fn add_network_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let record: NetworkRecord =
            read_msgpack(file).with_context(|| format!("failed to read {file:?}"))?;
        self.add_network_record(&record)
    }

    pub fn add_network_record(&mut self, record: &NetworkRecord) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record).context("failed to update observable")?;
        }
        self.n_network_runs += 1;
        Ok(())
    }

    pub fn add_ode_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let record: OdeRecord =
            read_msgpack(file).with_context(|| format!("failed to read {file:?}"))?;
        let run_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        self.add_ode_record(run_dir, &record)
    }

    pub fn add_ode_record(&mut self, run_dir: PathBuf, record: &OdeRecord) -> Result<()> {
        let (peak_day, peak_infected) = record
            .trajectory
            .peak_infected()
            .context("trajectory has no samples")?;
        let last = record
            .trajectory
            .final_sample()
            .context("trajectory has no samples")?;

        self.ode_vec.push(OdeSummary {
            run_dir,
            peak_day,
            peak_infected,
            final_cumulative_infected: last.state.cumulative_infected(),
            final_susceptible: last.state.susceptible(),
            complete: record.failure.is_none(),
        });
        Ok(())
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            n_network_runs: self.n_network_runs,
            network: self.obs_ptr_vec.iter().map(|obs| obs.report()).collect(),
            ode: self.ode_vec.clone(),
        }
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        write_msgpack(&self.report(), file).context("failed to save analysis report")
    }
}
