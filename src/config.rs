use crate::network::NetworkParams;
use crate::sirv::{Scenario, SirvParams};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seed of the network engine's random stream (drawn from the OS if unset).
    pub seed: Option<u64>,

    /// Network model parameters.
    #[serde(default)]
    pub network: NetworkParams,

    /// Compartmental model parameters.
    #[serde(default)]
    pub ode: OdeConfig,
}

/// Compartmental model section of the configuration file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OdeConfig {
    pub population: f64,
    pub initial_infected: f64,
    pub vaccinated_frac: f64,

    pub base_beta: f64,
    pub gamma: f64,
    pub vaccine_efficacy: f64,
    pub temperature: f64,
    pub mobility: f64,
    pub reference_temperature: f64,
    pub temperature_sensitivity: f64,

    /// Number of days to integrate.
    pub horizon_days: f64,
}

impl Default for OdeConfig {
    fn default() -> Self {
        let scenario = Scenario::default();
        let params = SirvParams::default();
        Self {
            population: scenario.population,
            initial_infected: scenario.initial_infected,
            vaccinated_frac: scenario.vaccinated_frac,
            base_beta: params.base_beta,
            gamma: params.gamma,
            vaccine_efficacy: params.vaccine_efficacy,
            temperature: params.temperature,
            mobility: params.mobility,
            reference_temperature: params.reference_temperature,
            temperature_sensitivity: params.temperature_sensitivity,
            horizon_days: 180.0,
        }
    }
}

impl OdeConfig {
    pub fn scenario(&self) -> Scenario {
        Scenario {
            population: self.population,
            initial_infected: self.initial_infected,
            vaccinated_frac: self.vaccinated_frac,
        }
    }

    pub fn params(&self) -> SirvParams {
        SirvParams {
            base_beta: self.base_beta,
            gamma: self.gamma,
            vaccine_efficacy: self.vaccine_efficacy,
            temperature: self.temperature,
            mobility: self.mobility,
            reference_temperature: self.reference_temperature,
            temperature_sensitivity: self.temperature_sensitivity,
        }
    }
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

        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let net = &self.network;
        check_num(net.n_nodes, 1..=100_000).context("invalid number of nodes")?;
        check_num(net.n_steps, 0..=100_000).context("invalid number of steps")?;
        net.validate().context("invalid network parameters")?;

        let ode = &self.ode;
        check_num(ode.horizon_days, 0.0..=36_500.0).context("invalid horizon")?;
        ode.scenario()
            .validate()
            .context("invalid initial conditions")?;
        ode.params()
            .validate()
            .context("invalid compartmental model parameters")?;

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
