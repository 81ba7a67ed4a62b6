//! Deterministic SIRV compartmental model with an environment-modulated
//! transmission rate.
//!
//! Compartments are unvaccinated susceptible (`su`), vaccinated susceptible
//! (`sv`), infected (`i`) and recovered (`r`). The population is closed, so
//! `su + sv + i + r` is conserved along every trajectory.

use crate::error::{Error, Result, check_finite, check_num, check_prob};
use crate::solver::{DormandPrince, Tolerance};
use serde::{Deserialize, Serialize};

/// Transmission amplification from cold weather.
///
/// Linear in the deficit below `ref_temperature`; exactly 1 at or above it.
pub fn virus_survival_factor(temperature: f64, ref_temperature: f64, sensitivity: f64) -> f64 {
    let deficit = ref_temperature - temperature;
    if deficit <= 0.0 {
        return 1.0;
    }
    1.0 + sensitivity * deficit
}

/// Contact scaling relative to baseline mobility (1.0).
pub fn mobility_factor(mobility: f64) -> f64 {
    mobility
}

pub fn effective_beta(
    base_beta: f64,
    temperature: f64,
    mobility: f64,
    ref_temperature: f64,
    sensitivity: f64,
) -> f64 {
    base_beta
        * virus_survival_factor(temperature, ref_temperature, sensitivity)
        * mobility_factor(mobility)
}

/// Parameters of the SIRV model, constant over one integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SirvParams {
    /// Base transmission rate per day.
    pub base_beta: f64,
    /// Recovery rate per day.
    pub gamma: f64,
    /// Fractional reduction of the force of infection on vaccinated people.
    pub vaccine_efficacy: f64,
    /// Ambient temperature in °C.
    pub temperature: f64,
    /// Mobility index, 1.0 being baseline.
    pub mobility: f64,
    /// Temperature at and above which weather has no effect, in °C.
    pub reference_temperature: f64,
    /// Relative transmission increase per °C below the reference.
    pub temperature_sensitivity: f64,
}

impl Default for SirvParams {
    fn default() -> Self {
        Self {
            base_beta: 0.3,
            gamma: 0.1,
            vaccine_efficacy: 0.8,
            temperature: 0.0,
            mobility: 1.0,
            reference_temperature: 10.0,
            temperature_sensitivity: 0.05,
        }
    }
}

impl SirvParams {
    pub fn validate(&self) -> Result<()> {
        check_finite("base beta", self.base_beta)?;
        check_num("base beta", self.base_beta, 0.0..)?;
        check_finite("gamma", self.gamma)?;
        check_num("gamma", self.gamma, 0.0..)?;
        check_prob("vaccine efficacy", self.vaccine_efficacy)?;
        check_finite("temperature", self.temperature)?;
        check_finite("mobility", self.mobility)?;
        check_num("mobility", self.mobility, 0.0..)?;
        check_finite("reference temperature", self.reference_temperature)?;
        check_finite("temperature sensitivity", self.temperature_sensitivity)?;
        Ok(())
    }

    pub fn effective_beta(&self) -> f64 {
        effective_beta(
            self.base_beta,
            self.temperature,
            self.mobility,
            self.reference_temperature,
            self.temperature_sensitivity,
        )
    }

    /// Basic reproduction number of a fully unvaccinated population.
    pub fn r0(&self) -> f64 {
        self.effective_beta() / self.gamma
    }
}

/// Population in each compartment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Compartments {
    pub su: f64,
    pub sv: f64,
    pub i: f64,
    pub r: f64,
}

impl Compartments {
    pub fn total(&self) -> f64 {
        self.su + self.sv + self.i + self.r
    }

    pub fn susceptible(&self) -> f64 {
        self.su + self.sv
    }

    /// Everyone ever infected (`i + r`).
    pub fn cumulative_infected(&self) -> f64 {
        self.i + self.r
    }

    fn to_array(self) -> [f64; 4] {
        [self.su, self.sv, self.i, self.r]
    }

    fn from_array([su, sv, i, r]: [f64; 4]) -> Self {
        Self { su, sv, i, r }
    }
}

/// Time derivative of `state` at time `t`.
///
/// The population is recomputed from `state` on every call. A zero
/// population is undefined and never produced by [`integrate`].
pub fn rate_of_change(_t: f64, state: &Compartments, params: &SirvParams) -> Compartments {
    let n = state.total();
    let lambda_u = params.effective_beta() * state.i / n;
    let lambda_v = lambda_u * (1.0 - params.vaccine_efficacy);

    let inf_u = lambda_u * state.su;
    let inf_v = lambda_v * state.sv;
    let rec = params.gamma * state.i;

    Compartments {
        su: -inf_u,
        sv: -inf_v,
        i: inf_u + inf_v - rec,
        r: rec,
    }
}

/// Initial population and vaccination coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Scenario {
    /// Total population.
    pub population: f64,
    /// Infected at day 0.
    pub initial_infected: f64,
    /// Fraction of the non-infected population vaccinated at day 0.
    pub vaccinated_frac: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            population: 1_000_000.0,
            initial_infected: 1000.0,
            vaccinated_frac: 0.3,
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        check_finite("population", self.population)?;
        if self.population <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "population must be positive, but is {:?}",
                self.population
            )));
        }
        check_finite("initial infected", self.initial_infected)?;
        check_num(
            "initial infected",
            self.initial_infected,
            0.0..=self.population,
        )?;
        check_prob("vaccinated fraction", self.vaccinated_frac)?;
        Ok(())
    }

    /// Split the population into compartments at day 0.
    pub fn initial_state(&self) -> Result<Compartments> {
        self.validate()?;
        let s0 = self.population - self.initial_infected;
        Ok(Compartments {
            su: s0 * (1.0 - self.vaccinated_frac),
            sv: s0 * self.vaccinated_frac,
            i: self.initial_infected,
            r: 0.0,
        })
    }
}

/// Compartments at one sampled time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub state: Compartments,
}

/// Samples in increasing time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Time and size of the largest sampled infected population.
    pub fn peak_infected(&self) -> Option<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.t, s.state.i))
            .fold(None, |best, (t, i)| match best {
                Some((_, i_best)) if i_best >= i => best,
                _ => Some((t, i)),
            })
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    fn from_raw(raw: Vec<(f64, [f64; 4])>) -> Self {
        let samples = raw
            .into_iter()
            .map(|(t, y)| Sample {
                t,
                state: Compartments::from_array(y),
            })
            .collect();
        Self { samples }
    }
}

/// One sample per whole day from 0 to `horizon_days` inclusive.
pub fn daily_sample_times(horizon_days: f64) -> Vec<f64> {
    if !horizon_days.is_finite() || horizon_days < 0.0 {
        return Vec::new();
    }
    let n_days = horizon_days.floor() as usize;
    (0..=n_days).map(|day| day as f64).collect()
}

/// Integrate the model from `initial` over `[0, horizon_days]`.
///
/// With `sample_times` unset the trajectory is sampled once per whole day.
/// Requested times must be sorted and inside the horizon.
pub fn integrate(
    initial: Compartments,
    params: &SirvParams,
    horizon_days: f64,
    sample_times: Option<&[f64]>,
) -> Result<Trajectory> {
    integrate_with(
        &DormandPrince::new(Tolerance::default()),
        initial,
        params,
        horizon_days,
        sample_times,
    )
}

/// Like [`integrate`], with an explicitly configured solver.
pub fn integrate_with(
    solver: &DormandPrince,
    initial: Compartments,
    params: &SirvParams,
    horizon_days: f64,
    sample_times: Option<&[f64]>,
) -> Result<Trajectory> {
    params.validate()?;
    check_initial(&initial)?;
    check_finite("horizon", horizon_days)?;
    check_num("horizon", horizon_days, 0.0..)?;

    let default_times;
    let sample_times = match sample_times {
        Some(times) => times,
        None => {
            default_times = daily_sample_times(horizon_days);
            &default_times
        }
    };
    check_sample_times(sample_times, horizon_days)?;

    let rhs = |t: f64, y: &[f64; 4]| {
        rate_of_change(t, &Compartments::from_array(*y), params).to_array()
    };

    match solver.solve(rhs, 0.0, initial.to_array(), horizon_days, sample_times) {
        Ok(raw) => Ok(Trajectory::from_raw(raw)),
        Err(err) => Err(Error::IntegrationFailure {
            t: err.t,
            reason: err.reason,
            partial: Trajectory::from_raw(err.samples),
        }),
    }
}

fn check_initial(initial: &Compartments) -> Result<()> {
    for (name, val) in [
        ("initial su", initial.su),
        ("initial sv", initial.sv),
        ("initial i", initial.i),
        ("initial r", initial.r),
    ] {
        check_finite(name, val)?;
        check_num(name, val, 0.0..)?;
    }
    if initial.total() <= 0.0 {
        return Err(Error::InvalidParameter(
            "initial population must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_sample_times(times: &[f64], horizon_days: f64) -> Result<()> {
    for &t in times {
        check_num("sample time", t, 0.0..=horizon_days)?;
    }
    if times.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::InvalidParameter(
            "sample times must be sorted".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survival_factor_is_linear_below_reference() {
        assert!((virus_survival_factor(0.0, 10.0, 0.05) - 1.5).abs() < 1e-12);
        assert!((virus_survival_factor(-10.0, 10.0, 0.05) - 2.0).abs() < 1e-12);
        assert_eq!(virus_survival_factor(10.0, 10.0, 0.05), 1.0);
        assert_eq!(virus_survival_factor(25.0, 10.0, 3.0), 1.0);
    }

    #[test]
    fn effective_beta_combines_factors() {
        let beta = effective_beta(0.3, 0.0, 2.0, 10.0, 0.05);
        assert!((beta - 0.9).abs() < 1e-12);
        assert!((SirvParams::default().effective_beta() - 0.45).abs() < 1e-12);
    }

    #[test]
    fn derivatives_sum_to_zero() {
        let params = SirvParams::default();
        let state = Compartments {
            su: 600.0,
            sv: 250.0,
            i: 100.0,
            r: 50.0,
        };
        let d = rate_of_change(3.0, &state, &params);
        assert!(d.total().abs() < 1e-9);
        assert!(d.su < 0.0 && d.sv < 0.0 && d.r > 0.0);
    }

    #[test]
    fn full_efficacy_protects_vaccinated() {
        let params = SirvParams {
            vaccine_efficacy: 1.0,
            ..SirvParams::default()
        };
        let state = Compartments {
            su: 500.0,
            sv: 400.0,
            i: 100.0,
            r: 0.0,
        };
        assert_eq!(rate_of_change(0.0, &state, &params).sv, 0.0);
    }

    #[test]
    fn initial_state_splits_by_vaccination() {
        let scenario = Scenario {
            population: 1000.0,
            initial_infected: 100.0,
            vaccinated_frac: 0.25,
        };
        let state = scenario.initial_state().unwrap();
        assert_eq!(state.su, 675.0);
        assert_eq!(state.sv, 225.0);
        assert_eq!(state.i, 100.0);
        assert_eq!(state.r, 0.0);
    }

    #[test]
    fn scenario_rejects_invalid_values() {
        let bad = [
            Scenario {
                population: -1.0,
                ..Scenario::default()
            },
            Scenario {
                population: f64::INFINITY,
                ..Scenario::default()
            },
            Scenario {
                initial_infected: f64::NAN,
                ..Scenario::default()
            },
            Scenario {
                vaccinated_frac: 1.2,
                ..Scenario::default()
            },
            Scenario {
                population: 10.0,
                initial_infected: 20.0,
                vaccinated_frac: 0.0,
            },
        ];
        for scenario in bad {
            assert!(matches!(
                scenario.initial_state(),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn daily_grid_is_inclusive() {
        assert_eq!(daily_sample_times(0.0), vec![0.0]);
        assert_eq!(daily_sample_times(3.0), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(daily_sample_times(2.5), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn epidemic_rises_then_falls() {
        let initial = Scenario::default().initial_state().unwrap();
        let traj = integrate(initial, &SirvParams::default(), 180.0, None).unwrap();
        assert_eq!(traj.len(), 181);
        let (t_peak, i_peak) = traj.peak_infected().unwrap();
        assert!(t_peak > 0.0 && t_peak < 180.0);
        assert!(i_peak > initial.i);
        let last = traj.final_sample().unwrap();
        assert!(last.state.i < i_peak);
        assert!(last.state.cumulative_infected() > initial.i);
    }

    #[test]
    fn custom_sample_times_are_honoured() {
        let initial = Scenario::default().initial_state().unwrap();
        let times = [0.0, 0.5, 12.25, 40.0];
        let traj = integrate(initial, &SirvParams::default(), 40.0, Some(&times)).unwrap();
        let got: Vec<f64> = traj.samples().iter().map(|s| s.t).collect();
        assert_eq!(got, times);
    }

    #[test]
    fn rejects_unsorted_or_out_of_horizon_times() {
        let initial = Scenario::default().initial_state().unwrap();
        let params = SirvParams::default();
        assert!(integrate(initial, &params, 10.0, Some(&[2.0, 1.0])).is_err());
        assert!(integrate(initial, &params, 10.0, Some(&[11.0])).is_err());
        assert!(integrate(initial, &params, -1.0, None).is_err());
    }

    #[test]
    fn tiny_step_budget_reports_partial_trajectory() {
        let solver = DormandPrince::new(Tolerance {
            max_steps: 2,
            ..Tolerance::default()
        });
        let initial = Scenario::default().initial_state().unwrap();
        let err = integrate_with(&solver, initial, &SirvParams::default(), 180.0, None)
            .unwrap_err();
        match err {
            Error::IntegrationFailure { t, partial, .. } => {
                assert!(t < 180.0);
                assert!(!partial.is_empty());
                assert!(partial.len() < 181);
                assert_eq!(partial.samples()[0].state, initial);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
