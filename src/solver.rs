//! Adaptive Dormand-Prince 5(4) integrator with dense output.
//!
//! The solver chooses its own steps from the error estimate; requested sample
//! times are filled in by the fourth-order continuous extension between
//! accepted steps, never by forcing steps onto the sample grid.

use serde::{Deserialize, Serialize};

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Fifth-order solution minus embedded fourth-order solution.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Continuous extension.
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Error tolerance and step budget of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Relative tolerance.
    pub rel: f64,
    /// Absolute tolerance.
    pub abs: f64,
    /// Maximum number of attempted steps.
    pub max_steps: usize,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rel: 1e-6,
            abs: 1e-6,
            max_steps: 100_000,
        }
    }
}

/// Solver failure with the samples produced before it.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveError<const D: usize> {
    pub t: f64,
    pub reason: String,
    pub samples: Vec<(f64, [f64; D])>,
}

pub type Samples<const D: usize> = Vec<(f64, [f64; D])>;

#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrince {
    tol: Tolerance,
}

impl DormandPrince {
    pub fn new(tol: Tolerance) -> Self {
        Self { tol }
    }

    /// Integrate `dy/dt = f(t, y)` from `(t0, y0)` up to `t_end`.
    ///
    /// `sample_times` must be sorted and lie in `[t0, t_end]`; one sample is
    /// returned per requested time.
    pub fn solve<const D: usize, F>(
        &self,
        mut f: F,
        t0: f64,
        y0: [f64; D],
        t_end: f64,
        sample_times: &[f64],
    ) -> Result<Samples<D>, SolveError<D>>
    where
        F: FnMut(f64, &[f64; D]) -> [f64; D],
    {
        let mut samples = Vec::with_capacity(sample_times.len());
        let mut i_sample = 0;

        // Samples at the initial time are the initial state itself.
        while i_sample < sample_times.len() && sample_times[i_sample] <= t0 {
            samples.push((sample_times[i_sample], y0));
            i_sample += 1;
        }
        if t_end <= t0 || i_sample == sample_times.len() {
            return Ok(samples);
        }

        let mut t = t0;
        let mut y = y0;
        let mut k1 = f(t, &y);
        if !all_finite(&k1) {
            return Err(failure(t, "non-finite derivative", samples));
        }
        let mut h = self.initial_step(&mut f, t0, &y0, &k1, t_end - t0);

        let mut n_steps = 0;
        while t < t_end {
            if n_steps >= self.tol.max_steps {
                let reason = format!("step budget of {} exhausted", self.tol.max_steps);
                return Err(failure(t, &reason, samples));
            }
            n_steps += 1;

            let h_min = 16.0 * f64::EPSILON * t.abs().max(1.0);
            if h < h_min {
                return Err(failure(t, "step size underflow", samples));
            }
            let last = t + h >= t_end;
            if last {
                h = t_end - t;
            }

            let stages = self.stages(&mut f, t, &y, &k1, h);
            let Stages { k, y_new } = stages;
            let err = self.error_norm(&y, &y_new, &k, h);

            if !err.is_finite() || !all_finite(&y_new) {
                h *= MIN_FACTOR;
                continue;
            }

            if err > 1.0 {
                h *= (SAFETY * err.powf(-0.2)).max(MIN_FACTOR);
                continue;
            }

            let t_new = if last { t_end } else { t + h };
            let dense = DenseStep::new(t, h, &y, &y_new, &k);
            while i_sample < sample_times.len() && sample_times[i_sample] <= t_new {
                let ts = sample_times[i_sample];
                let ys = if ts == t_new { y_new } else { dense.eval(ts) };
                samples.push((ts, ys));
                i_sample += 1;
            }

            t = t_new;
            y = y_new;
            k1 = k[6];

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            h *= factor;

            if i_sample == sample_times.len() {
                break;
            }
        }

        Ok(samples)
    }

    fn stages<const D: usize, F>(
        &self,
        f: &mut F,
        t: f64,
        y: &[f64; D],
        k1: &[f64; D],
        h: f64,
    ) -> Stages<D>
    where
        F: FnMut(f64, &[f64; D]) -> [f64; D],
    {
        let k2 = f(t + C2 * h, &combine(y, h, &[(A21, k1)]));
        let k3 = f(t + C3 * h, &combine(y, h, &[(A31, k1), (A32, &k2)]));
        let k4 = f(
            t + C4 * h,
            &combine(y, h, &[(A41, k1), (A42, &k2), (A43, &k3)]),
        );
        let k5 = f(
            t + C5 * h,
            &combine(y, h, &[(A51, k1), (A52, &k2), (A53, &k3), (A54, &k4)]),
        );
        let k6 = f(
            t + h,
            &combine(
                y,
                h,
                &[(A61, k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
            ),
        );
        let y_new = combine(
            y,
            h,
            &[(A71, k1), (A73, &k3), (A74, &k4), (A75, &k5), (A76, &k6)],
        );
        let k7 = f(t + h, &y_new);

        Stages {
            k: [*k1, k2, k3, k4, k5, k6, k7],
            y_new,
        }
    }

    fn error_norm<const D: usize>(
        &self,
        y: &[f64; D],
        y_new: &[f64; D],
        k: &[[f64; D]; 7],
        h: f64,
    ) -> f64 {
        let mut sum = 0.0;
        for i in 0..D {
            let err = h
                * (E1 * k[0][i] + E3 * k[2][i] + E4 * k[3][i] + E5 * k[4][i] + E6 * k[5][i]
                    + E7 * k[6][i]);
            let scale = self.tol.abs + self.tol.rel * y[i].abs().max(y_new[i].abs());
            sum += (err / scale).powi(2);
        }
        (sum / D.max(1) as f64).sqrt()
    }

    fn initial_step<const D: usize, F>(
        &self,
        f: &mut F,
        t0: f64,
        y0: &[f64; D],
        f0: &[f64; D],
        span: f64,
    ) -> f64
    where
        F: FnMut(f64, &[f64; D]) -> [f64; D],
    {
        let scale: Vec<f64> = y0
            .iter()
            .map(|yi| self.tol.abs + self.tol.rel * yi.abs())
            .collect();
        let d0 = rms(y0.iter().zip(&scale).map(|(yi, si)| yi / si));
        let d1 = rms(f0.iter().zip(&scale).map(|(fi, si)| fi / si));
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6_f64.min(span)
        } else {
            (0.01 * d0 / d1).min(span)
        };

        let y1 = combine(y0, h0, &[(1.0, f0)]);
        let f1 = f(t0 + h0, &y1);
        let d2 = rms(
            f1.iter()
                .zip(f0)
                .zip(&scale)
                .map(|((a, b), si)| (a - b) / si),
        ) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(0.2)
        };
        let h = (100.0 * h0).min(h1).min(span);
        if h.is_finite() && h > 0.0 { h } else { span }
    }
}

struct Stages<const D: usize> {
    k: [[f64; D]; 7],
    y_new: [f64; D],
}

/// Interpolant over one accepted step `[t, t + h]`.
struct DenseStep<const D: usize> {
    t: f64,
    h: f64,
    r: [[f64; D]; 5],
}

impl<const D: usize> DenseStep<D> {
    fn new(t: f64, h: f64, y: &[f64; D], y_new: &[f64; D], k: &[[f64; D]; 7]) -> Self {
        let mut r = [[0.0; D]; 5];
        for i in 0..D {
            let y_diff = y_new[i] - y[i];
            let bspl = h * k[0][i] - y_diff;
            r[0][i] = y[i];
            r[1][i] = y_diff;
            r[2][i] = bspl;
            r[3][i] = y_diff - h * k[6][i] - bspl;
            r[4][i] = h
                * (D1 * k[0][i] + D3 * k[2][i] + D4 * k[3][i] + D5 * k[4][i] + D6 * k[5][i]
                    + D7 * k[6][i]);
        }
        Self { t, h, r }
    }

    fn eval(&self, t: f64) -> [f64; D] {
        let theta = (t - self.t) / self.h;
        let theta1 = 1.0 - theta;
        let mut out = [0.0; D];
        for (i, o) in out.iter_mut().enumerate() {
            let r = |j: usize| self.r[j][i];
            *o = r(0) + theta * (r(1) + theta1 * (r(2) + theta * (r(3) + theta1 * r(4))));
        }
        out
    }
}

fn combine<const D: usize>(y: &[f64; D], h: f64, terms: &[(f64, &[f64; D])]) -> [f64; D] {
    let mut out = *y;
    for (i, o) in out.iter_mut().enumerate() {
        let incr: f64 = terms.iter().map(|(a, k)| a * k[i]).sum();
        *o += h * incr;
    }
    out
}

fn rms(vals: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = vals.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

fn all_finite(vals: &[f64]) -> bool {
    vals.iter().all(|v| v.is_finite())
}

fn failure<const D: usize>(t: f64, reason: &str, samples: Samples<D>) -> SolveError<D> {
    SolveError {
        t,
        reason: reason.to_string(),
        samples,
    }
}
