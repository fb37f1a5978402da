use nalgebra::{Matrix2, Vector2};
use ode_solvers::System;

use crate::error::{OncoError, Result};
use crate::simulator::interpolation::{Extrapolation, HermiteTable};
use crate::simulator::schedule::DosingSchedule;
use crate::simulator::solver::integrate_segment;
use crate::simulator::{SolverOptions, MIN_PK_SAMPLES, T, V};

/// Grid and dose times closer than this are merged into a single event
const MERGE_TOLERANCE: f64 = 1e-9;

/// Linear one- or two-compartment disposition model
///
/// States are drug amounts (mg): `A1` in the central compartment and, for the
/// two-compartment model, `A2` in the peripheral one. The concentration is
/// `A1 / V1`. Dosing is not part of the right-hand side: boluses are applied as
/// jumps of `A1` by [`solve_pk`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompartmentModel {
    cl: f64,
    q: f64,
    v1: f64,
    v2: f64,
}

impl CompartmentModel {
    pub fn new(cl: f64, q: f64, v1: f64, v2: f64) -> Result<Self> {
        let finite = [cl, q, v1, v2].iter().all(|x| x.is_finite());
        if !finite || v1 <= 0.0 || v2 < 0.0 || cl < 0.0 || q < 0.0 {
            return Err(OncoError::InvalidParameter(format!(
                "compartment parameters must satisfy v1 > 0 and cl, q, v2 >= 0 (cl={}, q={}, v1={}, v2={})",
                cl, q, v1, v2
            )));
        }
        Ok(CompartmentModel { cl, q, v1, v2 })
    }

    /// A zero inter-compartmental clearance or peripheral volume collapses the
    /// model to one compartment
    pub fn is_one_compartment(&self) -> bool {
        self.q == 0.0 || self.v2 == 0.0
    }

    pub fn n_states(&self) -> usize {
        if self.is_one_compartment() {
            1
        } else {
            2
        }
    }

    pub fn v1(&self) -> f64 {
        self.v1
    }

    /// `[cl, q, v1, v2]`
    pub fn parameters(&self) -> [f64; 4] {
        [self.cl, self.q, self.v1, self.v2]
    }

    fn rate_matrix(&self) -> Matrix2<f64> {
        let k10 = self.cl / self.v1;
        if self.is_one_compartment() {
            Matrix2::new(-k10, 0.0, 0.0, 0.0)
        } else {
            let k12 = self.q / self.v1;
            let k21 = self.q / self.v2;
            Matrix2::new(-(k10 + k12), k21, k12, -k21)
        }
    }

    fn lift(&self, state: &V) -> Vector2<f64> {
        let a2 = if state.len() > 1 { state[1] } else { 0.0 };
        Vector2::new(state[0], a2)
    }

    fn lower(&self, x: Vector2<f64>) -> V {
        if self.is_one_compartment() {
            V::from_vec(vec![x[0]])
        } else {
            V::from_vec(vec![x[0], x[1]])
        }
    }

    pub fn derivative(&self, state: &V) -> V {
        self.lower(self.rate_matrix() * self.lift(state))
    }

    pub fn concentration(&self, state: &V) -> f64 {
        state[0] / self.v1
    }

    pub fn concentration_slope(&self, state: &V) -> f64 {
        self.derivative(state)[0] / self.v1
    }

    /// State after `dt` days without any dosing, `exp(M dt) x`
    ///
    /// The rate matrix of a mammillary model has real non-positive eigenvalues,
    /// so the 2x2 exponential has a closed form.
    pub fn free_decay(&self, state: &V, dt: f64) -> V {
        let m = self.rate_matrix();
        let half_trace = 0.5 * m.trace();
        let disc = (half_trace * half_trace - m.determinant()).max(0.0);
        let root = disc.sqrt();
        let identity = Matrix2::identity();

        let exp_m = if root <= 1e-12 * half_trace.abs().max(1.0) {
            (identity + (m - identity * half_trace) * dt) * (half_trace * dt).exp()
        } else {
            let (l1, l2) = (half_trace + root, half_trace - root);
            ((m - identity * l2) * (l1 * dt).exp() - (m - identity * l1) * (l2 * dt).exp())
                / (l1 - l2)
        };
        self.lower(exp_m * self.lift(state))
    }
}

impl System<T, V> for CompartmentModel {
    fn system(&self, _t: T, y: &V, dy: &mut V) {
        let k10 = self.cl / self.v1;
        if self.is_one_compartment() {
            dy[0] = -k10 * y[0];
        } else {
            let k12 = self.q / self.v1;
            let k21 = self.q / self.v2;
            dy[0] = -(k10 + k12) * y[0] + k21 * y[1];
            dy[1] = k12 * y[0] - k21 * y[1];
        }
    }
}

/// Central-compartment concentration over `[0, horizon]`, queryable at any time
#[derive(Debug, Clone)]
pub struct PkProfile {
    model: CompartmentModel,
    table: HermiteTable,
    last_state: V,
    extrapolation: Extrapolation,
}

impl PkProfile {
    /// Concentration at `t` (mg/L)
    ///
    /// Zero before the first dose, right-continuous at dose times.
    pub fn concentration(&self, t: f64) -> f64 {
        if t < 0.0 || self.table.is_empty() {
            return 0.0;
        }
        let last = self.table.last_time();
        let c = if t <= last {
            self.table.eval(t)
        } else {
            match self.extrapolation {
                Extrapolation::Decay => {
                    let state = self.model.free_decay(&self.last_state, t - last);
                    self.model.concentration(&state)
                }
                Extrapolation::Flat => self.table.last_value(),
                Extrapolation::Linear => {
                    self.table.last_value() + self.table.last_slope() * (t - last)
                }
            }
        };
        c.max(0.0)
    }

    pub fn horizon(&self) -> f64 {
        self.table.last_time()
    }

    pub fn model(&self) -> &CompartmentModel {
        &self.model
    }

    /// Sample times of the underlying grid, dose times appearing twice
    pub fn sample_times(&self) -> &[f64] {
        self.table.times()
    }

    pub fn sample_concentrations(&self) -> &[f64] {
        self.table.values()
    }
}

/// Integrate the compartment model under `dosing` over `[0, horizon]`
///
/// The solver stops at every point of a uniform grid of `n_samples` points
/// (at least [`MIN_PK_SAMPLES`]) and at every dose time. At a dose time the
/// state before and after the bolus are both stored.
pub fn solve_pk(
    model: CompartmentModel,
    dosing: &DosingSchedule,
    horizon: f64,
    n_samples: usize,
    solver: SolverOptions,
    extrapolation: Extrapolation,
) -> Result<PkProfile> {
    if !(horizon > 0.0) || !horizon.is_finite() {
        return Err(OncoError::InvalidParameter(format!(
            "PK horizon must be positive, got {}",
            horizon
        )));
    }
    if !(dosing.dose >= 0.0) {
        return Err(OncoError::InvalidParameter(format!(
            "dose must be non-negative, got {}",
            dosing.dose
        )));
    }

    let n = n_samples.max(MIN_PK_SAMPLES);
    let grid: Vec<f64> = (0..n)
        .map(|i| horizon * i as f64 / (n - 1) as f64)
        .collect();
    let events = merge_events(&grid, &dosing.dose_times(horizon), dosing.dose);

    let mut times = Vec::with_capacity(events.len() + 64);
    let mut values = Vec::with_capacity(events.len() + 64);
    let mut slopes = Vec::with_capacity(events.len() + 64);
    let mut record = |t: f64, x: &V| {
        times.push(t);
        values.push(model.concentration(x));
        slopes.push(model.concentration_slope(x));
    };

    let mut x = V::zeros(model.n_states());
    let mut t_prev = 0.0;
    for (t, dose) in events {
        x = integrate_segment(model, x, t_prev, t, solver)?;
        if dose > 0.0 {
            record(t, &x);
            x[0] += dose;
        }
        record(t, &x);
        t_prev = t;
    }

    Ok(PkProfile {
        model,
        table: HermiteTable::new(times, values, slopes),
        last_state: x,
        extrapolation,
    })
}

/// Merge the sample grid with the dose times into `(time, bolus)` events
fn merge_events(grid: &[f64], dose_times: &[f64], dose: f64) -> Vec<(f64, f64)> {
    let mut events = Vec::with_capacity(grid.len() + dose_times.len());
    let (mut i, mut j) = (0, 0);
    loop {
        let event = match (grid.get(i), dose_times.get(j)) {
            (Some(&g), Some(&d)) if (g - d).abs() <= MERGE_TOLERANCE => {
                i += 1;
                j += 1;
                (d, dose)
            }
            (Some(&g), Some(&d)) if g < d => {
                i += 1;
                (g, 0.0)
            }
            (_, Some(&d)) => {
                j += 1;
                (d, dose)
            }
            (Some(&g), None) => {
                i += 1;
                (g, 0.0)
            }
            (None, None) => break,
        };
        events.push(event);
    }
    events
}
