use ode_solvers::System;
use serde::Serialize;

use crate::catalog::{Catalog, SubtypeParams};
use crate::error::{OncoError, Result};
use crate::patient::Patient;
use crate::simulator::effect::EffectSignal;
use crate::simulator::resistance::{self, ResistanceParams};
use crate::simulator::solver::integrate_segment;
use crate::simulator::{SimulationOptions, SolverOptions, T, V};

/// Share of the initial viable mass that starts out resistant
pub const INITIAL_RESISTANT_FRACTION: f64 = 0.05;

/// Intrinsic proliferation rate (1/day) from a Ki-67 percentage and the
/// cell-cycle time in days
pub fn growth_rate(ki67_percent: f64, t_cycle: f64) -> f64 {
    std::f64::consts::LN_2 / t_cycle * (ki67_percent / 100.0)
}

/// Kinetic constants of one simulated tumor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TumorParams {
    /// Proliferation rate (1/day)
    pub r: f64,
    /// Carrying capacity
    pub k: f64,
    /// Natural death rate (1/day)
    pub d: f64,
    /// Necrotic clearance rate (1/day)
    pub k_clear: f64,
}

impl TumorParams {
    pub fn new(subtype: &SubtypeParams, ki67_percent: f64) -> Self {
        TumorParams {
            r: growth_rate(ki67_percent, subtype.t_cycle),
            k: subtype.k,
            d: subtype.d,
            k_clear: subtype.k_clear,
        }
    }
}

/// Right-hand side of the model without resistance, state `[U, N]`
pub fn rhs_no_resistance(p: &TumorParams, effect: f64, u: f64, n: f64) -> [f64; 2] {
    let kill = (p.d + effect) * u;
    let growth = p.r * u * (1.0 - (u + n) / p.k);
    [growth - kill, kill - p.k_clear * n]
}

/// Right-hand side of the model with a resistant subpopulation, state `[Ns, Nr, N]`
///
/// Both viable populations compete for the same capacity. Resistant cells feel
/// only `resistance_strength` of the drug effect.
pub fn rhs_resistance(
    p: &TumorParams,
    res: &ResistanceParams,
    effect: f64,
    ns: f64,
    nr: f64,
    n: f64,
) -> [f64; 3] {
    let crowding = 1.0 - (ns + nr + n) / p.k;
    let death_s = (p.d + effect) * ns;
    let death_r = (p.d + effect * res.resistance_strength) * nr;
    let mutation = res.mutation_rate * ns;
    [
        p.r * ns * crowding - death_s - mutation,
        p.r * nr * crowding - death_r + mutation,
        death_s + death_r - p.k_clear * n,
    ]
}

struct TumorSystem<'a, E: ?Sized> {
    params: TumorParams,
    resistance: Option<ResistanceParams>,
    effect: &'a E,
}

impl<'a, E: EffectSignal + ?Sized> System<T, V> for TumorSystem<'a, E> {
    fn system(&self, t: T, y: &V, dy: &mut V) {
        let e = self.effect.effect(t);
        match &self.resistance {
            None => {
                let [du, dn] = rhs_no_resistance(&self.params, e, y[0], y[1]);
                dy[0] = du;
                dy[1] = dn;
            }
            Some(res) => {
                let [dns, dnr, dn] = rhs_resistance(&self.params, res, e, y[0], y[1], y[2]);
                dy[0] = dns;
                dy[1] = dnr;
                dy[2] = dn;
            }
        }
    }
}

/// Sub-population series of a [`Trajectory`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Components {
    NoResistance {
        viable: Vec<f64>,
        necrotic: Vec<f64>,
    },
    Resistance {
        sensitive: Vec<f64>,
        resistant: Vec<f64>,
        necrotic: Vec<f64>,
    },
}

impl Components {
    /// Column names and series, in state order
    pub fn columns(&self) -> Vec<(&'static str, &[f64])> {
        match self {
            Components::NoResistance { viable, necrotic } => {
                vec![("viable", viable.as_slice()), ("necrotic", necrotic.as_slice())]
            }
            Components::Resistance {
                sensitive,
                resistant,
                necrotic,
            } => vec![
                ("sensitive", sensitive.as_slice()),
                ("resistant", resistant.as_slice()),
                ("necrotic", necrotic.as_slice()),
            ],
        }
    }
}

/// Sampled tumor trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub volume: Vec<f64>,
    pub components: Components,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn initial_volume(&self) -> f64 {
        self.volume.first().copied().unwrap_or(f64::NAN)
    }

    pub fn final_volume(&self) -> f64 {
        self.volume.last().copied().unwrap_or(f64::NAN)
    }

    pub fn nadir(&self) -> f64 {
        self.volume.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn uses_resistance(&self) -> bool {
        matches!(self.components, Components::Resistance { .. })
    }
}

/// Integrate the tumor model from `v0` over `[0, horizon]`, sampled on
/// `n_samples` evenly spaced points
///
/// `f_n0` of the initial volume is necrotic. With resistance, the viable rest
/// is split between sensitive and resistant cells.
#[allow(clippy::too_many_arguments)]
pub fn integrate_tumor<E: EffectSignal + ?Sized>(
    params: &TumorParams,
    resistance: Option<ResistanceParams>,
    v0: f64,
    f_n0: f64,
    effect: &E,
    horizon: f64,
    n_samples: usize,
    solver: SolverOptions,
) -> Result<Trajectory> {
    if !(v0 > 0.0) {
        return Err(OncoError::InvalidParameter(format!(
            "initial tumor volume must be positive, got {}",
            v0
        )));
    }
    if !(horizon > 0.0) || n_samples < 2 {
        return Err(OncoError::InvalidParameter(format!(
            "need a positive horizon and at least two samples (horizon={}, samples={})",
            horizon, n_samples
        )));
    }

    let necrotic = f_n0 * v0;
    let viable = (1.0 - f_n0) * v0;
    let mut x = match resistance {
        None => V::from_vec(vec![viable, necrotic]),
        Some(_) => V::from_vec(vec![
            viable * (1.0 - INITIAL_RESISTANT_FRACTION),
            viable * INITIAL_RESISTANT_FRACTION,
            necrotic,
        ]),
    };

    let time: Vec<f64> = (0..n_samples)
        .map(|i| horizon * i as f64 / (n_samples - 1) as f64)
        .collect();
    let mut states: Vec<V> = Vec::with_capacity(n_samples);
    states.push(x.clone());

    for window in time.windows(2) {
        let system = TumorSystem {
            params: *params,
            resistance,
            effect,
        };
        x = integrate_segment(system, x, window[0], window[1], solver)?;
        states.push(x.clone());
    }

    let column = |i: usize| -> Vec<f64> { states.iter().map(|s| s[i]).collect() };
    let volume = states.iter().map(|s| s.sum()).collect();
    let components = match resistance {
        None => Components::NoResistance {
            viable: column(0),
            necrotic: column(1),
        },
        Some(_) => Components::Resistance {
            sensitive: column(0),
            resistant: column(1),
            necrotic: column(2),
        },
    };

    Ok(Trajectory {
        time,
        volume,
        components,
    })
}

/// Simulate `patient` under `effect` over `[0, horizon]`
///
/// Subtype parameters are taken from the catalog and adjusted for stage and
/// tumor size on a private copy. Whether a resistant subpopulation is tracked
/// follows [`resistance::resolve`].
pub fn simulate_patient<E: EffectSignal + ?Sized>(
    catalog: &Catalog,
    patient: &Patient,
    effect: &E,
    horizon: f64,
    options: &SimulationOptions,
) -> Result<Trajectory> {
    patient.validate()?;
    let base = catalog.subtype(&patient.subtype)?;
    let adjusted = patient.effective_params(base);
    let params = TumorParams::new(&adjusted, patient.ki67);
    let resistance = resistance::resolve(&options.resistance, patient.response.as_deref())?;

    integrate_tumor(
        &params,
        resistance,
        patient.volume,
        adjusted.f_n0,
        effect,
        horizon,
        options.tumor_samples,
        options.tumor_solver(),
    )
}
