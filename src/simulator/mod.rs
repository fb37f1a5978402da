pub mod cache;
pub mod effect;
pub mod interpolation;
pub mod pk;
pub mod pkpd;
pub mod resistance;
pub mod schedule;
pub mod solver;
pub mod tumor;

use serde::{Deserialize, Serialize};

use self::interpolation::Extrapolation;
use self::resistance::ResistanceOptions;

pub type T = f64;
pub type V = nalgebra::DVector<T>;

/// PK grids are never coarser than this many samples over the horizon
pub const MIN_PK_SAMPLES: usize = 2000;

/// Adaptive Runge-Kutta method used for every ODE in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    /// Dormand-Prince 5(4)
    #[default]
    Dopri5,
    /// Dormand-Prince 8(5,3)
    Dop853,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub integrator: Integrator,
    pub rtol: f64,
    pub atol: f64,
}

/// Numerical and modelling options shared by every simulation call
///
/// This is also the `[simulation]` section of the settings file, so every field
/// has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    /// Treatment horizon in days
    pub horizon: f64,
    /// Number of output samples of the tumor trajectory
    pub tumor_samples: usize,
    /// Number of PK grid points, clamped to [`MIN_PK_SAMPLES`]
    pub pk_samples: usize,
    pub integrator: Integrator,
    pub pk_rtol: f64,
    pub pk_atol: f64,
    pub tumor_rtol: f64,
    pub tumor_atol: f64,
    /// How concentrations are evaluated past the end of a PK grid
    pub extrapolation: Extrapolation,
    /// Memoize PK profiles across simulations
    pub cache: bool,
    /// Read from its own `[resistance]` section
    #[serde(skip)]
    pub resistance: ResistanceOptions,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            horizon: 365.0,
            tumor_samples: 600,
            pk_samples: MIN_PK_SAMPLES,
            integrator: Integrator::Dopri5,
            pk_rtol: 1e-8,
            pk_atol: 1e-10,
            tumor_rtol: 1e-6,
            tumor_atol: 1e-9,
            extrapolation: Extrapolation::Decay,
            cache: true,
            resistance: ResistanceOptions::default(),
        }
    }
}

impl SimulationOptions {
    pub fn pk_solver(&self) -> SolverOptions {
        SolverOptions {
            integrator: self.integrator,
            rtol: self.pk_rtol,
            atol: self.pk_atol,
        }
    }

    pub fn tumor_solver(&self) -> SolverOptions {
        SolverOptions {
            integrator: self.integrator,
            rtol: self.tumor_rtol,
            atol: self.tumor_atol,
        }
    }

    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_tumor_samples(mut self, samples: usize) -> Self {
        self.tumor_samples = samples;
        self
    }

    pub fn with_resistance(mut self, resistance: ResistanceOptions) -> Self {
        self.resistance = resistance;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }
}
