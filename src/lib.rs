//! Tumor-response simulation and dose/interval optimization for breast-cancer
//! chemotherapy regimens.
//!
//! Drug exposure follows a one- or two-compartment PK model, drug effect an
//! Emax model, and the tumor a logistic growth model with a necrotic core and
//! an optional drug-resistant subpopulation. The [`optimizer`] searches dose and
//! interval grids under cumulative toxicity ceilings for the schedule that
//! leaves the smallest tumor.
//!
//! Runs are usually driven by a settings file, see [`entrypoints::run`].

pub mod catalog;
pub mod entrypoints;
pub mod error;
pub mod optimizer;
pub mod patient;
pub mod regimen;
pub mod routines;
pub mod simulator;
pub mod toxicity;

pub use crate::entrypoints::{run, run_with};

/// A collection of commonly used items
pub mod prelude {
    pub use crate::catalog::{Catalog, DoseBasis, DoseGrid, DoseSpec, DrugPkPd, SubtypeParams};
    pub use crate::entrypoints::{run, run_with};
    pub use crate::error::{OncoError, Result};
    pub use crate::optimizer::{
        DoseChoice, Mode, Objective, OptimizationResult, Optimizer, OptimizerOptions,
        SearchOutcome, SearchStats,
    };
    pub use crate::patient::{recommend_regimen, volume_from_diameter, Patient};
    pub use crate::regimen::{
        compose, compose_regimen, DoseOverrides, DrugOverride, Phase, Regimen, RegimenEffect,
    };
    pub use crate::routines::settings::Settings;
    pub use crate::simulator::effect::{ConstantEffect, EffectSignal, NoEffect};
    pub use crate::simulator::pkpd::build_single_drug;
    pub use crate::simulator::resistance::ResistanceOptions;
    pub use crate::simulator::schedule::{Interval, Schedule};
    pub use crate::simulator::tumor::{simulate_patient, Trajectory};
    pub use crate::simulator::{Integrator, SimulationOptions};
    pub use crate::toxicity::ToxicityPolicy;
}
