//! Inputs and outputs of the dose/interval search

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::DoseBasis;
use crate::regimen::{DoseOverrides, RegimenEffect};
use crate::simulator::schedule::{Interval, Schedule};
use crate::simulator::tumor::Trajectory;

/// Which search to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Grid search over one drug's doses and intervals
    SingleDrug,
    /// Grid search over every drug of a single-phase regimen
    #[default]
    SingleRegimen,
    /// [`Mode::SingleRegimen`] over the regimens recommended for the subtype
    AutoBest,
    /// Multipliers on the default doses of any regimen
    DoseScaling,
}

/// Quantity minimized by the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Tumor volume at the end of the horizon
    #[default]
    FinalVolume,
    /// Smallest tumor volume reached
    Nadir,
}

impl Objective {
    pub fn score(&self, trajectory: &Trajectory) -> f64 {
        match self {
            Objective::FinalVolume => trajectory.final_volume(),
            Objective::Nadir => trajectory.nadir(),
        }
    }
}

pub const DEFAULT_DOSE_SCALES: [f64; 5] = [0.7, 0.85, 1.0, 1.15, 1.3];

/// Search options
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOptions {
    pub objective: Objective,
    /// Restrict [`Mode::SingleDrug`] to this interval. Regimen searches always
    /// use each drug's full interval grid.
    pub fixed_interval: Option<Interval>,
    /// Dose multipliers for [`Mode::DoseScaling`]
    pub dose_scales: Vec<f64>,
    /// Evaluate candidates on the rayon thread pool
    pub parallel: bool,
    /// Candidates not started within this budget are skipped
    pub time_budget: Option<Duration>,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions {
            objective: Objective::FinalVolume,
            fixed_interval: None,
            dose_scales: DEFAULT_DOSE_SCALES.to_vec(),
            parallel: false,
            time_budget: None,
        }
    }
}

impl OptimizerOptions {
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_fixed_interval(mut self, interval: Interval) -> Self {
        self.fixed_interval = Some(interval);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Dose and schedule chosen for one drug
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseChoice {
    pub drug: String,
    pub basis: DoseBasis,
    /// In the unit of `basis`
    pub nominal: f64,
    /// mg
    pub absolute: f64,
    pub schedule: Schedule,
    /// Administrations counted against the toxicity ceiling
    pub cycles: usize,
}

impl DoseChoice {
    pub fn unit(&self) -> &'static str {
        self.basis.unit()
    }
}

/// Counters of one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Candidates simulated
    pub evaluated: usize,
    /// Choices rejected by the toxicity check
    pub pruned: usize,
    /// The time budget ran out before every candidate was simulated
    pub truncated: bool,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.evaluated += other.evaluated;
        self.pruned += other.pruned;
        self.truncated |= other.truncated;
    }
}

/// A recommended regimen that `auto_best` could not use
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRegimen {
    pub regimen: String,
    pub reason: String,
}

/// Best candidate of a search
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub mode: Mode,
    pub objective: Objective,
    /// Drug name in [`Mode::SingleDrug`], regimen name otherwise
    pub target: String,
    pub choices: Vec<DoseChoice>,
    pub score: f64,
    /// Simulated time span of the winning candidate
    pub horizon: f64,
    pub trajectory: Trajectory,
    pub stats: SearchStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRegimen>,
    /// Effect signal of the winning candidate, kept for PK/PD export
    #[serde(skip)]
    pub effect: RegimenEffect,
}

impl OptimizationResult {
    /// The chosen doses as overrides for [`crate::regimen::compose`]
    pub fn overrides(&self) -> DoseOverrides {
        super::overrides_of(&self.choices)
    }

    pub fn choice(&self, drug: &str) -> Option<&DoseChoice> {
        self.choices.iter().find(|c| c.drug == drug)
    }
}

/// What a search produced
///
/// Finding nothing admissible is a normal outcome, not an error.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(Box<OptimizationResult>),
    NoAdmissibleCombination(SearchStats),
}

impl SearchOutcome {
    pub fn found(&self) -> Option<&OptimizationResult> {
        match self {
            SearchOutcome::Found(result) => Some(result),
            SearchOutcome::NoAdmissibleCombination(_) => None,
        }
    }

    pub fn into_found(self) -> Option<OptimizationResult> {
        match self {
            SearchOutcome::Found(result) => Some(*result),
            SearchOutcome::NoAdmissibleCombination(_) => None,
        }
    }

    pub fn stats(&self) -> SearchStats {
        match self {
            SearchOutcome::Found(result) => result.stats,
            SearchOutcome::NoAdmissibleCombination(stats) => *stats,
        }
    }
}
