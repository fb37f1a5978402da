//! Dose/interval optimization
//!
//! Every mode enumerates candidate dose assignments, drops those that break a
//! cumulative toxicity ceiling, simulates the rest and keeps the one with the
//! lowest [`Objective`] score. Ties go to the candidate enumerated first.
//!
//! # Modes
//!
//! - [`Optimizer::single_drug`]: one drug, every interval and dose of its grid.
//!   Each interval is simulated over the whole cycles it allows.
//! - [`Optimizer::single_regimen`]: every combination of per-drug grid choices
//!   of a single-phase regimen, simulated over the configured horizon.
//! - [`Optimizer::auto_best`]: `single_regimen` over the single-phase regimens
//!   recommended for the patient's subtype.
//! - [`Optimizer::dose_scaling`]: multipliers on the default doses of any
//!   regimen, phased ones included.
//!
//! # Example
//!
//! ```rust,no_run
//! use oncodose::prelude::*;
//!
//! let catalog = Catalog::builtin();
//! let patient = Patient::from_diameter("TNBC", 45.0, 4.0);
//! let simulation = SimulationOptions::default().with_horizon(84.0);
//! let optimizer = Optimizer::new(&catalog, simulation, OptimizerOptions::default());
//!
//! if let SearchOutcome::Found(result) = optimizer.single_regimen(&patient, "AC")? {
//!     for choice in &result.choices {
//!         println!("{}: {} {} {}", choice.drug, choice.nominal, choice.unit(), choice.schedule);
//!     }
//! }
//! # Ok::<(), oncodose::error::OncoError>(())
//! ```

mod search;
pub mod types;

use std::time::Instant;

use crate::catalog::Catalog;
use crate::error::{OncoError, Result};
use crate::patient::{recommend_regimen, Patient};
use crate::regimen::{compose, DoseOverrides, DrugOverride, Regimen, RegimenEffect, ShiftedEffect};
use crate::simulator::pkpd::build_single_drug;
use crate::simulator::schedule::{Interval, Schedule};
use crate::simulator::tumor::{simulate_patient, Trajectory};
use crate::simulator::SimulationOptions;
use crate::toxicity::ToxicityPolicy;

use self::search::{enumerate, evaluate, Evaluation};
pub use self::types::*;

/// Grid and scaling searches over a catalog
#[derive(Debug, Clone)]
pub struct Optimizer<'a> {
    catalog: &'a Catalog,
    simulation: SimulationOptions,
    options: OptimizerOptions,
}

/// A single-drug candidate simulated over its own treatment span
struct Timed {
    choice: DoseChoice,
    horizon: f64,
}

impl<'a> Optimizer<'a> {
    pub fn new(catalog: &'a Catalog, simulation: SimulationOptions, options: OptimizerOptions) -> Self {
        Optimizer {
            catalog,
            simulation,
            options,
        }
    }

    pub fn simulation(&self) -> &SimulationOptions {
        &self.simulation
    }

    pub fn options(&self) -> &OptimizerOptions {
        &self.options
    }

    fn policy(&self) -> ToxicityPolicy<'a> {
        ToxicityPolicy::new(self.catalog)
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.time_budget.map(|budget| Instant::now() + budget)
    }

    /// Grid choices for `drug`, interval by interval, doses ascending within
    /// each interval. `fixed_interval` replaces the grid's intervals.
    fn grid_choices(
        &self,
        drug: &str,
        horizon: f64,
        bsa: f64,
        fixed_interval: Option<Interval>,
    ) -> Result<Vec<DoseChoice>> {
        let grid = self.catalog.grid(drug)?;
        let intervals = match fixed_interval {
            Some(interval) => vec![interval],
            None => grid.intervals.clone(),
        };
        let policy = self.policy();
        let mut choices = Vec::with_capacity(intervals.len() * grid.doses.len());
        for interval in intervals {
            let schedule = Schedule::Periodic(interval);
            let cycles = policy.cycles(drug, schedule, horizon);
            for &nominal in &grid.doses {
                choices.push(DoseChoice {
                    drug: drug.to_string(),
                    basis: grid.basis,
                    nominal,
                    absolute: grid.basis.absolute(nominal, bsa),
                    schedule,
                    cycles,
                });
            }
        }
        Ok(choices)
    }

    fn simulate(&self, patient: &Patient, effect: RegimenEffect, horizon: f64) -> Result<(RegimenEffect, Trajectory)> {
        let trajectory = simulate_patient(self.catalog, patient, &effect, horizon, &self.simulation)?;
        Ok((effect, trajectory))
    }

    fn outcome(
        &self,
        mode: Mode,
        target: &str,
        evaluation: Evaluation,
        pruned: usize,
        choices_of: impl Fn(usize) -> (Vec<DoseChoice>, f64),
    ) -> SearchOutcome {
        let stats = SearchStats {
            evaluated: evaluation.evaluated,
            pruned,
            truncated: evaluation.truncated,
        };
        if stats.truncated {
            tracing::warn!(
                "Time budget exhausted for {}, returning the best of {} candidates",
                target,
                stats.evaluated
            );
        }
        match evaluation.best {
            None => {
                tracing::info!("No admissible combination for {} ({} pruned)", target, pruned);
                SearchOutcome::NoAdmissibleCombination(stats)
            }
            Some(best) => {
                let (choices, horizon) = choices_of(best.index);
                SearchOutcome::Found(Box::new(OptimizationResult {
                    mode,
                    objective: self.options.objective,
                    target: target.to_string(),
                    choices,
                    score: best.score,
                    horizon,
                    trajectory: best.trajectory,
                    stats,
                    skipped: Vec::new(),
                    effect: best.effect,
                }))
            }
        }
    }

    /// Best dose and interval for `drug` given alone
    ///
    /// For each interval the drug is given for as many whole cycles as fit in
    /// the configured horizon, capped by its protocol maximum, and the tumor is
    /// simulated over exactly those cycles. Intervals that allow no cycle are
    /// skipped.
    pub fn single_drug(&self, patient: &Patient, drug: &str) -> Result<SearchOutcome> {
        patient.validate()?;
        self.catalog.subtype(&patient.subtype)?;
        self.catalog.drug(drug)?;
        let horizon = self.simulation.horizon;
        let policy = self.policy();

        let mut candidates = Vec::new();
        let mut pruned = 0;
        for choice in self.grid_choices(drug, horizon, patient.bsa, self.options.fixed_interval)? {
            let period = match choice.schedule.period_days() {
                Some(period) => period,
                None => continue,
            };
            if choice.cycles == 0 {
                continue;
            }
            let local = choice.cycles as f64 * period;
            if !policy.check(drug, choice.absolute, choice.schedule, local, patient.bsa) {
                pruned += 1;
                continue;
            }
            candidates.push(Timed {
                choice,
                horizon: local,
            });
        }
        tracing::info!(
            "Single-drug search for {}: {} candidates, {} pruned",
            drug,
            candidates.len(),
            pruned
        );

        let evaluation = evaluate(
            &candidates,
            self.options.parallel,
            self.deadline(),
            |candidate| {
                let local = build_single_drug(
                    self.catalog,
                    drug,
                    candidate.horizon,
                    patient.bsa,
                    Some(candidate.choice.absolute),
                    Some(candidate.choice.schedule),
                    &self.simulation,
                )?;
                let effect = RegimenEffect {
                    components: vec![ShiftedEffect { local, shift: 0.0 }],
                };
                self.simulate(patient, effect, candidate.horizon)
            },
            |t| self.options.objective.score(t),
        )?;

        Ok(self.outcome(Mode::SingleDrug, drug, evaluation, pruned, |i| {
            (vec![candidates[i].choice.clone()], candidates[i].horizon)
        }))
    }

    /// Best grid choice for every drug of a single-phase regimen
    pub fn single_regimen(&self, patient: &Patient, regimen: &str) -> Result<SearchOutcome> {
        self.single_regimen_until(patient, regimen, self.deadline())
    }

    fn single_regimen_until(
        &self,
        patient: &Patient,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<SearchOutcome> {
        patient.validate()?;
        self.catalog.subtype(&patient.subtype)?;
        let entry = self.catalog.regimen(name)?;
        let drugs = match &entry.regimen {
            Regimen::Single { drugs } => drugs,
            Regimen::Phased { .. } => return Err(OncoError::UnsupportedRegimenType(name.to_string())),
        };
        let horizon = self.simulation.horizon;
        let policy = self.policy();

        let options = drugs
            .iter()
            .map(|drug| self.grid_choices(drug, horizon, patient.bsa, None))
            .collect::<Result<Vec<_>>>()?;
        let (combinations, pruned) = enumerate(&options, |_, choice| {
            policy.check(&choice.drug, choice.absolute, choice.schedule, horizon, patient.bsa)
        });
        tracing::info!(
            "Regimen search for {}: {} combinations, {} choices pruned",
            name,
            combinations.len(),
            pruned
        );

        let evaluation = evaluate(
            &combinations,
            self.options.parallel,
            deadline,
            |choices| {
                let overrides = overrides_of(choices);
                let effect = compose(
                    self.catalog,
                    &entry.regimen,
                    horizon,
                    patient.bsa,
                    &overrides,
                    &self.simulation,
                )?;
                self.simulate(patient, effect, horizon)
            },
            |t| self.options.objective.score(t),
        )?;

        Ok(self.outcome(Mode::SingleRegimen, name, evaluation, pruned, |i| {
            (combinations[i].clone(), horizon)
        }))
    }

    /// Best single-phase regimen recommended for the patient's subtype
    ///
    /// Regimens that fail are logged and reported in
    /// [`OptimizationResult::skipped`]. Equal scores keep the regimen
    /// recommended first.
    pub fn auto_best(&self, patient: &Patient) -> Result<SearchOutcome> {
        patient.validate()?;
        let deadline = self.deadline();
        let recommended = self.catalog.recommended(&patient.subtype)?;

        let mut best: Option<OptimizationResult> = None;
        let mut skipped = Vec::new();
        let mut stats = SearchStats::default();

        for recommendation in recommended {
            let name = recommendation.name.as_str();
            match self.catalog.regimen(name) {
                Ok(entry) if entry.regimen.is_phased() => {
                    tracing::debug!("Skipping phased regimen {}", name);
                    continue;
                }
                _ => {}
            }
            match self.single_regimen_until(patient, name, deadline) {
                Ok(SearchOutcome::Found(result)) => {
                    stats.merge(&result.stats);
                    tracing::info!("{}: score {:.4}", name, result.score);
                    let replace = match &best {
                        Some(current) => result.score < current.score,
                        None => true,
                    };
                    if replace {
                        best = Some(*result);
                    }
                }
                Ok(SearchOutcome::NoAdmissibleCombination(regimen_stats)) => {
                    stats.merge(&regimen_stats);
                    skipped.push(SkippedRegimen {
                        regimen: name.to_string(),
                        reason: "no admissible combination".to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping regimen {}: {}", name, e);
                    skipped.push(SkippedRegimen {
                        regimen: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(match best {
            Some(mut result) => {
                result.mode = Mode::AutoBest;
                result.stats = stats;
                result.skipped = skipped;
                SearchOutcome::Found(Box::new(result))
            }
            None => SearchOutcome::NoAdmissibleCombination(stats),
        })
    }

    /// Best combination of multipliers on the default doses of `regimen`
    ///
    /// Works for phased regimens too. Schedules stay at their catalog defaults
    /// and each drug is checked against its ceiling over the time it is
    /// actually given.
    pub fn dose_scaling(&self, patient: &Patient, name: &str) -> Result<SearchOutcome> {
        patient.validate()?;
        self.catalog.subtype(&patient.subtype)?;
        let entry = self.catalog.regimen(name)?;
        let regimen = &entry.regimen;
        let length = regimen.length(self.simulation.horizon);
        let policy = self.policy();

        let mut options = Vec::new();
        let mut active = Vec::new();
        for drug in regimen.drugs() {
            let params = self.catalog.drug(drug)?;
            let spec = params
                .dose
                .ok_or_else(|| OncoError::MissingDoseSpecification(drug.to_string()))?;
            let active_time = regimen.active_time(drug, length);
            let cycles = policy.cycles(drug, params.schedule, active_time);
            let choices: Vec<DoseChoice> = self
                .options
                .dose_scales
                .iter()
                .map(|&scale| {
                    let scaled = spec.scaled(scale);
                    DoseChoice {
                        drug: drug.to_string(),
                        basis: scaled.basis(),
                        nominal: scaled.nominal(),
                        absolute: scaled.absolute(patient.bsa),
                        schedule: params.schedule,
                        cycles,
                    }
                })
                .collect();
            options.push(choices);
            active.push(active_time);
        }

        let (combinations, pruned) = enumerate(&options, |slot, choice| {
            policy.check(&choice.drug, choice.absolute, choice.schedule, active[slot], patient.bsa)
        });
        tracing::info!(
            "Dose scaling for {}: {} combinations over {} days, {} choices pruned",
            name,
            combinations.len(),
            length,
            pruned
        );

        let evaluation = evaluate(
            &combinations,
            self.options.parallel,
            self.deadline(),
            |choices| {
                let effect = compose(
                    self.catalog,
                    regimen,
                    length,
                    patient.bsa,
                    &overrides_of(choices),
                    &self.simulation,
                )?;
                self.simulate(patient, effect, length)
            },
            |t| self.options.objective.score(t),
        )?;

        Ok(self.outcome(Mode::DoseScaling, name, evaluation, pruned, |i| {
            (combinations[i].clone(), length)
        }))
    }

    /// Dispatch on `mode`
    ///
    /// `target` is the drug for [`Mode::SingleDrug`] and the regimen for the
    /// regimen modes. Without a regimen the patient's rule-of-thumb regimen is
    /// used.
    pub fn run(&self, patient: &Patient, mode: Mode, target: Option<&str>) -> Result<SearchOutcome> {
        let regimen = || -> Result<String> {
            match target {
                Some(name) => Ok(name.to_string()),
                None => recommend_regimen(patient).map(str::to_string).ok_or_else(|| {
                    OncoError::UnknownSubtype(patient.subtype.clone())
                }),
            }
        };
        match mode {
            Mode::SingleDrug => {
                let drug = target.ok_or_else(|| {
                    OncoError::InvalidParameter("single-drug mode needs a drug".to_string())
                })?;
                self.single_drug(patient, drug)
            }
            Mode::SingleRegimen => self.single_regimen(patient, &regimen()?),
            Mode::AutoBest => self.auto_best(patient),
            Mode::DoseScaling => self.dose_scaling(patient, &regimen()?),
        }
    }
}

pub(crate) fn overrides_of(choices: &[DoseChoice]) -> DoseOverrides {
    choices
        .iter()
        .map(|c| {
            (
                c.drug.clone(),
                DrugOverride {
                    dose: Some(c.absolute),
                    schedule: Some(c.schedule),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tnbc() -> Patient {
        Patient::from_diameter("TNBC", 45.0, 4.0)
    }

    fn optimizer(catalog: &Catalog, horizon: f64) -> Optimizer<'_> {
        Optimizer::new(
            catalog,
            SimulationOptions::default()
                .with_horizon(horizon)
                .with_tumor_samples(120),
            OptimizerOptions::default(),
        )
    }

    #[test]
    fn phased_regimens_are_rejected_by_grid_search() {
        let catalog = Catalog::builtin();
        let err = optimizer(&catalog, 84.0)
            .single_regimen(&tnbc(), "AC_T")
            .unwrap_err();
        assert_eq!(err, OncoError::UnsupportedRegimenType("AC_T".into()));
    }

    #[test]
    fn drugs_without_grid_are_reported() {
        let catalog = Catalog::builtin();
        let err = optimizer(&catalog, 84.0)
            .single_regimen(&tnbc(), "TOR")
            .unwrap_err();
        assert_eq!(err, OncoError::MissingGridDefinition("toremifene".into()));
    }

    #[test]
    fn single_drug_uses_whole_cycles() {
        let catalog = Catalog::builtin();
        let outcome = optimizer(&catalog, 100.0)
            .single_drug(&tnbc(), "docetaxel")
            .unwrap();
        let result = outcome.found().unwrap();
        // Four whole q3w cycles fit in 100 days
        assert_eq!(result.horizon, 84.0);
        assert_eq!(result.choices[0].cycles, 4);
        assert_eq!(result.trajectory.time.last().copied(), Some(84.0));
        assert!(catalog.grid("docetaxel").unwrap().doses.contains(&result.choices[0].nominal));
        assert_eq!(result.stats.evaluated, 5);
    }

    #[test]
    fn short_horizons_admit_nothing() {
        let catalog = Catalog::builtin();
        let outcome = optimizer(&catalog, 10.0)
            .single_drug(&tnbc(), "docetaxel")
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::NoAdmissibleCombination(_)));
    }

    #[test]
    fn ceilings_prune_before_simulation() {
        let mut catalog = Catalog::builtin();
        catalog.set_toxicity_limit("docetaxel", 100.0);
        let outcome = optimizer(&catalog, 84.0)
            .single_drug(&tnbc(), "docetaxel")
            .unwrap();
        match outcome {
            SearchOutcome::NoAdmissibleCombination(stats) => {
                assert_eq!(stats.evaluated, 0);
                assert_eq!(stats.pruned, 5);
            }
            SearchOutcome::Found(_) => panic!("every docetaxel dose breaks the ceiling"),
        }
    }

    #[test]
    fn fixed_interval_restricts_the_grid() {
        let catalog = Catalog::builtin();
        let optimizer = Optimizer::new(
            &catalog,
            SimulationOptions::default()
                .with_horizon(42.0)
                .with_tumor_samples(60),
            OptimizerOptions::default().with_fixed_interval(Interval::Q2w),
        );
        let result = optimizer
            .single_drug(&tnbc(), "paclitaxel")
            .unwrap()
            .into_found()
            .unwrap();
        assert_eq!(result.choices[0].schedule, Schedule::Periodic(Interval::Q2w));
        assert_eq!(result.stats.evaluated, 5);
    }

    #[test]
    fn fixed_interval_leaves_regimen_searches_alone() {
        let catalog = Catalog::builtin();
        let simulation = SimulationOptions::default()
            .with_horizon(84.0)
            .with_tumor_samples(60);
        let free = Optimizer::new(&catalog, simulation.clone(), OptimizerOptions::default());
        let daily = Optimizer::new(
            &catalog,
            simulation,
            OptimizerOptions::default().with_fixed_interval(Interval::Daily),
        );

        // Daily doxorubicin would break its ceiling at every dose
        let expected = free.single_regimen(&tnbc(), "AC").unwrap().into_found().unwrap();
        let result = daily.single_regimen(&tnbc(), "AC").unwrap().into_found().unwrap();
        assert_eq!(result.stats.evaluated, 60);
        assert_eq!(result.stats.pruned, 0);
        assert_eq!(result.choices, expected.choices);
        for choice in &result.choices {
            assert_ne!(choice.schedule, Schedule::Periodic(Interval::Daily));
        }

        let best = daily.auto_best(&tnbc()).unwrap().into_found().unwrap();
        assert_eq!(best.stats.evaluated, 60 + 50);
        assert!(best.skipped.iter().all(|s| s.regimen != "AC" && s.regimen != "TC"));

        // The single-drug search still follows it
        let single = daily.single_drug(&tnbc(), "docetaxel").unwrap().into_found().unwrap();
        assert_eq!(single.choices[0].schedule, Schedule::Periodic(Interval::Daily));
    }

    #[test]
    fn dose_scaling_handles_phased_regimens() {
        let catalog = Catalog::builtin();
        let optimizer = Optimizer::new(
            &catalog,
            SimulationOptions::default().with_tumor_samples(100),
            OptimizerOptions {
                dose_scales: vec![0.85, 1.0],
                ..Default::default()
            },
        );
        let result = optimizer
            .dose_scaling(&tnbc(), "AC_T")
            .unwrap()
            .into_found()
            .unwrap();
        assert_eq!(result.horizon, 168.0);
        assert_eq!(result.choices.len(), 3);
        let dox = result.choice("doxorubicin").unwrap();
        // Four q3w doses during the 84-day phase
        assert_eq!(dox.cycles, 4);
        assert!(dox.nominal * dox.cycles as f64 <= 500.0);
    }

    #[test]
    fn run_dispatches_and_recommends() {
        let catalog = Catalog::builtin();
        let optimizer = optimizer(&catalog, 42.0);
        let patient = Patient::from_diameter("HR+", 10.0, 2.0);
        // Low Ki-67 HR+ gets letrozole
        let result = optimizer
            .run(&patient, Mode::SingleRegimen, None)
            .unwrap()
            .into_found()
            .unwrap();
        assert_eq!(result.target, "LET");

        assert!(matches!(
            optimizer.run(&patient, Mode::SingleDrug, None),
            Err(OncoError::InvalidParameter(_))
        ));
    }
}
