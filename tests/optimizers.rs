use std::time::Duration;

use eyre::Result;
use oncodose::prelude::*;

fn simulation(horizon: f64) -> SimulationOptions {
    SimulationOptions::default()
        .with_horizon(horizon)
        .with_tumor_samples(120)
}

fn summary(result: &OptimizationResult) -> (String, Vec<(String, f64, Schedule)>, f64) {
    (
        result.target.clone(),
        result
            .choices
            .iter()
            .map(|c| (c.drug.clone(), c.nominal, c.schedule))
            .collect(),
        result.score,
    )
}

#[test]
fn auto_best_is_deterministic() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0);

    let sequential = Optimizer::new(&catalog, simulation(84.0), OptimizerOptions::default());
    let parallel = Optimizer::new(
        &catalog,
        simulation(84.0),
        OptimizerOptions::default().parallel(true),
    );

    let first = sequential.auto_best(&patient)?.into_found().expect("a regimen");
    let second = sequential.auto_best(&patient)?.into_found().expect("a regimen");
    let third = parallel.auto_best(&patient)?.into_found().expect("a regimen");

    assert_eq!(summary(&first), summary(&second));
    assert_eq!(summary(&first), summary(&third));
    assert_eq!(first.mode, Mode::AutoBest);
    assert!(["AC", "TC"].contains(&first.target.as_str()));

    // Carboplatin breaks its ceiling at every grid dose over 84 days
    assert_eq!(first.skipped.len(), 1);
    assert_eq!(first.skipped[0].regimen, "PLATINUM");
    // AC_T is phased and never searched
    assert!(first.skipped.iter().all(|s| s.regimen != "AC_T"));
    assert_eq!(first.stats.evaluated, 60 + 50);
    Ok(())
}

#[test]
fn auto_best_matches_the_best_single_regimen() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0);
    let optimizer = Optimizer::new(&catalog, simulation(84.0), OptimizerOptions::default());

    let best = optimizer.auto_best(&patient)?.into_found().expect("a regimen");
    for name in ["AC", "TC"] {
        let single = optimizer
            .single_regimen(&patient, name)?
            .into_found()
            .expect("admissible");
        assert!(best.score <= single.score);
    }
    Ok(())
}

#[test]
fn parallel_single_regimen_matches_sequential() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("HR+", 35.0, 2.5).with_lymph_nodes(1);
    let sequential = Optimizer::new(&catalog, simulation(63.0), OptimizerOptions::default());
    let parallel = Optimizer::new(
        &catalog,
        simulation(63.0),
        OptimizerOptions::default().parallel(true),
    );
    let a = sequential.single_regimen(&patient, "TC")?.into_found().expect("TC");
    let b = parallel.single_regimen(&patient, "TC")?.into_found().expect("TC");
    assert_eq!(summary(&a), summary(&b));
    Ok(())
}

#[test]
fn nadir_never_exceeds_final_volume() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0);
    let optimizer = Optimizer::new(
        &catalog,
        simulation(84.0),
        OptimizerOptions::default().with_objective(Objective::Nadir),
    );
    let result = optimizer.single_drug(&patient, "docetaxel")?.into_found().expect("docetaxel");
    assert_eq!(result.objective, Objective::Nadir);
    assert_eq!(result.score, result.trajectory.nadir());
    assert!(result.score <= result.trajectory.final_volume());
    Ok(())
}

#[test]
fn exhausted_budget_truncates() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0);
    let optimizer = Optimizer::new(
        &catalog,
        simulation(84.0),
        OptimizerOptions::default().with_time_budget(Duration::ZERO),
    );
    let outcome = optimizer.single_regimen(&patient, "AC")?;
    let stats = outcome.stats();
    assert!(stats.truncated);
    assert_eq!(stats.evaluated, 0);
    assert!(matches!(outcome, SearchOutcome::NoAdmissibleCombination(_)));
    Ok(())
}

#[test]
fn dose_scaling_prunes_over_active_time() -> Result<()> {
    let catalog = Catalog::builtin();
    let patient = Patient::from_diameter("HER2+", 20.0, 3.0);
    let optimizer = Optimizer::new(
        &catalog,
        simulation(365.0),
        OptimizerOptions {
            dose_scales: vec![1.0, 1.3],
            ..Default::default()
        },
    );
    // Six q3w carboplatin doses during the 126-day phase break the 800 mg/m2
    // ceiling at either scale, once under each docetaxel choice
    let outcome = optimizer.dose_scaling(&patient, "TCH")?;
    let stats = outcome.stats();
    assert!(matches!(outcome, SearchOutcome::NoAdmissibleCombination(_)));
    assert_eq!(stats.pruned, 4);
    assert_eq!(stats.evaluated, 0);

    // Without the carboplatin ceiling every combination is simulated over the phase
    let mut relaxed = catalog.clone();
    relaxed.set_toxicity_limit("carboplatin", 1e6);
    let optimizer = Optimizer::new(
        &relaxed,
        simulation(365.0),
        OptimizerOptions {
            dose_scales: vec![1.0, 1.3],
            ..Default::default()
        },
    );
    let result = optimizer.dose_scaling(&patient, "TCH")?.into_found().expect("TCH");
    assert_eq!(result.horizon, 126.0);
    assert_eq!(result.stats.evaluated, 8);
    assert_eq!(result.choice("carboplatin").map(|c| c.cycles), Some(6));
    Ok(())
}

#[test]
fn unknown_inputs_are_errors() {
    let catalog = Catalog::builtin();
    let optimizer = Optimizer::new(&catalog, simulation(84.0), OptimizerOptions::default());
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0);
    assert_eq!(
        optimizer.single_drug(&patient, "placebo").unwrap_err(),
        OncoError::UnknownDrug("placebo".into())
    );
    assert_eq!(
        optimizer.single_drug(&patient, "toremifene").unwrap_err(),
        OncoError::MissingGridDefinition("toremifene".into())
    );
    assert_eq!(
        optimizer.single_regimen(&patient, "XYZ").unwrap_err(),
        OncoError::UnknownRegimen("XYZ".into())
    );
    let luminal = Patient::from_diameter("luminal", 20.0, 2.0);
    assert_eq!(
        optimizer.auto_best(&luminal).unwrap_err(),
        OncoError::UnknownSubtype("luminal".into())
    );
}
