use eyre::Result;
use oncodose::prelude::*;

fn main() -> Result<()> {
    let catalog = Catalog::builtin();

    // 4 cm triple-negative tumor, Ki-67 45%
    let patient = Patient::from_diameter("TNBC", 45.0, 4.0).with_bsa(1.7);

    let simulation = SimulationOptions::default()
        .with_horizon(84.0)
        .with_tumor_samples(300);
    let optimizer = Optimizer::new(&catalog, simulation.clone(), OptimizerOptions::default().parallel(true));

    println!("Searching AC doses...");
    let result = match optimizer.single_regimen(&patient, "AC")? {
        SearchOutcome::Found(result) => result,
        SearchOutcome::NoAdmissibleCombination(stats) => {
            println!("No admissible AC combination ({} pruned)", stats.pruned);
            return Ok(());
        }
    };

    for choice in &result.choices {
        println!(
            "{:>18}: {} {} ({:.0} mg) {} x{}",
            choice.drug,
            choice.nominal,
            choice.unit(),
            choice.absolute,
            choice.schedule,
            choice.cycles
        );
    }
    println!(
        "V(0) = {:.2}, V(84) = {:.2}, nadir = {:.2}",
        result.trajectory.initial_volume(),
        result.trajectory.final_volume(),
        result.trajectory.nadir()
    );

    // Compare against letting the tumor grow
    let untreated = simulate_patient(&catalog, &patient, &NoEffect, 84.0, &simulation)?;
    println!("Untreated V(84) = {:.2}", untreated.final_volume());

    // Let the optimizer pick among the recommended regimens
    let best = optimizer.auto_best(&patient)?;
    if let Some(best) = best.found() {
        println!("Best recommended regimen: {} ({:.2})", best.target, best.score);
        for skipped in &best.skipped {
            println!("  skipped {}: {}", skipped.regimen, skipped.reason);
        }
    }
    Ok(())
}
