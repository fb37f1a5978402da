use std::time::Instant;

use eyre::{Result, WrapErr};

use crate::catalog::Catalog;
use crate::optimizer::{Optimizer, SearchOutcome};
use crate::routines::logger;
use crate::routines::output;
use crate::routines::settings::Settings;

/// Run the configured search from a settings file
///
/// See [`Settings`] for the file layout.
pub fn run(settings_path: &str) -> Result<SearchOutcome> {
    let settings = Settings::new(settings_path)?;
    run_with(&settings)
}

/// Primary entrypoint
///
/// Sets up logging, loads the catalog (built-in tables plus the optional
/// `paths.catalog` file), runs the optimizer in the configured mode and writes
/// the outputs to `paths.output` when it is set.
pub fn run_with(settings: &Settings) -> Result<SearchOutcome> {
    let now = Instant::now();
    settings.validate()?;
    logger::setup_log(settings)?;
    tracing::info!("Starting oncodose");

    let mut catalog = Catalog::builtin();
    if let Some(path) = &settings.paths.catalog {
        catalog
            .merge_file(path)
            .wrap_err_with(|| format!("Failed to load catalog {}", path))?;
        tracing::info!("Catalog extended from {}", path);
    }

    let patient = settings.patient.patient()?;
    tracing::info!(
        "Patient: {} subtype, Ki-67 {}%, initial volume {:.2}, BSA {} m2",
        patient.subtype,
        patient.ki67,
        patient.volume,
        patient.bsa
    );

    let optimizer = Optimizer::new(
        &catalog,
        settings.simulation_options(),
        settings.optimizer.options(),
    );
    let outcome = optimizer
        .run(&patient, settings.optimizer.mode, settings.optimizer.target())
        .wrap_err_with(|| format!("{:?} search failed", settings.optimizer.mode))?;

    match &outcome {
        SearchOutcome::Found(result) => {
            tracing::info!(
                "Best for {}: score {:.4} after {} simulations",
                result.target,
                result.score,
                result.stats.evaluated
            );
            for choice in &result.choices {
                tracing::info!(
                    "  {}: {} {} ({:.1} mg) {}, {} cycles",
                    choice.drug,
                    choice.nominal,
                    choice.unit(),
                    choice.absolute,
                    choice.schedule,
                    choice.cycles
                );
            }
        }
        SearchOutcome::NoAdmissibleCombination(stats) => {
            tracing::warn!(
                "No admissible combination ({} choices pruned by toxicity)",
                stats.pruned
            );
        }
    }

    match &settings.paths.output {
        Some(folder) => {
            output::write_outputs(folder, &patient, &outcome)?;
        }
        None => {
            tracing::info!("Output files will not be written - set `paths.output` to enable them");
        }
    }

    tracing::info!("Finished in {:.2?}", now.elapsed());
    Ok(outcome)
}
