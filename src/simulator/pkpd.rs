use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{OncoError, Result};
use crate::simulator::cache::{self, ProfileKey};
use crate::simulator::effect::{e_of_c, EffectSignal};
use crate::simulator::pk::{solve_pk, PkProfile};
use crate::simulator::schedule::{DosingSchedule, Schedule};
use crate::simulator::SimulationOptions;

/// Effect signal of one drug given on one schedule
#[derive(Debug, Clone)]
pub struct DrugEffect {
    pub drug: String,
    pub dosing: DosingSchedule,
    pub profile: Arc<PkProfile>,
    pub e_max: f64,
    pub ec50: f64,
}

impl DrugEffect {
    pub fn concentration(&self, t: f64) -> f64 {
        self.profile.concentration(t)
    }
}

impl EffectSignal for DrugEffect {
    fn effect(&self, t: f64) -> f64 {
        e_of_c(self.profile.concentration(t), self.e_max, self.ec50)
    }
}

/// Build the PK profile and PD parameters of `drug` over `[0, horizon]`
///
/// `dose_override` is an absolute dose in mg. Without it the catalog default is
/// used, scaled by `bsa` when it is given per m². `schedule_override` replaces
/// the catalog schedule.
pub fn build_single_drug(
    catalog: &Catalog,
    drug: &str,
    horizon: f64,
    bsa: f64,
    dose_override: Option<f64>,
    schedule_override: Option<Schedule>,
    options: &SimulationOptions,
) -> Result<DrugEffect> {
    let params = catalog.drug(drug)?;
    if !(bsa > 0.0) {
        return Err(OncoError::InvalidParameter(format!(
            "body surface area must be positive, got {}",
            bsa
        )));
    }

    let dose = match dose_override {
        Some(dose) => dose,
        None => params
            .dose
            .map(|spec| spec.absolute(bsa))
            .ok_or_else(|| OncoError::MissingDoseSpecification(drug.to_string()))?,
    };
    let schedule = schedule_override.unwrap_or(params.schedule);
    let dosing = DosingSchedule::new(schedule, dose);
    let model = params.model()?;

    let profile = if options.cache {
        let key = ProfileKey::new(&model, &dosing, horizon, options);
        match cache::get_entry(&key) {
            Some(profile) => profile,
            None => {
                let profile = Arc::new(solve_pk(
                    model,
                    &dosing,
                    horizon,
                    options.pk_samples,
                    options.pk_solver(),
                    options.extrapolation,
                )?);
                cache::insert_entry(key, Arc::clone(&profile));
                profile
            }
        }
    } else {
        Arc::new(solve_pk(
            model,
            &dosing,
            horizon,
            options.pk_samples,
            options.pk_solver(),
            options.extrapolation,
        )?)
    };

    tracing::trace!(
        "Built PK/PD for {} ({:.1} mg {}) over {} days",
        drug,
        dose,
        schedule,
        horizon
    );

    Ok(DrugEffect {
        drug: drug.to_string(),
        dosing,
        profile,
        e_max: params.e_max,
        ec50: params.ec50,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DrugPkPd;
    use crate::simulator::schedule::Interval;
    use approx::assert_relative_eq;

    #[test]
    fn default_dose_is_scaled_by_bsa() {
        let catalog = Catalog::builtin();
        let options = SimulationOptions::default().without_cache();
        let effect =
            build_single_drug(&catalog, "doxorubicin", 84.0, 1.8, None, None, &options).unwrap();
        assert_relative_eq!(effect.dosing.dose, 108.0, max_relative = 1e-12);
        assert_eq!(effect.dosing.schedule, Schedule::Periodic(Interval::Q3w));
        // Right after the first bolus: dose / V1
        assert_relative_eq!(effect.concentration(0.0), 108.0 / 20.0, max_relative = 1e-9);
    }

    #[test]
    fn fixed_doses_ignore_bsa() {
        let catalog = Catalog::builtin();
        let options = SimulationOptions::default().without_cache();
        let effect =
            build_single_drug(&catalog, "letrozole", 30.0, 2.1, None, None, &options).unwrap();
        assert_eq!(effect.dosing.dose, 2.5);
    }

    #[test]
    fn overrides_win() {
        let catalog = Catalog::builtin();
        let options = SimulationOptions::default().without_cache();
        let effect = build_single_drug(
            &catalog,
            "paclitaxel",
            42.0,
            1.7,
            Some(200.0),
            Some(Interval::Q2w.into()),
            &options,
        )
        .unwrap();
        assert_eq!(effect.dosing.dose, 200.0);
        assert_eq!(effect.dosing.schedule, Schedule::Periodic(Interval::Q2w));
    }

    #[test]
    fn effect_is_zero_before_treatment_and_bounded() {
        let catalog = Catalog::builtin();
        let options = SimulationOptions::default();
        let effect =
            build_single_drug(&catalog, "docetaxel", 63.0, 1.7, None, None, &options).unwrap();
        assert_eq!(effect.effect(-0.5), 0.0);
        for i in 0..630 {
            let e = effect.effect(i as f64 * 0.1);
            assert!((0.0..0.35).contains(&e));
        }
    }

    #[test]
    fn cached_profiles_are_shared() {
        let catalog = Catalog::builtin();
        let options = SimulationOptions::default();
        let a = build_single_drug(&catalog, "carboplatin", 77.0, 1.65, None, None, &options).unwrap();
        let b = build_single_drug(&catalog, "carboplatin", 77.0, 1.65, None, None, &options).unwrap();
        assert!(Arc::ptr_eq(&a.profile, &b.profile));
    }

    #[test]
    fn errors() {
        let mut catalog = Catalog::builtin();
        let options = SimulationOptions::default().without_cache();
        assert_eq!(
            build_single_drug(&catalog, "unobtainium", 10.0, 1.7, None, None, &options).unwrap_err(),
            OncoError::UnknownDrug("unobtainium".into())
        );

        catalog
            .insert_drug(
                "nodose",
                DrugPkPd {
                    cl: 1.0,
                    q: 0.0,
                    v1: 10.0,
                    v2: 0.0,
                    dose: None,
                    schedule: Interval::Daily.into(),
                    e_max: 0.1,
                    ec50: 0.1,
                },
            )
            .unwrap();
        assert_eq!(
            build_single_drug(&catalog, "nodose", 10.0, 1.7, None, None, &options).unwrap_err(),
            OncoError::MissingDoseSpecification("nodose".into())
        );
        // An explicit dose is enough
        assert!(build_single_drug(&catalog, "nodose", 10.0, 1.7, Some(5.0), None, &options).is_ok());
    }
}
