use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::simulator::pk::{CompartmentModel, PkProfile};
use crate::simulator::schedule::DosingSchedule;
use crate::simulator::SimulationOptions;

const CACHE_SIZE: usize = 10000;

/// Identifies a PK solve: model parameters, dosing, horizon and every solver
/// setting that changes the samples
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProfileKey(u64);

impl ProfileKey {
    pub fn new(
        model: &CompartmentModel,
        dosing: &DosingSchedule,
        horizon: f64,
        options: &SimulationOptions,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        for value in model.parameters() {
            value.to_bits().hash(&mut hasher);
        }
        dosing.dose.to_bits().hash(&mut hasher);
        dosing.schedule.hash(&mut hasher);
        horizon.to_bits().hash(&mut hasher);
        options.pk_samples.hash(&mut hasher);
        options.integrator.hash(&mut hasher);
        options.pk_rtol.to_bits().hash(&mut hasher);
        options.pk_atol.to_bits().hash(&mut hasher);
        options.extrapolation.hash(&mut hasher);
        ProfileKey(hasher.finish())
    }
}

lazy_static! {
    static ref CACHE: DashMap<ProfileKey, Arc<PkProfile>> = DashMap::with_capacity(CACHE_SIZE);
}

pub fn get_entry(key: &ProfileKey) -> Option<Arc<PkProfile>> {
    CACHE.get(key).map(|entry| Arc::clone(entry.value()))
}

pub fn insert_entry(key: ProfileKey, profile: Arc<PkProfile>) {
    // Profiles are cheap to rebuild, so a full cache is simply emptied
    if CACHE.len() >= CACHE_SIZE {
        CACHE.clear();
    }
    CACHE.insert(key, profile);
}

pub fn clear() {
    CACHE.clear();
}

pub fn len() -> usize {
    CACHE.len()
}
