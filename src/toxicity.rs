//! Cumulative-dose ceilings and protocol cycle caps.
//!
//! The check is cheap and runs before any integration, so the optimizer uses
//! it to prune candidates.

use crate::catalog::Catalog;
use crate::simulator::schedule::Schedule;

/// Cycle counting and cumulative-dose checks backed by a catalog
#[derive(Debug, Clone, Copy)]
pub struct ToxicityPolicy<'a> {
    catalog: &'a Catalog,
}

impl<'a> ToxicityPolicy<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        ToxicityPolicy { catalog }
    }

    /// Number of administrations of `drug` within `horizon`
    ///
    /// Whole periods only, capped at the drug's protocol maximum. A single
    /// bolus is one cycle.
    pub fn cycles(&self, drug: &str, schedule: Schedule, horizon: f64) -> usize {
        let n = match schedule.period_days() {
            None => 1,
            Some(period) if horizon > 0.0 => (horizon / period).floor() as usize,
            Some(_) => 0,
        };
        match self.catalog.max_cycles(drug) {
            Some(max) => n.min(max),
            None => n,
        }
    }

    /// Cumulative dose in mg/m² delivered over `horizon`
    pub fn cumulative(&self, drug: &str, dose_abs: f64, schedule: Schedule, horizon: f64, bsa: f64) -> f64 {
        dose_abs / bsa * self.cycles(drug, schedule, horizon) as f64
    }

    /// `true` when the cumulative dose stays within the drug's ceiling, or the
    /// drug has none
    pub fn check(&self, drug: &str, dose_abs: f64, schedule: Schedule, horizon: f64, bsa: f64) -> bool {
        match self.catalog.toxicity_limit(drug) {
            None => true,
            Some(limit) => {
                let total = self.cumulative(drug, dose_abs, schedule, horizon, bsa);
                let ok = total <= limit;
                if !ok {
                    tracing::trace!(
                        "Pruned {} at {:.1} mg {}: cumulative {:.1} mg/m2 over limit {:.1}",
                        drug,
                        dose_abs,
                        schedule,
                        total,
                        limit
                    );
                }
                ok
            }
        }
    }
}
