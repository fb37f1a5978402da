//! Regimen definitions and the composition of per-drug effects into one
//! effect signal.
//!
//! A single-phase regimen gives every drug over the whole horizon. A phased
//! regimen runs its phases back to back; the drugs of a phase are simulated on
//! the phase's own clock and shifted to the phase start. Concentrations are
//! not reset when a phase ends: drug given in one phase keeps washing out
//! during the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{OncoError, Result};
use crate::simulator::effect::{e_of_c, EffectSignal};
use crate::simulator::pkpd::{build_single_drug, DrugEffect};
use crate::simulator::schedule::Schedule;
use crate::simulator::SimulationOptions;

/// One phase of a phased regimen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Days
    #[serde(alias = "duration_days")]
    pub duration: f64,
    pub drugs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Regimen {
    /// All drugs given together over the whole horizon
    Single { drugs: Vec<String> },
    /// Consecutive phases without gaps
    Phased { phases: Vec<Phase> },
}

impl Regimen {
    pub fn is_phased(&self) -> bool {
        matches!(self, Regimen::Phased { .. })
    }

    /// Every drug used, first occurrence order, without repeats
    pub fn drugs(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let all: Box<dyn Iterator<Item = &String>> = match self {
            Regimen::Single { drugs } => Box::new(drugs.iter()),
            Regimen::Phased { phases } => Box::new(phases.iter().flat_map(|p| p.drugs.iter())),
        };
        for drug in all {
            if !seen.contains(&drug.as_str()) {
                seen.push(drug);
            }
        }
        seen
    }

    /// Total treatment time: the sum of phase durations, or `horizon` for a
    /// single-phase regimen
    pub fn length(&self, horizon: f64) -> f64 {
        match self {
            Regimen::Single { .. } => horizon,
            Regimen::Phased { phases } => phases.iter().map(|p| p.duration).sum(),
        }
    }

    /// Time during which `drug` is being given
    pub fn active_time(&self, drug: &str, horizon: f64) -> f64 {
        match self {
            Regimen::Single { drugs } => {
                if drugs.iter().any(|d| d == drug) {
                    horizon
                } else {
                    0.0
                }
            }
            Regimen::Phased { phases } => phases
                .iter()
                .filter(|p| p.drugs.iter().any(|d| d == drug))
                .map(|p| p.duration)
                .sum(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(OncoError::InvalidRegimen {
                regimen: name.to_string(),
                reason,
            })
        };
        match self {
            Regimen::Single { drugs } => {
                if drugs.is_empty() {
                    return invalid("no drugs".to_string());
                }
            }
            Regimen::Phased { phases } => {
                if phases.is_empty() {
                    return invalid("no phases".to_string());
                }
                for (i, phase) in phases.iter().enumerate() {
                    if !(phase.duration > 0.0) || !phase.duration.is_finite() {
                        return invalid(format!(
                            "phase {} has non-positive duration {}",
                            i + 1,
                            phase.duration
                        ));
                    }
                    if phase.drugs.is_empty() {
                        return invalid(format!("phase {} has no drugs", i + 1));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A named regimen as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimenEntry {
    pub description: String,
    #[serde(flatten)]
    pub regimen: Regimen,
}

/// Catalog-file form of a regimen, before its `type` tag is checked
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRegimen {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: String,
    pub drugs: Option<Vec<String>>,
    pub phases: Option<Vec<Phase>>,
}

impl RawRegimen {
    pub fn into_entry(self, name: &str) -> Result<RegimenEntry> {
        let missing = |what: &str| OncoError::InvalidRegimen {
            regimen: name.to_string(),
            reason: format!("missing '{}'", what),
        };
        let kind = self.kind.ok_or_else(|| missing("type"))?;
        let regimen = match kind.as_str() {
            "single" | "simple" => Regimen::Single {
                drugs: self.drugs.ok_or_else(|| missing("drugs"))?,
            },
            "phased" => Regimen::Phased {
                phases: self.phases.ok_or_else(|| missing("phases"))?,
            },
            _ => {
                return Err(OncoError::UnknownPhaseType {
                    regimen: name.to_string(),
                    kind,
                })
            }
        };
        regimen.validate(name)?;
        Ok(RegimenEntry {
            description: self.description,
            regimen,
        })
    }
}

/// Replacement dose and schedule for one drug of a regimen
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugOverride {
    /// Absolute dose in mg
    pub dose: Option<f64>,
    pub schedule: Option<Schedule>,
}

/// Per-drug overrides, keyed by drug name
pub type DoseOverrides = BTreeMap<String, DrugOverride>;

/// A drug effect simulated on a local clock that starts at `shift`
#[derive(Debug, Clone)]
pub struct ShiftedEffect {
    pub local: DrugEffect,
    pub shift: f64,
}

impl ShiftedEffect {
    pub fn concentration(&self, t: f64) -> f64 {
        let tau = t - self.shift;
        if tau < 0.0 {
            0.0
        } else {
            self.local.concentration(tau)
        }
    }
}

impl EffectSignal for ShiftedEffect {
    fn effect(&self, t: f64) -> f64 {
        e_of_c(self.concentration(t), self.local.e_max, self.local.ec50)
    }
}

/// Sum of the effects of every drug instance of a regimen
#[derive(Debug, Clone, Default)]
pub struct RegimenEffect {
    pub components: Vec<ShiftedEffect>,
}

impl EffectSignal for RegimenEffect {
    fn effect(&self, t: f64) -> f64 {
        self.components.iter().map(|c| c.effect(t)).sum()
    }
}

/// Concentration and effect of every drug sampled on a grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PkPdProfiles {
    pub time: Vec<f64>,
    pub drugs: Vec<DrugSeries>,
    pub total_effect: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugSeries {
    pub drug: String,
    pub concentration: Vec<f64>,
    pub effect: Vec<f64>,
}

impl RegimenEffect {
    /// Drug names, first occurrence order
    pub fn drugs(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for c in &self.components {
            if !names.contains(&c.local.drug.as_str()) {
                names.push(&c.local.drug);
            }
        }
        names
    }

    /// Concentration of `drug`, summed over all of its instances
    pub fn concentration_of(&self, drug: &str, t: f64) -> f64 {
        self.components
            .iter()
            .filter(|c| c.local.drug == drug)
            .map(|c| c.concentration(t))
            .sum()
    }

    pub fn effect_of(&self, drug: &str, t: f64) -> f64 {
        self.components
            .iter()
            .filter(|c| c.local.drug == drug)
            .map(|c| c.effect(t))
            .sum()
    }

    /// Sample every drug's concentration and effect on `time`
    pub fn profiles(&self, time: &[f64]) -> PkPdProfiles {
        let drugs: Vec<DrugSeries> = self
            .drugs()
            .into_iter()
            .map(|drug| DrugSeries {
                drug: drug.to_string(),
                concentration: time.iter().map(|&t| self.concentration_of(drug, t)).collect(),
                effect: time.iter().map(|&t| self.effect_of(drug, t)).collect(),
            })
            .collect();
        let total_effect = time.iter().map(|&t| self.effect(t)).collect();
        PkPdProfiles {
            time: time.to_vec(),
            drugs,
            total_effect,
        }
    }
}

/// Build the combined effect of `regimen`
///
/// A single-phase regimen is simulated over `horizon`; the phases of a phased
/// regimen are simulated over their own durations.
pub fn compose(
    catalog: &Catalog,
    regimen: &Regimen,
    horizon: f64,
    bsa: f64,
    overrides: &DoseOverrides,
    options: &SimulationOptions,
) -> Result<RegimenEffect> {
    let build = |drug: &str, length: f64, shift: f64| -> Result<ShiftedEffect> {
        let o = overrides.get(drug).copied().unwrap_or_default();
        let local = build_single_drug(catalog, drug, length, bsa, o.dose, o.schedule, options)?;
        Ok(ShiftedEffect { local, shift })
    };

    let mut components = Vec::new();
    match regimen {
        Regimen::Single { drugs } => {
            for drug in drugs {
                components.push(build(drug, horizon, 0.0)?);
            }
        }
        Regimen::Phased { phases } => {
            let mut shift = 0.0;
            for phase in phases {
                for drug in &phase.drugs {
                    components.push(build(drug, phase.duration, shift)?);
                }
                shift += phase.duration;
            }
        }
    }
    Ok(RegimenEffect { components })
}

/// Look up `name` in the catalog and [`compose`] it
pub fn compose_regimen(
    catalog: &Catalog,
    name: &str,
    horizon: f64,
    bsa: f64,
    overrides: &DoseOverrides,
    options: &SimulationOptions,
) -> Result<RegimenEffect> {
    let entry = catalog.regimen(name)?;
    entry.regimen.validate(name)?;
    compose(catalog, &entry.regimen, horizon, bsa, overrides, options)
}
