use serde::{Deserialize, Serialize};

use crate::catalog::SubtypeParams;
use crate::error::{OncoError, Result};

/// Body surface area assumed when none is given (m²)
pub const DEFAULT_BSA: f64 = 1.7;

/// Volume of a sphere with the given diameter, `(π/6) d³`
pub fn volume_from_diameter(diameter: f64) -> f64 {
    std::f64::consts::PI / 6.0 * diameter.powi(3)
}

pub fn diameter_from_volume(volume: f64) -> f64 {
    (6.0 * volume / std::f64::consts::PI).cbrt()
}

/// What the engine needs to know about a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Molecular subtype, a key of the subtype table (`HR+`, `HER2+`, `TNBC`)
    pub subtype: String,
    /// Ki-67 proliferation index in percent
    pub ki67: f64,
    /// Initial tumor volume
    pub volume: f64,
    /// Body surface area in m²
    pub bsa: f64,
    pub stage: Option<u32>,
    pub lymph_nodes_positive: u32,
    /// Response to previous treatment (`PD`, `SD`, `PR`, `CR`)
    pub response: Option<String>,
}

impl Patient {
    pub fn new(subtype: &str, ki67: f64, volume: f64) -> Self {
        Patient {
            subtype: subtype.to_string(),
            ki67,
            volume,
            bsa: DEFAULT_BSA,
            stage: None,
            lymph_nodes_positive: 0,
            response: None,
        }
    }

    /// Initial volume from a measured diameter
    pub fn from_diameter(subtype: &str, ki67: f64, diameter: f64) -> Self {
        Patient::new(subtype, ki67, volume_from_diameter(diameter))
    }

    pub fn with_bsa(mut self, bsa: f64) -> Self {
        self.bsa = bsa;
        self
    }

    pub fn with_stage(mut self, stage: u32) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_lymph_nodes(mut self, positive: u32) -> Self {
        self.lymph_nodes_positive = positive;
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.ki67) {
            return Err(OncoError::InvalidParameter(format!(
                "ki67 is a percentage, got {}",
                self.ki67
            )));
        }
        if !(self.volume > 0.0) || !self.volume.is_finite() {
            return Err(OncoError::InvalidParameter(format!(
                "initial volume must be positive, got {}",
                self.volume
            )));
        }
        if !(self.bsa > 0.0) {
            return Err(OncoError::InvalidParameter(format!(
                "body surface area must be positive, got {}",
                self.bsa
            )));
        }
        Ok(())
    }

    /// Subtype parameters for this patient, see [`adjust_for_stage`]
    pub fn effective_params(&self, base: &SubtypeParams) -> SubtypeParams {
        match self.stage {
            Some(stage) => adjust_for_stage(base, self.volume, stage),
            None => *base,
        }
    }
}

/// Derive parameters for a tumor of volume `v0` at the given stage
///
/// Tumors already close to the carrying capacity get room to grow, and
/// advanced stages get a larger capacity and a larger necrotic core.
pub fn adjust_for_stage(base: &SubtypeParams, v0: f64, stage: u32) -> SubtypeParams {
    let mut params = *base;
    if v0 > 0.7 * base.k {
        params.k = base.k.max(1.5 * v0);
    }
    if stage == 3 {
        params.k *= 1.2;
        params.f_n0 = (base.f_n0 + 0.10).min(0.60);
    } else if stage >= 4 {
        params.k *= 1.4;
        params.f_n0 = (base.f_n0 + 0.20).min(0.70);
    }
    params
}

/// Rule-of-thumb regimen for a patient, by subtype, proliferation, stage and
/// nodal status
///
/// A missing stage counts as stage 1.
pub fn recommend_regimen(patient: &Patient) -> Option<&'static str> {
    let stage = patient.stage.unwrap_or(1);
    let ki67 = patient.ki67;
    match patient.subtype.as_str() {
        "TNBC" => Some(if stage >= 4 {
            "PLATINUM"
        } else if ki67 > 40.0 {
            "AC_T"
        } else if stage == 1 {
            "TC"
        } else {
            "AC_T"
        }),
        "HER2+" => Some(match stage {
            0 | 1 => "T_paclitaxel",
            2 | 3 => "AC_T",
            _ => "T_mono",
        }),
        "HR+" => Some(if ki67 < 15.0 {
            "LET"
        } else if ki67 <= 30.0 {
            if stage >= 2 {
                "TC"
            } else {
                "LET"
            }
        } else if patient.lymph_nodes_positive > 0 {
            "AC_T"
        } else {
            "TC"
        }),
        _ => None,
    }
}
