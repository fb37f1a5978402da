use serde::{Deserialize, Serialize};

use crate::error::{OncoError, Result};

/// The `[resistance]` settings section
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceOptions {
    /// Track a drug-resistant subpopulation
    pub enabled: bool,
    /// Used together with `resistance_strength`, otherwise both come from the
    /// patient's response label
    pub mutation_rate: Option<f64>,
    pub resistance_strength: Option<f64>,
}

impl ResistanceOptions {
    pub fn enabled() -> Self {
        ResistanceOptions {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn explicit(mutation_rate: f64, resistance_strength: f64) -> Self {
        ResistanceOptions {
            enabled: true,
            mutation_rate: Some(mutation_rate),
            resistance_strength: Some(resistance_strength),
        }
    }
}

/// Parameters of the resistant subpopulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResistanceParams {
    /// Rate of conversion from sensitive to resistant cells (1/day)
    pub mutation_rate: f64,
    /// Fraction of the drug effect that still acts on resistant cells
    pub resistance_strength: f64,
}

impl ResistanceParams {
    /// Used for response labels that are present but not recognized
    pub const FALLBACK: ResistanceParams = ResistanceParams {
        mutation_rate: 0.01,
        resistance_strength: 0.5,
    };

    pub fn new(mutation_rate: f64, resistance_strength: f64) -> Result<Self> {
        if !(mutation_rate >= 0.0) || !mutation_rate.is_finite() {
            return Err(OncoError::InvalidParameter(format!(
                "mutation_rate must be non-negative, got {}",
                mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&resistance_strength) {
            return Err(OncoError::InvalidParameter(format!(
                "resistance_strength must lie in [0, 1], got {}",
                resistance_strength
            )));
        }
        Ok(ResistanceParams {
            mutation_rate,
            resistance_strength,
        })
    }
}

/// Clinical response to prior treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseLabel {
    ProgressiveDisease,
    StableDisease,
    PartialResponse,
    CompleteResponse,
}

impl ResponseLabel {
    /// Case-insensitive; accepts the usual abbreviations
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "PD" | "PROGRESSIVE DISEASE" => Some(ResponseLabel::ProgressiveDisease),
            "SD" | "STABLE DISEASE" => Some(ResponseLabel::StableDisease),
            "PR" | "PARTIAL RESPONSE" => Some(ResponseLabel::PartialResponse),
            "CR" | "COMPLETE RESPONSE" => Some(ResponseLabel::CompleteResponse),
            _ => None,
        }
    }

    /// Worse responses mean faster mutation and stronger resistance
    pub fn params(&self) -> ResistanceParams {
        let (mutation_rate, resistance_strength) = match self {
            ResponseLabel::ProgressiveDisease => (0.02, 0.2),
            ResponseLabel::StableDisease => (0.01, 0.5),
            ResponseLabel::PartialResponse => (0.007, 0.7),
            ResponseLabel::CompleteResponse => (0.005, 0.8),
        };
        ResistanceParams {
            mutation_rate,
            resistance_strength,
        }
    }
}

/// Decide whether a simulation tracks resistance, and with which parameters
///
/// `None` selects the model without a resistant subpopulation. An explicit
/// parameter pair takes precedence over the response label. A missing label
/// silently disables resistance, an unrecognized one falls back to
/// [`ResistanceParams::FALLBACK`].
pub fn resolve(options: &ResistanceOptions, response: Option<&str>) -> Result<Option<ResistanceParams>> {
    if !options.enabled {
        return Ok(None);
    }
    if let (Some(mutation_rate), Some(strength)) =
        (options.mutation_rate, options.resistance_strength)
    {
        return ResistanceParams::new(mutation_rate, strength).map(Some);
    }
    match response {
        None => Ok(None),
        Some(label) => match ResponseLabel::parse(label) {
            Some(parsed) => Ok(Some(parsed.params())),
            None => {
                tracing::warn!(
                    "Unrecognized response label '{}', using default resistance parameters",
                    label
                );
                Ok(Some(ResistanceParams::FALLBACK))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_means_no_resistance() {
        let options = ResistanceOptions::default();
        assert_eq!(resolve(&options, Some("PD")).unwrap(), None);
    }

    #[test]
    fn explicit_pair_wins_over_label() {
        let options = ResistanceOptions::explicit(0.03, 0.1);
        let params = resolve(&options, Some("CR")).unwrap().unwrap();
        assert_eq!(params, ResistanceParams::new(0.03, 0.1).unwrap());
    }

    #[test]
    fn labels_map_to_parameters() {
        let options = ResistanceOptions::enabled();
        let cases = [
            ("PD", 0.02, 0.2),
            ("sd", 0.01, 0.5),
            ("Partial Response", 0.007, 0.7),
            (" CR ", 0.005, 0.8),
            ("complete response", 0.005, 0.8),
        ];
        for (label, m, s) in cases {
            let params = resolve(&options, Some(label)).unwrap().unwrap();
            assert_eq!(params.mutation_rate, m, "{}", label);
            assert_eq!(params.resistance_strength, s, "{}", label);
        }
    }

    #[test]
    fn unknown_label_falls_back_and_missing_label_disables() {
        let options = ResistanceOptions::enabled();
        assert_eq!(
            resolve(&options, Some("mixed")).unwrap(),
            Some(ResistanceParams::FALLBACK)
        );
        assert_eq!(resolve(&options, None).unwrap(), None);
    }

    #[test]
    fn half_specified_pair_uses_label() {
        let options = ResistanceOptions {
            enabled: true,
            mutation_rate: Some(0.5),
            resistance_strength: None,
        };
        assert_eq!(
            resolve(&options, Some("PD")).unwrap(),
            Some(ResponseLabel::ProgressiveDisease.params())
        );
    }

    #[test]
    fn out_of_range_parameters() {
        assert!(matches!(
            resolve(&ResistanceOptions::explicit(0.01, 1.5), None),
            Err(OncoError::InvalidParameter(_))
        ));
        assert!(matches!(
            resolve(&ResistanceOptions::explicit(-0.01, 0.5), None),
            Err(OncoError::InvalidParameter(_))
        ));
    }
}
