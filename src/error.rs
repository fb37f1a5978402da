use thiserror::Error;

/// Errors raised by the simulation and optimization engine
///
/// Running out of admissible dose combinations is not an error, see
/// [`crate::optimizer::SearchOutcome::NoAdmissibleCombination`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OncoError {
    #[error("Unknown drug: {0}")]
    UnknownDrug(String),
    #[error("Unknown regimen: {0}")]
    UnknownRegimen(String),
    #[error("Unknown tumor subtype: {0}")]
    UnknownSubtype(String),
    #[error("Unknown regimen type '{kind}' for regimen {regimen}")]
    UnknownPhaseType { regimen: String, kind: String },
    #[error("Invalid regimen {regimen}: {reason}")]
    InvalidRegimen { regimen: String, reason: String },
    #[error("Regimen {0} is phased and cannot be optimized in this mode")]
    UnsupportedRegimenType(String),
    #[error("No dose specification for drug {0}")]
    MissingDoseSpecification(String),
    #[error("No dose/interval grid defined for drug {0}")]
    MissingGridDefinition(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Integration failed at t = {time:.4}: {reason}")]
    IntegrationFailure { time: f64, reason: String },
    #[error("Catalog error: {0}")]
    Catalog(String),
}

pub type Result<T> = std::result::Result<T, OncoError>;
