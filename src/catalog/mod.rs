//! Fixed parameter tables: drug PK/PD, dose/interval grids, regimens,
//! recommendations per subtype, population tumor parameters, cumulative
//! toxicity limits and protocol cycle caps.
//!
//! [`Catalog::builtin`] reproduces the reference tables. A JSON file with the
//! same sections can add or replace entries via [`Catalog::merge_file`]; every
//! section is optional:
//!
//! ```json
//! {
//!   "drugs": { "epirubicin": { "cl": 10.0, "q": 8.0, "v1": 20.0, "v2": 50.0,
//!                              "dose": { "mg_per_m2": 90.0 }, "schedule": "q3w",
//!                              "e_max": 0.4, "ec50": 0.4 } },
//!   "grids": { "epirubicin": { "basis": "mg_per_m2", "doses": [75, 90, 100],
//!                              "intervals": ["q3w"] } },
//!   "regimens": { "EC": { "type": "single", "description": "Epirubicin + Cyclophosphamide",
//!                         "drugs": ["epirubicin", "cyclophosphamide"] } },
//!   "toxicity_limits": { "epirubicin": 900 },
//!   "max_cycles": { "epirubicin": 6 }
//! }
//! ```

mod builtin;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OncoError, Result};
use crate::regimen::{RawRegimen, Regimen, RegimenEntry};
use crate::simulator::pk::CompartmentModel;
use crate::simulator::schedule::{Interval, Schedule};

/// How a nominal dose relates to the administered amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoseBasis {
    /// Nominal dose in mg/m², scaled by body surface area
    #[serde(rename = "mg_per_m2")]
    PerBsa,
    /// Nominal dose is the absolute amount in mg
    #[serde(rename = "fixed_mg")]
    Fixed,
}

impl DoseBasis {
    /// Absolute dose in mg for a nominal dose
    pub fn absolute(&self, nominal: f64, bsa: f64) -> f64 {
        match self {
            DoseBasis::PerBsa => nominal * bsa,
            DoseBasis::Fixed => nominal,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            DoseBasis::PerBsa => "mg/m2",
            DoseBasis::Fixed => "mg",
        }
    }
}

/// Default dose of a drug
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DoseSpec {
    #[serde(rename = "mg_per_m2")]
    PerBsa(f64),
    #[serde(rename = "fixed_mg")]
    Fixed(f64),
}

impl DoseSpec {
    pub fn basis(&self) -> DoseBasis {
        match self {
            DoseSpec::PerBsa(_) => DoseBasis::PerBsa,
            DoseSpec::Fixed(_) => DoseBasis::Fixed,
        }
    }

    pub fn nominal(&self) -> f64 {
        match self {
            DoseSpec::PerBsa(d) | DoseSpec::Fixed(d) => *d,
        }
    }

    pub fn absolute(&self, bsa: f64) -> f64 {
        self.basis().absolute(self.nominal(), bsa)
    }

    pub fn scaled(&self, factor: f64) -> DoseSpec {
        match self {
            DoseSpec::PerBsa(d) => DoseSpec::PerBsa(d * factor),
            DoseSpec::Fixed(d) => DoseSpec::Fixed(d * factor),
        }
    }
}

/// PK/PD parameters of one drug
///
/// `q == 0` or `v2 == 0` selects the one-compartment model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrugPkPd {
    /// Clearance (L/day)
    pub cl: f64,
    /// Inter-compartmental clearance (L/day)
    #[serde(default)]
    pub q: f64,
    /// Central volume (L)
    pub v1: f64,
    /// Peripheral volume (L)
    #[serde(default)]
    pub v2: f64,
    #[serde(default)]
    pub dose: Option<DoseSpec>,
    pub schedule: Schedule,
    pub e_max: f64,
    pub ec50: f64,
}

impl DrugPkPd {
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |what: &str| -> Result<()> {
            Err(OncoError::InvalidParameter(format!("drug {}: {}", name, what)))
        };
        if !(self.e_max > 0.0 && self.e_max <= 1.0) {
            return invalid("e_max must lie in (0, 1]");
        }
        if !(self.ec50 > 0.0) {
            return invalid("ec50 must be positive");
        }
        if !(self.v1 > 0.0) {
            return invalid("v1 must be positive");
        }
        if !(self.v2 >= 0.0 && self.cl >= 0.0 && self.q >= 0.0) {
            return invalid("cl, q and v2 must be non-negative");
        }
        if let Some(dose) = self.dose {
            if !(dose.nominal() >= 0.0) {
                return invalid("default dose must be non-negative");
            }
        }
        Ok(())
    }

    pub fn model(&self) -> Result<CompartmentModel> {
        CompartmentModel::new(self.cl, self.q, self.v1, self.v2)
    }
}

/// Candidate doses and intervals searched by the optimizer for one drug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseGrid {
    pub basis: DoseBasis,
    pub doses: Vec<f64>,
    pub intervals: Vec<Interval>,
}

impl DoseGrid {
    pub fn new(basis: DoseBasis, doses: Vec<f64>, intervals: Vec<Interval>) -> Self {
        DoseGrid {
            basis,
            doses,
            intervals,
        }
    }

    /// Evenly spaced doses from `start` to `end` inclusive
    pub fn stepped(basis: DoseBasis, start: f64, end: f64, step: f64, intervals: Vec<Interval>) -> Self {
        let n = ((end - start) / step).round() as usize;
        let doses = (0..=n).map(|i| start + step * i as f64).collect();
        DoseGrid::new(basis, doses, intervals)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.doses.is_empty() || self.intervals.is_empty() {
            return Err(OncoError::InvalidParameter(format!(
                "grid for {} needs at least one dose and one interval",
                name
            )));
        }
        if self.doses.iter().any(|d| !(*d >= 0.0)) {
            return Err(OncoError::InvalidParameter(format!(
                "grid for {} has a negative dose",
                name
            )));
        }
        Ok(())
    }
}

/// Population tumor-growth parameters of a molecular subtype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubtypeParams {
    /// Natural death rate of viable cells (1/day)
    pub d: f64,
    /// Clearance rate of necrotic mass (1/day)
    pub k_clear: f64,
    /// Carrying capacity (volume units)
    pub k: f64,
    /// Necrotic fraction at t = 0
    pub f_n0: f64,
    /// Cell-cycle time (days)
    pub t_cycle: f64,
}

impl SubtypeParams {
    pub fn validate(&self, name: &str) -> Result<()> {
        let ok = self.d >= 0.0
            && self.k_clear >= 0.0
            && self.k > 0.0
            && (0.0..1.0).contains(&self.f_n0)
            && self.t_cycle > 0.0;
        if ok {
            Ok(())
        } else {
            Err(OncoError::InvalidParameter(format!(
                "subtype {} has out-of-range parameters: {:?}",
                name, self
            )))
        }
    }
}

/// A regimen recommended for a subtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

/// On-disk form of a catalog extension
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub drugs: BTreeMap<String, DrugPkPd>,
    pub grids: BTreeMap<String, DoseGrid>,
    pub regimens: BTreeMap<String, RawRegimen>,
    pub recommended: BTreeMap<String, Vec<Recommendation>>,
    pub subtypes: BTreeMap<String, SubtypeParams>,
    pub toxicity_limits: BTreeMap<String, f64>,
    pub max_cycles: BTreeMap<String, usize>,
}

/// Lookup tables shared read-only by every simulation
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    drugs: BTreeMap<String, DrugPkPd>,
    grids: BTreeMap<String, DoseGrid>,
    regimens: BTreeMap<String, RegimenEntry>,
    recommended: BTreeMap<String, Vec<Recommendation>>,
    subtypes: BTreeMap<String, SubtypeParams>,
    toxicity_limits: BTreeMap<String, f64>,
    max_cycles: BTreeMap<String, usize>,
}

impl Catalog {
    /// Empty catalog, to be filled with the `insert_*` methods or [`Catalog::merge`]
    pub fn empty() -> Self {
        Catalog::default()
    }

    /// The reference tables
    pub fn builtin() -> Self {
        Catalog {
            drugs: builtin::drugs(),
            grids: builtin::grids(),
            regimens: builtin::regimens(),
            recommended: builtin::recommended(),
            subtypes: builtin::subtypes(),
            toxicity_limits: builtin::toxicity_limits(),
            max_cycles: builtin::max_cycles(),
        }
    }

    pub fn drug(&self, name: &str) -> Result<&DrugPkPd> {
        self.drugs
            .get(name)
            .ok_or_else(|| OncoError::UnknownDrug(name.to_string()))
    }

    pub fn grid(&self, drug: &str) -> Result<&DoseGrid> {
        self.grids
            .get(drug)
            .ok_or_else(|| OncoError::MissingGridDefinition(drug.to_string()))
    }

    pub fn regimen(&self, name: &str) -> Result<&RegimenEntry> {
        self.regimens
            .get(name)
            .ok_or_else(|| OncoError::UnknownRegimen(name.to_string()))
    }

    pub fn subtype(&self, name: &str) -> Result<&SubtypeParams> {
        self.subtypes
            .get(name)
            .ok_or_else(|| OncoError::UnknownSubtype(name.to_string()))
    }

    /// Regimens recommended for `subtype`, in order of preference
    pub fn recommended(&self, subtype: &str) -> Result<&[Recommendation]> {
        self.recommended
            .get(subtype)
            .map(|v| v.as_slice())
            .ok_or_else(|| OncoError::UnknownSubtype(subtype.to_string()))
    }

    /// Maximum cumulative dose in mg/m², if the drug has one
    pub fn toxicity_limit(&self, drug: &str) -> Option<f64> {
        self.toxicity_limits.get(drug).copied()
    }

    pub fn max_cycles(&self, drug: &str) -> Option<usize> {
        self.max_cycles.get(drug).copied()
    }

    pub fn drug_names(&self) -> impl Iterator<Item = &str> {
        self.drugs.keys().map(|k| k.as_str())
    }

    pub fn regimen_names(&self) -> impl Iterator<Item = &str> {
        self.regimens.keys().map(|k| k.as_str())
    }

    pub fn subtype_names(&self) -> impl Iterator<Item = &str> {
        self.subtypes.keys().map(|k| k.as_str())
    }

    pub fn insert_drug(&mut self, name: &str, drug: DrugPkPd) -> Result<()> {
        drug.validate(name)?;
        self.drugs.insert(name.to_string(), drug);
        Ok(())
    }

    pub fn insert_grid(&mut self, drug: &str, grid: DoseGrid) -> Result<()> {
        grid.validate(drug)?;
        self.grids.insert(drug.to_string(), grid);
        Ok(())
    }

    pub fn insert_regimen(&mut self, name: &str, description: &str, regimen: Regimen) -> Result<()> {
        regimen.validate(name)?;
        self.regimens.insert(
            name.to_string(),
            RegimenEntry {
                description: description.to_string(),
                regimen,
            },
        );
        Ok(())
    }

    pub fn insert_subtype(&mut self, name: &str, params: SubtypeParams) -> Result<()> {
        params.validate(name)?;
        self.subtypes.insert(name.to_string(), params);
        Ok(())
    }

    pub fn set_recommended(&mut self, subtype: &str, regimens: Vec<Recommendation>) {
        self.recommended.insert(subtype.to_string(), regimens);
    }

    pub fn set_toxicity_limit(&mut self, drug: &str, max_cumulative_mg_per_m2: f64) {
        self.toxicity_limits
            .insert(drug.to_string(), max_cumulative_mg_per_m2);
    }

    pub fn set_max_cycles(&mut self, drug: &str, cycles: usize) {
        self.max_cycles.insert(drug.to_string(), cycles);
    }

    /// Parse a catalog extension from JSON text
    pub fn parse_json(text: &str) -> Result<CatalogFile> {
        serde_json::from_str(text).map_err(|e| OncoError::Catalog(e.to_string()))
    }

    /// Add or replace every entry of `file`, validating each one first
    ///
    /// Nothing is merged if any entry is invalid.
    pub fn merge(&mut self, file: CatalogFile) -> Result<()> {
        let mut next = self.clone();
        for (name, drug) in file.drugs {
            next.insert_drug(&name, drug)?;
        }
        for (name, grid) in file.grids {
            next.insert_grid(&name, grid)?;
        }
        for (name, raw) in file.regimens {
            let entry = raw.into_entry(&name)?;
            next.regimens.insert(name, entry);
        }
        for (name, params) in file.subtypes {
            next.insert_subtype(&name, params)?;
        }
        for (subtype, regimens) in file.recommended {
            next.set_recommended(&subtype, regimens);
        }
        for (drug, limit) in file.toxicity_limits {
            next.set_toxicity_limit(&drug, limit);
        }
        for (drug, cycles) in file.max_cycles {
            next.set_max_cycles(&drug, cycles);
        }
        *self = next;
        Ok(())
    }

    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OncoError::Catalog(format!("{}: {}", path.display(), e)))?;
        let file = Catalog::parse_json(&text)?;
        tracing::debug!(
            "Merging catalog {} ({} drugs, {} regimens)",
            path.display(),
            file.drugs.len(),
            file.regimens.len()
        );
        self.merge(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_valid() {
        let catalog = Catalog::builtin();
        for name in catalog.drug_names() {
            catalog.drug(name).unwrap().validate(name).unwrap();
        }
        for name in catalog.subtype_names() {
            catalog.subtype(name).unwrap().validate(name).unwrap();
        }
        for name in catalog.regimen_names() {
            let entry = catalog.regimen(name).unwrap();
            entry.regimen.validate(name).unwrap();
            for drug in entry.regimen.drugs() {
                assert!(catalog.drug(drug).is_ok(), "{} uses unknown drug {}", name, drug);
            }
        }
        for subtype in ["HR+", "HER2+", "TNBC"] {
            for rec in catalog.recommended(subtype).unwrap() {
                assert!(catalog.regimen(&rec.name).is_ok());
            }
        }
    }

    #[test]
    fn lookups_report_the_missing_key() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.drug("aspirin").unwrap_err(),
            OncoError::UnknownDrug("aspirin".into())
        );
        assert_eq!(
            catalog.grid("toremifene").unwrap_err(),
            OncoError::MissingGridDefinition("toremifene".into())
        );
        assert!(matches!(catalog.regimen("XYZ"), Err(OncoError::UnknownRegimen(_))));
        assert!(matches!(catalog.subtype("luminal"), Err(OncoError::UnknownSubtype(_))));
    }

    #[test]
    fn reference_values() {
        let catalog = Catalog::builtin();
        let dox = catalog.drug("doxorubicin").unwrap();
        assert_eq!(dox.dose, Some(DoseSpec::PerBsa(60.0)));
        assert_eq!(dox.schedule, Schedule::Periodic(Interval::Q3w));
        assert_eq!(catalog.toxicity_limit("doxorubicin"), Some(500.0));
        assert_eq!(catalog.toxicity_limit("docetaxel"), None);
        assert_eq!(catalog.max_cycles("paclitaxel"), Some(12));
        assert_eq!(
            catalog.grid("cyclophosphamide").unwrap().doses,
            vec![500.0, 550.0, 600.0, 650.0, 700.0]
        );
        assert_eq!(catalog.subtype("TNBC").unwrap().t_cycle, 1.0);

        // Necrotic tissue is cleared slowly
        let clearance: Vec<f64> = ["HR+", "HER2+", "TNBC"]
            .iter()
            .map(|s| catalog.subtype(s).unwrap().k_clear)
            .collect();
        assert_eq!(clearance, vec![0.001, 0.001, 0.0015]);
    }

    #[test]
    fn merge_adds_and_overrides() {
        let json = r#"{
            "drugs": { "epirubicin": { "cl": 10.0, "q": 8.0, "v1": 20.0, "v2": 50.0,
                                       "dose": { "mg_per_m2": 90.0 }, "schedule": "q3w",
                                       "e_max": 0.4, "ec50": 0.4 } },
            "grids": { "epirubicin": { "basis": "mg_per_m2", "doses": [75, 90], "intervals": ["q3w"] } },
            "regimens": { "EC": { "type": "single", "description": "Epirubicin + Cyclophosphamide",
                                  "drugs": ["epirubicin", "cyclophosphamide"] } },
            "max_cycles": { "epirubicin": 4 }
        }"#;
        let mut catalog = Catalog::builtin();
        catalog.merge(Catalog::parse_json(json).unwrap()).unwrap();

        assert_eq!(catalog.drug("epirubicin").unwrap().dose, Some(DoseSpec::PerBsa(90.0)));
        assert_eq!(catalog.toxicity_limit("epirubicin"), Some(900.0));
        assert_eq!(catalog.max_cycles("epirubicin"), Some(4));
        assert_eq!(catalog.regimen("EC").unwrap().description, "Epirubicin + Cyclophosphamide");
    }

    #[test]
    fn merge_is_all_or_nothing() {
        let json = r#"{
            "drugs": { "newdrug": { "cl": 1.0, "v1": 10.0, "schedule": "daily", "e_max": 0.1, "ec50": 0.1 } },
            "regimens": { "BAD": { "type": "cyclic", "drugs": ["newdrug"] } }
        }"#;
        let mut catalog = Catalog::builtin();
        let err = catalog.merge(Catalog::parse_json(json).unwrap()).unwrap_err();
        assert!(matches!(err, OncoError::UnknownPhaseType { .. }));
        assert!(catalog.drug("newdrug").is_err());
    }

    #[test]
    fn invalid_drug_is_rejected() {
        let mut catalog = Catalog::empty();
        let drug = DrugPkPd {
            cl: 1.0,
            q: 0.0,
            v1: 10.0,
            v2: 0.0,
            dose: None,
            schedule: Schedule::SingleBolus,
            e_max: 1.5,
            ec50: 0.1,
        };
        assert!(matches!(
            catalog.insert_drug("x", drug),
            Err(OncoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_catalog_error() {
        assert!(matches!(Catalog::parse_json("{ not json"), Err(OncoError::Catalog(_))));
    }
}
