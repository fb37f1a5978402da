use std::time::Duration;

use config::Config as eConfig;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::optimizer::{Mode, Objective, OptimizerOptions, DEFAULT_DOSE_SCALES};
use crate::patient::{volume_from_diameter, Patient, DEFAULT_BSA};
use crate::simulator::resistance::ResistanceOptions;
use crate::simulator::schedule::Interval;
use crate::simulator::SimulationOptions;

/// Settings of one run
///
/// Read from a TOML file with [`Settings::new`], or built in code from
/// [`Settings::default`] and the setters. Every section and field is optional.
///
/// ```toml
/// [simulation]
/// horizon = 84
///
/// [optimizer]
/// mode = "single_regimen"
/// regimen = "AC"
///
/// [patient]
/// subtype = "TNBC"
/// ki67 = 45
/// diameter = 4.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub simulation: SimulationOptions,
    pub resistance: ResistanceOptions,
    pub optimizer: OptimizerSettings,
    pub patient: PatientSettings,
    pub paths: Paths,
    pub log: Log,
}

/// The `[optimizer]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub mode: Mode,
    pub objective: Objective,
    /// Drug for `single_drug`
    pub drug: Option<String>,
    /// Regimen for `single_regimen` and `dose_scaling`
    pub regimen: Option<String>,
    /// Interval for `single_drug`
    pub fixed_interval: Option<Interval>,
    pub dose_scales: Vec<f64>,
    pub parallel: bool,
    pub time_budget_secs: Option<f64>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            mode: Mode::default(),
            objective: Objective::default(),
            drug: None,
            regimen: None,
            fixed_interval: None,
            dose_scales: DEFAULT_DOSE_SCALES.to_vec(),
            parallel: false,
            time_budget_secs: None,
        }
    }
}

impl OptimizerSettings {
    /// The name searched in the configured mode, if one is given
    pub fn target(&self) -> Option<&str> {
        match self.mode {
            Mode::SingleDrug => self.drug.as_deref(),
            Mode::SingleRegimen | Mode::DoseScaling => self.regimen.as_deref(),
            Mode::AutoBest => None,
        }
    }

    pub fn options(&self) -> OptimizerOptions {
        OptimizerOptions {
            objective: self.objective,
            fixed_interval: self.fixed_interval,
            dose_scales: self.dose_scales.clone(),
            parallel: self.parallel,
            time_budget: self.time_budget_secs.map(Duration::from_secs_f64),
        }
    }
}

/// The `[patient]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientSettings {
    pub subtype: String,
    pub ki67: f64,
    /// Initial tumor volume, takes precedence over `diameter`
    pub volume: Option<f64>,
    pub diameter: Option<f64>,
    pub bsa: f64,
    pub stage: Option<u32>,
    pub lymph_nodes_positive: u32,
    pub response: Option<String>,
}

impl Default for PatientSettings {
    fn default() -> Self {
        PatientSettings {
            subtype: "TNBC".to_string(),
            ki67: 30.0,
            volume: None,
            diameter: None,
            bsa: DEFAULT_BSA,
            stage: None,
            lymph_nodes_positive: 0,
            response: None,
        }
    }
}

impl PatientSettings {
    pub fn patient(&self) -> Result<Patient> {
        let volume = match (self.volume, self.diameter) {
            (Some(volume), _) => volume,
            (None, Some(diameter)) => volume_from_diameter(diameter),
            (None, None) => return Err(eyre!("[patient] needs either 'volume' or 'diameter'")),
        };
        Ok(Patient {
            subtype: self.subtype.clone(),
            ki67: self.ki67,
            volume,
            bsa: self.bsa,
            stage: self.stage,
            lymph_nodes_positive: self.lymph_nodes_positive,
            response: self.response.clone(),
        })
    }
}

/// The `[paths]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// JSON catalog merged over the built-in tables
    pub catalog: Option<String>,
    /// Folder receiving the output files, nothing is written if unset
    pub output: Option<String>,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            catalog: None,
            output: Some("outputs/".to_string()),
        }
    }
}

/// The `[log]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    /// An `EnvFilter` directive, e.g. `info` or `oncodose=debug`
    pub level: String,
    /// Log file, relative to the output folder
    pub file: Option<String>,
    pub stdout: bool,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: "info".to_string(),
            file: None,
            stdout: true,
        }
    }
}

impl Settings {
    /// Read settings from a TOML file
    ///
    /// Any field can be overridden with an environment variable such as
    /// `ONCODOSE_SIMULATION__HORIZON=120`.
    pub fn new(path: &str) -> Result<Self> {
        let parsed = eConfig::builder()
            .add_source(config::File::with_name(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("ONCODOSE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .wrap_err_with(|| format!("Failed to read settings from {}", path))?;

        let settings: Settings = parsed
            .try_deserialize()
            .wrap_err_with(|| format!("Invalid settings in {}", path))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.simulation.horizon > 0.0) {
            return Err(eyre!("simulation.horizon must be positive"));
        }
        if self.simulation.tumor_samples < 2 {
            return Err(eyre!("simulation.tumor_samples must be at least 2"));
        }
        if self.optimizer.dose_scales.iter().any(|s| !(*s > 0.0)) {
            return Err(eyre!("optimizer.dose_scales must be positive"));
        }
        if let Some(budget) = self.optimizer.time_budget_secs {
            if !(budget >= 0.0) || !budget.is_finite() {
                return Err(eyre!("optimizer.time_budget_secs must be a non-negative number"));
            }
        }
        Ok(())
    }

    /// Simulation options with the `[resistance]` section applied
    pub fn simulation_options(&self) -> SimulationOptions {
        self.simulation.clone().with_resistance(self.resistance)
    }

    pub fn set_horizon(&mut self, horizon: f64) {
        self.simulation.horizon = horizon;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.optimizer.mode = mode;
    }

    pub fn set_drug(&mut self, drug: &str) {
        self.optimizer.drug = Some(drug.to_string());
    }

    pub fn set_regimen(&mut self, regimen: &str) {
        self.optimizer.regimen = Some(regimen.to_string());
    }

    pub fn set_patient(&mut self, patient: &Patient) {
        self.patient = PatientSettings {
            subtype: patient.subtype.clone(),
            ki67: patient.ki67,
            volume: Some(patient.volume),
            diameter: None,
            bsa: patient.bsa,
            stage: patient.stage,
            lymph_nodes_positive: patient.lymph_nodes_positive,
            response: patient.response.clone(),
        };
    }

    pub fn set_output(&mut self, folder: Option<&str>) {
        self.paths.output = folder.map(str::to_string);
    }

    pub fn set_log_level(&mut self, level: &str) {
        self.log.level = level.to_string();
    }

    /// Write the settings as JSON, for the record of a run
    pub fn write(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)
            .wrap_err_with(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Integrator;

    fn write_toml(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("oncodose-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn defaults_fill_missing_sections() -> Result<()> {
        let path = write_toml(
            "defaults",
            r#"
            [patient]
            subtype = "HR+"
            ki67 = 12
            volume = 20.0
            "#,
        );
        let settings = Settings::new(&path)?;
        assert_eq!(settings.simulation, SimulationOptions::default());
        assert_eq!(settings.optimizer.mode, Mode::SingleRegimen);
        assert_eq!(settings.optimizer.dose_scales, DEFAULT_DOSE_SCALES.to_vec());
        assert_eq!(settings.log.level, "info");
        let patient = settings.patient.patient()?;
        assert_eq!(patient.subtype, "HR+");
        assert_eq!(patient.volume, 20.0);
        assert_eq!(patient.bsa, DEFAULT_BSA);
        Ok(())
    }

    #[test]
    fn every_section_is_read() -> Result<()> {
        let path = write_toml(
            "full",
            r#"
            [simulation]
            horizon = 84
            tumor_samples = 200
            integrator = "dop853"
            extrapolation = "flat"
            cache = false

            [resistance]
            enabled = true
            mutation_rate = 0.02
            resistance_strength = 0.3

            [optimizer]
            mode = "single_drug"
            objective = "nadir"
            drug = "docetaxel"
            fixed_interval = "q3w"
            parallel = true
            time_budget_secs = 2.5

            [patient]
            subtype = "TNBC"
            ki67 = 45
            diameter = 4.0
            stage = 3
            response = "PR"

            [paths]
            output = "run/"

            [log]
            level = "debug"
            file = "run.log"
            "#,
        );
        let settings = Settings::new(&path)?;
        assert_eq!(settings.simulation.horizon, 84.0);
        assert_eq!(settings.simulation.integrator, Integrator::Dop853);
        assert!(!settings.simulation.cache);
        assert_eq!(settings.simulation_options().resistance, ResistanceOptions::explicit(0.02, 0.3));
        assert_eq!(settings.optimizer.target(), Some("docetaxel"));
        let options = settings.optimizer.options();
        assert_eq!(options.objective, Objective::Nadir);
        assert_eq!(options.fixed_interval, Some(Interval::Q3w));
        assert_eq!(options.time_budget, Some(Duration::from_millis(2500)));
        let patient = settings.patient.patient()?;
        assert_eq!(patient.stage, Some(3));
        assert!((patient.volume - 33.510321638291124).abs() < 1e-9);
        assert_eq!(settings.paths.output.as_deref(), Some("run/"));
        assert_eq!(settings.log.file.as_deref(), Some("run.log"));
        Ok(())
    }

    #[test]
    fn patient_needs_a_size() {
        let settings = Settings::default();
        assert!(settings.patient.patient().is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = write_toml("invalid", "[simulation]\nhorizon = -1.0\n");
        assert!(Settings::new(&path).is_err());
        assert!(Settings::new("/nonexistent/oncodose.toml").is_err());
    }

    #[test]
    fn setters() {
        let mut settings = Settings::default();
        settings.set_mode(Mode::DoseScaling);
        settings.set_regimen("AC_T");
        settings.set_horizon(168.0);
        settings.set_patient(&Patient::new("HER2+", 25.0, 12.0).with_stage(2));
        settings.set_output(None);
        assert_eq!(settings.optimizer.target(), Some("AC_T"));
        assert_eq!(settings.simulation.horizon, 168.0);
        assert_eq!(settings.patient.patient().unwrap().stage, Some(2));
        assert!(settings.paths.output.is_none());
        assert!(settings.validate().is_ok());
    }
}
