use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use eyre::{Result, WrapErr};
use serde::Serialize;

use crate::optimizer::{OptimizationResult, SearchOutcome, SearchStats};
use crate::patient::Patient;
use crate::regimen::PkPdProfiles;
use crate::simulator::tumor::Trajectory;

pub const TRAJECTORY_FILE: &str = "trajectory.csv";
pub const PKPD_FILE: &str = "pkpd.csv";
pub const RESULT_FILE: &str = "result.json";

/// A file opened for writing inside an output folder, creating the folder
/// first if needed
pub struct OutputFile {
    file: File,
    relative_path: PathBuf,
}

impl OutputFile {
    pub fn new(folder: &str, file_name: &str) -> Result<Self> {
        let relative_path = Path::new(&folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&relative_path)
            .with_context(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_owned(self) -> File {
        self.file
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}

/// Write `time`, `volume` and one column per tumor compartment
pub fn write_trajectory(folder: &str, trajectory: &Trajectory) -> Result<PathBuf> {
    let outputfile = OutputFile::new(folder, TRAJECTORY_FILE)?;
    let path = outputfile.relative_path().to_path_buf();
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(outputfile.file_owned());

    let columns = trajectory.components.columns();
    let mut header = vec!["time", "volume"];
    header.extend(columns.iter().map(|(name, _)| *name));
    writer.write_record(&header)?;

    for i in 0..trajectory.len() {
        let mut row = vec![trajectory.time[i].to_string(), trajectory.volume[i].to_string()];
        row.extend(columns.iter().map(|(_, series)| series[i].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    tracing::debug!("Trajectory written to {:?}", path);
    Ok(path)
}

/// Write concentration and effect of every drug plus the total effect
pub fn write_pkpd(folder: &str, profiles: &PkPdProfiles) -> Result<PathBuf> {
    let outputfile = OutputFile::new(folder, PKPD_FILE)?;
    let path = outputfile.relative_path().to_path_buf();
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(outputfile.file_owned());

    writer.write_field("time")?;
    for series in &profiles.drugs {
        writer.write_field(format!("{}_concentration", series.drug))?;
        writer.write_field(format!("{}_effect", series.drug))?;
    }
    writer.write_field("total_effect")?;
    writer.write_record(None::<&[u8]>)?;

    for (i, t) in profiles.time.iter().enumerate() {
        writer.write_field(t.to_string())?;
        for series in &profiles.drugs {
            writer.write_field(series.concentration[i].to_string())?;
            writer.write_field(series.effect[i].to_string())?;
        }
        writer.write_field(profiles.total_effect[i].to_string())?;
        writer.write_record(None::<&[u8]>)?;
    }
    writer.flush()?;
    tracing::debug!("PK/PD profiles written to {:?}", path);
    Ok(path)
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeRecord<'a> {
    Found {
        result: &'a OptimizationResult,
    },
    NoAdmissibleCombination {
        stats: &'a SearchStats,
    },
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    created: String,
    patient: &'a Patient,
    outcome: OutcomeRecord<'a>,
}

/// Write the search outcome and the patient it was run for as JSON
pub fn write_result(folder: &str, patient: &Patient, outcome: &SearchOutcome) -> Result<PathBuf> {
    let outcome = match outcome {
        SearchOutcome::Found(result) => OutcomeRecord::Found { result },
        SearchOutcome::NoAdmissibleCombination(stats) => OutcomeRecord::NoAdmissibleCombination { stats },
    };
    let record = ResultRecord {
        created: chrono::Local::now().to_rfc3339(),
        patient,
        outcome,
    };
    let outputfile = OutputFile::new(folder, RESULT_FILE)?;
    let path = outputfile.relative_path().to_path_buf();
    serde_json::to_writer_pretty(outputfile.file_owned(), &record)
        .wrap_err_with(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// Write every output of a run: the result record always, the trajectory and
/// PK/PD profiles when a candidate was found
pub fn write_outputs(folder: &str, patient: &Patient, outcome: &SearchOutcome) -> Result<Vec<PathBuf>> {
    let mut written = vec![write_result(folder, patient, outcome)?];
    if let SearchOutcome::Found(result) = outcome {
        written.push(write_trajectory(folder, &result.trajectory)?);
        let profiles = result.effect.profiles(&result.trajectory.time);
        written.push(write_pkpd(folder, &profiles)?);
    }
    tracing::info!("Results written to {}", folder);
    Ok(written)
}
