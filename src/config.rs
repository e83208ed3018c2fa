use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

fn background_time() -> f64 {
    7200.
}
fn sensitivity_time() -> f64 {
    9.4608e7
}
fn scan_fraction() -> f64 {
    0.2
}
fn significance_threshold() -> f64 {
    3.
}
fn macro_dir() -> PathBuf {
    PathBuf::from("macros")
}

/// Main pipeline inputs
///
/// Loaded from a YAML file, e.g.
/// ```yaml
/// name: TXS_0506
/// geometry_file: /opt/megalib/geometry/AMEGO.geo.setup
/// spectrum_file: Inputs/Cosima_input_spectrum.dat
/// lightcurve_file: Inputs/lightcurve.dat
/// source_file: Inputs/TXS_0506.source
/// background_tra_file: Inputs/background.inc1.id1.tra
/// observation_time: 10368000.0
/// area: 70685.83470577
/// mission: AMEGO
/// plots: false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inputs {
    /// Simulation name, sets the cosima and revan output file names
    pub name: String,
    pub geometry_file: PathBuf,
    /// Cosima spectrum, also the injected model for post-processing
    pub spectrum_file: PathBuf,
    #[serde(default)]
    pub lightcurve_file: Option<PathBuf>,
    pub source_file: PathBuf,
    pub background_tra_file: PathBuf,
    /// Observation time [s]
    pub observation_time: f64,
    /// Area of the surrounding sphere [cm^2]
    pub area: f64,
    pub mission: String,
    /// Not used, no figures are made
    #[serde(default)]
    pub plots: bool,
    /// Duration of the simulated background [s]
    #[serde(default = "background_time")]
    pub background_time: f64,
    /// Duration the mission sensitivity is computed for [s]
    #[serde(default = "sensitivity_time")]
    pub sensitivity_time: f64,
    /// Fraction of the time the source is in the field of view in scanning mode
    #[serde(default = "scan_fraction")]
    pub scan_fraction: f64,
    #[serde(default = "significance_threshold")]
    pub significance_threshold: f64,
    /// Directory of the ROOT extraction macros
    #[serde(default = "macro_dir")]
    pub macro_dir: PathBuf,
}

impl Inputs {
    /// Loads the inputs from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading {path:?}");
        let file = File::open(path)?;
        let inputs: Self = serde_yaml::from_reader(file)?;
        inputs.validate()?;
        Ok(inputs)
    }
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PipelineError::Inputs("name must not be empty".into()));
        }
        for (key, value) in [
            ("observation_time", self.observation_time),
            ("area", self.area),
            ("background_time", self.background_time),
            ("sensitivity_time", self.sensitivity_time),
        ] {
            if !(value > 0.) {
                return Err(PipelineError::Inputs(format!(
                    "{key} must be > 0, found {value}"
                )));
            }
        }
        if !(self.scan_fraction > 0. && self.scan_fraction <= 1.) {
            return Err(PipelineError::Inputs(format!(
                "scan_fraction must be in (0, 1], found {}",
                self.scan_fraction
            )));
        }
        Ok(())
    }
    /// Background scaling from the simulated to the observation time
    pub fn background_scale(&self) -> f64 {
        self.observation_time / self.background_time
    }
    /// Sensitivity scaling from the scanning survey to this observation
    pub fn sensitivity_scale(&self) -> f64 {
        (self.sensitivity_time * self.scan_fraction / self.observation_time).sqrt()
    }
    /// Directory with the mission performance curves
    pub fn performance_dir(&self, home: &Path) -> PathBuf {
        home.join(format!("{}_Performance", self.mission))
    }
    /// Simulation output file with the given extension
    pub fn output_file(&self, extension: &str) -> String {
        format!("{}.inc1.id1.{extension}", self.name)
    }
}
