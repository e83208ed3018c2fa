/*!
# MEGAlib pipeline

Cosima input spectrum, MEGAlib stage orchestration and post-processing of the
extracted Mimrec spectra and light curves into effective area, SED and
rebinned light curve tables

 */

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod config;
#[doc(inline)]
pub use config::Inputs;
pub mod interp;
pub use interp::{logspace, Bounds, Interp1d};
pub mod table;
pub use table::{write_tsv, Table, TableReader};
pub mod model;
pub use model::{make_cosima_input, CosimaSpectrum, StartingModel};
mod spectrum;
pub use spectrum::{ExtractedSpectrum, EXTRACTED_SPECTRUM};
pub mod effective_area;
pub use effective_area::{effective_area, EffectiveArea};
pub mod sed;
pub use sed::{sed, SedPoint};
pub mod lightcurve;
pub use lightcurve::{light_curve, LightCurveBin};
pub mod runner;
pub use runner::{CommandRunner, Invocation, Megalib, Shell, Stage};

/// Number of keV in one erg
pub const ERG_TO_KEV: f64 = 6.242e8;
/// Number of erg in one keV
pub const KEV_TO_ERG: f64 = 1.60218e-9;
/// Number of erg in one MeV
pub const MEV_TO_ERG: f64 = 1.60218e-6;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found or not readable")]
    File(#[from] std::io::Error),
    #[error("inputs YAML parsing failed")]
    Yaml(#[from] serde_yaml::Error),
    #[error("table writing failed")]
    Csv(#[from] csv::Error),
    #[error("invalid inputs: {0}")]
    Inputs(String),
    #[error("column {column:?} missing from {path:?}")]
    MissingColumn { column: String, path: PathBuf },
    #[error("{path:?} line {line}: cannot parse {value:?} as a number")]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{path:?} line {line}: expected {expected} fields, found {found}")]
    Ragged {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{0:?} has no data rows")]
    EmptyTable(PathBuf),
    #[error("interpolation needs at least 2 samples, found {0}")]
    Interpolation(usize),
    #[error("{x} is outside the interpolation range [{lo}, {hi}]")]
    OutOfRange { x: f64, lo: f64, hi: f64 },
    #[error("cannot rebin {original} bins into {requested} bins")]
    Rebin { original: usize, requested: usize },
    #[error("`{program}` failed with status {status:?}")]
    Tool {
        program: String,
        status: Option<i32>,
    },
}
pub type Result<T> = std::result::Result<T, PipelineError>;

/// SED data points
pub trait SedPoints {
    /// Returns the points with a significance above the detection threshold
    fn detections(&self) -> Vec<&SedPoint>;
    /// Returns the points reported as upper limits
    fn upper_limits(&self) -> Vec<&SedPoint>;
    /// Sum of the source counts over all energy bins
    fn total_counts(&self) -> f64;
    /// Sum of the background counts over all energy bins
    fn total_background(&self) -> f64;
}
impl SedPoints for Vec<SedPoint> {
    fn detections(&self) -> Vec<&SedPoint> {
        self.iter().filter(|p| p.detected).collect()
    }
    fn upper_limits(&self) -> Vec<&SedPoint> {
        self.iter().filter(|p| !p.detected).collect()
    }
    fn total_counts(&self) -> f64 {
        self.iter().map(|p| p.counts).sum()
    }
    fn total_background(&self) -> f64 {
        self.iter().map(|p| p.background).sum()
    }
}

/// Poisson significance of `counts` source events over `background` events
///
/// Returns NaN when both are zero
pub fn significance(counts: f64, background: f64) -> f64 {
    counts / (counts + background).sqrt()
}

/// Post-processing results of a Mimrec run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub wdir: PathBuf,
    /// Total effective area [cm^2]
    pub effective_area: f64,
    /// Total background counts
    pub background: f64,
    /// Number of detected source events
    pub detected: f64,
    pub sed: Vec<SedPoint>,
    pub light_curve: Vec<LightCurveBin>,
}

/// Computes the effective area, the SED and the light curve of the Mimrec run in `wdir`
pub fn process_run<P: AsRef<Path>>(
    inputs: &Inputs,
    home: &Path,
    wdir: P,
    lc_bins: usize,
    model: Option<&StartingModel>,
) -> Result<RunSummary> {
    let wdir = home.join(wdir);
    let aeff = effective_area(inputs, home, &wdir)?;
    let sed = sed(inputs, home, &wdir, model)?;
    let light_curve = light_curve(&wdir, lc_bins)?;
    Ok(RunSummary {
        wdir,
        effective_area: aeff.totals.area,
        background: aeff.totals.background,
        detected: sed.total_counts(),
        sed,
        light_curve,
    })
}

/// Processes the Mimrec runs in parallel
///
/// A failed run does not stop the others
pub fn process_runs<P: AsRef<Path> + Sync>(
    inputs: &Inputs,
    home: &Path,
    wdirs: &[P],
    lc_bins: usize,
    model: Option<&StartingModel>,
) -> Vec<Result<RunSummary>> {
    wdirs
        .par_iter()
        .map(|wdir| process_run(inputs, home, wdir, lc_bins, model))
        .collect()
}
