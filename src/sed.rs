//! Spectral energy distribution
//!
//! The source counts are converted into E^2 dN/dE with the effective area.
//! Bins with a significance below the threshold are reported as upper limits.

use crate::{
    config::Inputs,
    effective_area::EffectiveArea,
    model::{CosimaSpectrum, StartingModel},
    significance,
    spectrum::ExtractedSpectrum,
    table::{write_tsv, TableReader},
    Result, SedPoints, KEV_TO_ERG, MEV_TO_ERG,
};
use serde::Serialize;
use std::{fs, path::Path};

pub const SED: &str = "SED.dat";
pub const SED_MODEL: &str = "SED_model.dat";
pub const SED_SENSITIVITY: &str = "SED_sensitivity.dat";
pub const SED_SUMMARY: &str = "SED_summary.txt";

/// An SED energy bin
#[derive(Debug, Clone, Serialize)]
pub struct SedPoint {
    /// Geometric mean of the bin edges
    #[serde(rename = "energy[keV]")]
    pub energy: f64,
    #[serde(rename = "energy_low_error[keV]")]
    pub energy_low_error: f64,
    #[serde(rename = "energy_high_error[keV]")]
    pub energy_high_error: f64,
    /// E^2 dN/dE
    #[serde(rename = "flux[erg/cm^2/s]")]
    pub flux: f64,
    #[serde(rename = "flux_error[erg/cm^2/s]")]
    pub flux_error: f64,
    /// Flux upper bound, `flux + flux_error`
    #[serde(rename = "upper_limit[erg/cm^2/s]")]
    pub upper_limit: f64,
    /// Source counts
    pub counts: f64,
    /// Background counts scaled to the observation time
    pub background: f64,
    pub sigma: f64,
    pub detected: bool,
}

#[derive(Serialize)]
struct CurveRow {
    #[serde(rename = "energy[keV]")]
    energy: f64,
    #[serde(rename = "flux[erg/cm^2/s]")]
    flux: f64,
}

/// Computes the SED of the Mimrec run in `wdir`
///
/// The effective area must have been computed first.
/// The model SED is the Cosima input spectrum unless another `model` is given.
pub fn sed<P: AsRef<Path>>(
    inputs: &Inputs,
    home: &Path,
    wdir: P,
    model: Option<&StartingModel>,
) -> Result<Vec<SedPoint>> {
    let wdir = wdir.as_ref();
    log::info!("Computing the SED of {wdir:?} ...");

    let data = ExtractedSpectrum::from_run(wdir)?;
    let energy = data.energy();
    let counts = data.source_counts();
    let background = data.background_counts(inputs.background_scale());
    log::info!("time scaling factor: {}", inputs.background_scale());
    log::debug!("background counts list: {background:?}");

    let area = EffectiveArea::from_run(wdir)?
        .interpolant()?
        .eval_all(&energy)?;

    let points: Vec<SedPoint> = data
        .energy_errors()
        .into_iter()
        .enumerate()
        .map(|(i, (energy_low_error, energy_high_error))| {
            let (n, b) = (counts[i], background[i]);
            let e = energy[i];
            let sigma = significance(n, b);
            let to_flux = e * e * KEV_TO_ERG / (area[i] * inputs.observation_time);
            let flux = data.source[i] * to_flux;
            let flux_error = (n + b).sqrt() / data.width[i] * to_flux;
            SedPoint {
                energy: e,
                energy_low_error,
                energy_high_error,
                flux,
                flux_error,
                upper_limit: flux + flux_error,
                counts: n,
                background: b,
                sigma,
                detected: sigma >= inputs.significance_threshold,
            }
        })
        .collect();

    log::info!("Total simulated counts: {}", points.total_counts());
    log::info!("Total background counts: {}", points.total_background());
    log::info!(
        "significance (sigma) of SED bins: {:?}",
        points.iter().map(|p| p.sigma).collect::<Vec<_>>()
    );
    log::info!(
        "{} detections, {} upper limits",
        points.detections().len(),
        points.upper_limits().len()
    );

    write_tsv(wdir.join(SED), &points)?;
    model_curve(inputs, home, wdir, model)?;
    sensitivity_curve(inputs, home, wdir)?;
    fs::write(wdir.join(SED_SUMMARY), summary(&points))?;
    Ok(points)
}

/// Saves the model SED
fn model_curve(
    inputs: &Inputs,
    home: &Path,
    wdir: &Path,
    model: Option<&StartingModel>,
) -> Result<()> {
    let (energy, flux) = match model {
        Some(model) => (model.energy.clone(), model.flux.clone()),
        None => {
            let spectrum = CosimaSpectrum::from_file(home.join(&inputs.spectrum_file))?;
            let flux = spectrum.sed();
            (spectrum.energy, flux)
        }
    };
    write_tsv(
        wdir.join(SED_MODEL),
        energy
            .into_iter()
            .zip(flux)
            .map(|(energy, flux)| CurveRow { energy, flux }),
    )
}

/// Saves the mission continuum sensitivity scaled to the observation time
///
/// Returns false if `<mission>_Performance/<mission>_sensitivity.txt` does not exist
fn sensitivity_curve(inputs: &Inputs, home: &Path, wdir: &Path) -> Result<bool> {
    let path = inputs
        .performance_dir(home)
        .join(format!("{}_sensitivity.txt", inputs.mission));
    if !path.is_file() {
        log::warn!("{path:?} not found, skipping");
        return Ok(false);
    }
    let table = TableReader::new(&path)
        .skip_rows(1)
        .names(["energy", "flux"])
        .read()?;
    let scale = MEV_TO_ERG * inputs.sensitivity_scale();
    write_tsv(
        wdir.join(SED_SENSITIVITY),
        table
            .column("energy")?
            .iter()
            .zip(table.column("flux")?)
            .map(|(e, f)| CurveRow {
                energy: e * 1e3,
                flux: f * scale,
            }),
    )?;
    Ok(true)
}

/// SED text summary
pub fn summary(points: &[SedPoint]) -> String {
    let counts: Vec<f64> = points.iter().map(|p| p.counts).collect();
    let counts_error: Vec<f64> = counts.iter().map(|n| n.sqrt()).collect();
    let sigma: Vec<f64> = points.iter().map(|p| p.sigma).collect();
    let background: Vec<f64> = points.iter().map(|p| p.background).collect();
    let mut text = String::from("Summary of SED calculation:");
    for (title, value) in [
        ("Total simulated counts", format!("{:?}", counts.iter().sum::<f64>())),
        ("Counts list", format!("{counts:?}")),
        ("Counts Error list (standard)", format!("{counts_error:?}")),
        ("significance (sigma) of SED bins", format!("{sigma:?}")),
        ("source counts", format!("{counts:?}")),
        ("background counts", format!("{background:?}")),
    ] {
        text.push_str(&format!("\n\n{title}:\n{value}"));
    }
    text.push('\n');
    text
}
