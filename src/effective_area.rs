//! Effective area from the simulated source counts
//!
//! The injected model is converted into a number of generated events per keV,
//! `dN/dE T S`, with `T` the observation time and `S` the area of the surrounding sphere.
//! The effective area is the ratio of the detected to the generated events times `S`.

use crate::{
    config::Inputs,
    interp::{Bounds, Interp1d},
    model::CosimaSpectrum,
    spectrum::ExtractedSpectrum,
    table::{write_tsv, Table, TableReader},
    Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Energy dependent effective area table
pub const AEFF: &str = "Aeff.dat";
/// Total effective area and background counts, used to normalize the light curve
pub const AEFF_TOTAL: &str = "total_Aeff_and_BG_for_LC.dat";
/// Mission effective area curves
pub const AEFF_REFERENCE: &str = "Aeff_reference.dat";

/// Mission effective area curves by event type
const REFERENCES: [&str; 4] = [
    "untracked_compton",
    "untracked_compton_silicon",
    "tracked_compton",
    "pair",
];

#[derive(Serialize)]
struct AeffRow {
    #[serde(rename = "energy[keV]")]
    energy: f64,
    #[serde(rename = "A_eff[cm^2]")]
    area: f64,
}

#[derive(Serialize)]
struct ReferenceRow<'a> {
    curve: &'a str,
    #[serde(rename = "energy[keV]")]
    energy: f64,
    #[serde(rename = "A_eff[cm^2]")]
    area: f64,
}

/// Total effective area and background counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Totals {
    #[serde(rename = "Aeff_total[cm^2]")]
    pub area: f64,
    #[serde(rename = "BG_total[ph]")]
    pub background: f64,
}
impl Totals {
    /// Reads the totals saved in the Mimrec run directory `wdir`
    pub fn from_run<P: AsRef<Path>>(wdir: P) -> Result<Self> {
        let table = Table::read(wdir.as_ref().join(AEFF_TOTAL))?;
        Ok(Self {
            area: table.column("Aeff_total[cm^2]")?[0],
            background: table.column("BG_total[ph]")?[0],
        })
    }
}

/// Effective area
#[derive(Debug, Clone)]
pub struct EffectiveArea {
    /// Geometric mean of the energy bins [keV]
    pub energy: Vec<f64>,
    /// Effective area [cm^2]
    pub area: Vec<f64>,
    pub totals: Totals,
}
impl EffectiveArea {
    /// Reads the effective area and the totals saved in the Mimrec run directory `wdir`
    pub fn from_run<P: AsRef<Path>>(wdir: P) -> Result<Self> {
        let wdir = wdir.as_ref();
        let table = TableReader::new(wdir.join(AEFF))
            .skip_rows(1)
            .names(["energy", "area"])
            .read()?;
        Ok(Self {
            energy: table.column("energy")?.to_vec(),
            area: table.column("area")?.to_vec(),
            totals: Totals::from_run(wdir)?,
        })
    }
    /// Linear interpolation, and extrapolation, of the effective area
    pub fn interpolant(&self) -> Result<Interp1d> {
        Interp1d::new(&self.energy, &self.area, Bounds::Extrapolate)
    }
}

/// Computes the effective area of the Mimrec run in `wdir`
///
/// The results are saved in `wdir`
pub fn effective_area<P: AsRef<Path>>(inputs: &Inputs, home: &Path, wdir: P) -> Result<EffectiveArea> {
    let wdir = wdir.as_ref();
    log::info!("Computing the effective area of {wdir:?} ...");

    let model = CosimaSpectrum::from_file(home.join(&inputs.spectrum_file))?;
    let exposure = inputs.observation_time * inputs.area;
    let generated = Interp1d::new(
        &model.energy,
        &model.flux.iter().map(|f| f * exposure).collect::<Vec<_>>(),
        Bounds::Error,
    )?;

    let data = ExtractedSpectrum::from_run(wdir)?;
    let energy = data.energy();
    let model_counts = generated.eval_all(&energy)?;

    let area: Vec<f64> = data
        .source
        .iter()
        .zip(&model_counts)
        .map(|(s, m)| s / m * inputs.area)
        .collect();

    let detected = data.total_source_counts();
    let expected: f64 = model_counts.iter().zip(&data.width).map(|(m, w)| m * w).sum();
    let background: f64 = data
        .background_counts(inputs.background_scale())
        .into_iter()
        .sum();
    let totals = Totals {
        area: detected / expected * inputs.area,
        background,
    };
    log::info!("total # of detected events: {detected}");
    log::info!("total # of background events: {background}");
    log::info!("total effective area: {:.3}cm^2", totals.area);

    write_tsv(wdir.join(AEFF_TOTAL), [totals])?;
    write_tsv(
        wdir.join(AEFF),
        energy
            .iter()
            .zip(&area)
            .map(|(&energy, &area)| AeffRow { energy, area }),
    )?;
    reference_curves(inputs, home, wdir)?;

    Ok(EffectiveArea {
        energy,
        area,
        totals,
    })
}

/// Collects the mission effective area curves into `wdir`
///
/// The curves are read from `<mission>_Performance/<mission>_effective_area_<type>.txt`,
/// missing curves are skipped
fn reference_curves(inputs: &Inputs, home: &Path, wdir: &Path) -> Result<usize> {
    let performance = inputs.performance_dir(home);
    let mut rows = Vec::new();
    let mut n_curve = 0;
    for curve in REFERENCES {
        let path = performance.join(format!("{}_effective_area_{curve}.txt", inputs.mission));
        if !path.is_file() {
            log::warn!("{path:?} not found, skipping");
            continue;
        }
        let table = TableReader::new(&path)
            .skip_rows(1)
            .names(["energy", "effective_area"])
            .read()?;
        rows.extend(
            table
                .column("energy")?
                .iter()
                .zip(table.column("effective_area")?)
                .map(|(&e, &area)| ReferenceRow {
                    curve,
                    energy: e * 1e3,
                    area,
                }),
        );
        n_curve += 1;
    }
    if n_curve > 0 {
        write_tsv(wdir.join(AEFF_REFERENCE), rows)?;
    }
    Ok(n_curve)
}
