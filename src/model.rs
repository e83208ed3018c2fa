//! Source models
//!
//! A [StartingModel] is the theoretical SED, E^2 dN/dE in erg/cm^2/s versus energy in eV.
//! A [CosimaSpectrum] is the differential photon flux, dN/dE in ph/cm^2/s/keV versus
//! energy in keV, in the `DP` rows format of the Cosima spectrum files.

use crate::{
    interp::{logspace, Bounds, Interp1d},
    table::{write_tsv, Table},
    PipelineError, Result, ERG_TO_KEV, KEV_TO_ERG,
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Name of the Cosima spectrum file written by [make_cosima_input]
pub const COSIMA_INPUT: &str = "Cosima_input_spectrum.dat";

/// Theoretical source SED
#[derive(Debug, Clone, Default)]
pub struct StartingModel {
    /// Energy [keV]
    pub energy: Vec<f64>,
    /// E^2 dN/dE [erg/cm^2/s]
    pub flux: Vec<f64>,
}
impl StartingModel {
    /// Reads the columns `energy[eV]` and `flux[erg/cm^2/s]`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = Table::read(path)?;
        Ok(Self {
            energy: table
                .column("energy[eV]")?
                .iter()
                .map(|e| e * 1e-3)
                .collect(),
            flux: table.column("flux[erg/cm^2/s]")?.to_vec(),
        })
    }
    /// Differential photon flux dN/dE [ph/cm^2/s/keV]
    pub fn photon_flux(&self) -> Vec<f64> {
        self.energy
            .iter()
            .zip(&self.flux)
            .map(|(e, f)| {
                let e_erg = e / ERG_TO_KEV;
                f / (e_erg * e_erg) / ERG_TO_KEV
            })
            .collect()
    }
}

#[derive(Serialize)]
struct CosimaRow {
    rows: &'static str,
    energy: f64,
    diff_flux: f64,
}

/// Cosima differential photon flux spectrum
#[derive(Debug, Clone, Default)]
pub struct CosimaSpectrum {
    /// Energy [keV]
    pub energy: Vec<f64>,
    /// dN/dE [ph/cm^2/s/keV]
    pub flux: Vec<f64>,
}
impl CosimaSpectrum {
    /// Reads the `DP <energy> <flux>` rows of a Cosima spectrum file
    ///
    /// Any other line is ignored
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut spectrum = Self::default();
        for (i, line) in contents.lines().enumerate() {
            let mut fields = line.split_whitespace();
            if fields.next() != Some("DP") {
                continue;
            }
            let mut value = || -> Result<f64> {
                let field = fields.next().unwrap_or_default();
                field.parse().map_err(|_| PipelineError::Parse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    value: field.to_string(),
                })
            };
            let energy = value()?;
            let flux = value()?;
            spectrum.energy.push(energy);
            spectrum.flux.push(flux);
        }
        if spectrum.energy.is_empty() {
            return Err(PipelineError::EmptyTable(path.to_path_buf()));
        }
        Ok(spectrum)
    }
    /// Writes the spectrum to a tab separated file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_tsv(
            path,
            self.energy.iter().zip(&self.flux).map(|(&e, &f)| CosimaRow {
                rows: "DP",
                energy: e,
                diff_flux: f,
            }),
        )
    }
    /// Returns the E^2 dN/dE [erg/cm^2/s]
    pub fn sed(&self) -> Vec<f64> {
        self.energy
            .iter()
            .zip(&self.flux)
            .map(|(e, f)| e * e * f * KEV_TO_ERG)
            .collect()
    }
    /// Linear interpolation of the photon flux
    pub fn interpolant(&self) -> Result<Interp1d> {
        Interp1d::new(&self.energy, &self.flux, Bounds::Error)
    }
}

/// The Cosima input spectrum
#[derive(Debug, Clone)]
pub struct CosimaInput {
    /// Integral flux between 100 keV and 1 GeV [ph/cm^2/s]
    pub integral_flux: f64,
    pub spectrum: CosimaSpectrum,
    pub path: PathBuf,
}

/// Converts the `model` into the Cosima input spectrum
///
/// The photon flux is sampled on 40 log spaced energies from 100 keV to 1 GeV (excluded)
/// and saved into `out_dir`
pub fn make_cosima_input<P: AsRef<Path>>(model: &StartingModel, out_dir: P) -> Result<CosimaInput> {
    log::info!("Making the Cosima input spectrum ...");
    let ph_flux = Interp1d::new(&model.energy, &model.photon_flux(), Bounds::Error)?;

    let integral_flux = ph_flux.integrate(1e2, 1e6)?;
    log::info!("integral flux between 100 keV - 1 GeV: {integral_flux:e} ph/cm^2/s");

    let energy = logspace(2., 6., 40, false);
    let flux = ph_flux.eval_all(&energy)?;
    let spectrum = CosimaSpectrum { energy, flux };

    let path = out_dir.as_ref().join(COSIMA_INPUT);
    spectrum.to_file(&path)?;
    Ok(CosimaInput {
        integral_flux,
        spectrum,
        path,
    })
}
