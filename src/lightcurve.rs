//! Light curve rebinning
//!
//! The Mimrec light curve is rebinned into a coarser time binning and converted
//! into a photon flux with the total effective area.
//! The background is assumed constant over the observation.

use crate::{
    effective_area::Totals,
    significance,
    table::{write_tsv, Table},
    PipelineError, Result,
};
use serde::Serialize;
use std::path::Path;

/// Name of the light curve table written by `ExtractLightCurve.cxx`
pub const EXTRACTED_LC: &str = "extracted_lc.dat";
pub const REBINNED_LC: &str = "Rebinned_LC_summary.dat";

/// Mimrec light curve
#[derive(Debug, Clone, Default)]
pub struct ExtractedLightCurve {
    /// Bin center [s]
    pub center: Vec<f64>,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    /// Bin width [s]
    pub width: Vec<f64>,
    /// Count rate [ct/s]
    pub rate: Vec<f64>,
}
impl ExtractedLightCurve {
    /// Reads `extracted_lc.dat` from the Mimrec run directory `wdir`
    pub fn from_run<P: AsRef<Path>>(wdir: P) -> Result<Self> {
        let table = Table::read(wdir.as_ref().join(EXTRACTED_LC))?;
        Ok(Self {
            center: table.column("t_center[s]")?.to_vec(),
            low: table.column("t_low[s]")?.to_vec(),
            high: table.column("t_high[s]")?.to_vec(),
            width: table.column("t_width[s]")?.to_vec(),
            rate: table.column("ct/s")?.to_vec(),
        })
    }
    pub fn len(&self) -> usize {
        self.center.len()
    }
    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }
    /// Counts per bin
    pub fn counts(&self) -> Vec<f64> {
        self.rate
            .iter()
            .zip(&self.width)
            .map(|(r, w)| r * w)
            .collect()
    }
    /// Rebins the light curve into `n_bin` bins
    ///
    /// Each new bin merges `len/n_bin` consecutive bins, the remaining bins at the end are discarded.
    /// The rates are converted into photon fluxes with the total effective area and
    /// the total background is shared evenly between the new bins.
    pub fn rebin(&self, n_bin: usize, totals: &Totals) -> Result<Vec<LightCurveBin>> {
        let merge = if n_bin > 0 { self.len() / n_bin } else { 0 };
        if merge == 0 {
            return Err(PipelineError::Rebin {
                original: self.len(),
                requested: n_bin,
            });
        }
        let background = totals.background / n_bin as f64;
        log::info!("Background per bin: {background}");
        let counts = self.counts();
        Ok((0..n_bin)
            .map(|i| {
                let range = i * merge..(i + 1) * merge;
                let time = (self.center[range.start] * self.center[range.end - 1]).sqrt();
                let width: f64 = self.width[range.clone()].iter().sum();
                let counts: f64 = counts[range].iter().sum();
                let rate = counts / width;
                let rate_error = (counts + background).sqrt() / width;
                LightCurveBin {
                    bin: i,
                    sigma: significance(counts, background),
                    flux: rate / totals.area,
                    error: rate_error / totals.area,
                    time,
                    width,
                    counts,
                    rate,
                    rate_error,
                }
            })
            .collect())
    }
}

/// A rebinned light curve bin
#[derive(Debug, Clone, Serialize)]
pub struct LightCurveBin {
    pub bin: usize,
    pub sigma: f64,
    /// Photon flux
    #[serde(rename = "flux[ph/cm^2/s]")]
    pub flux: f64,
    #[serde(rename = "error[ph/cm^2/s]")]
    pub error: f64,
    /// Geometric mean of the first and last merged bin centers
    #[serde(rename = "time[s]")]
    pub time: f64,
    #[serde(skip)]
    pub width: f64,
    #[serde(skip)]
    pub counts: f64,
    #[serde(skip)]
    pub rate: f64,
    #[serde(skip)]
    pub rate_error: f64,
}

/// Rebins the light curve of the Mimrec run in `wdir` into `n_bin` bins
///
/// The effective area must have been computed first.
pub fn light_curve<P: AsRef<Path>>(wdir: P, n_bin: usize) -> Result<Vec<LightCurveBin>> {
    let wdir = wdir.as_ref();
    log::info!("Rebinning the light curve of {wdir:?} into {n_bin} bins ...");
    let lc = ExtractedLightCurve::from_run(wdir)?;
    log::info!("LC total counts: {}", lc.counts().iter().sum::<f64>());
    let totals = Totals::from_run(wdir)?;
    let bins = lc.rebin(n_bin, &totals)?;
    write_tsv(wdir.join(REBINNED_LC), &bins)?;
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lc() -> ExtractedLightCurve {
        // 7 bins of 10s
        let low: Vec<f64> = (0..7).map(|i| 10. * i as f64).collect();
        ExtractedLightCurve {
            center: low.iter().map(|t| t + 5.).collect(),
            high: low.iter().map(|t| t + 10.).collect(),
            low,
            width: vec![10.; 7],
            rate: vec![1., 1., 1., 3., 3., 3., 100.],
        }
    }

    #[test]
    fn rebin() {
        let totals = Totals {
            area: 2.,
            background: 12.,
        };
        let bins = lc().rebin(2, &totals).unwrap();
        assert_eq!(bins.len(), 2);
        // last bin is dropped
        assert_relative_eq!(bins[0].counts, 30.);
        assert_relative_eq!(bins[1].counts, 90.);
        assert_relative_eq!(bins[0].width, 30.);
        assert_relative_eq!(bins[0].time, (5f64 * 25.).sqrt());
        assert_relative_eq!(bins[1].time, (35f64 * 55.).sqrt());
        assert_relative_eq!(bins[0].sigma, 30. / 36f64.sqrt());
        assert_relative_eq!(bins[1].rate, 3.);
        assert_relative_eq!(bins[1].rate_error, 96f64.sqrt() / 30.);
        assert_relative_eq!(bins[1].flux, 1.5);
        assert_relative_eq!(bins[1].error, 96f64.sqrt() / 60.);
    }

    #[test]
    fn rebin_one_bin() {
        let totals = Totals {
            area: 1.,
            background: 0.,
        };
        let bins = lc().rebin(1, &totals).unwrap();
        assert_relative_eq!(bins[0].counts, 1120.);
        assert_relative_eq!(bins[0].sigma, 1120f64.sqrt());
        assert_relative_eq!(bins[0].time, (5f64 * 65.).sqrt());
    }

    #[test]
    fn too_many_bins() {
        let totals = Totals {
            area: 1.,
            background: 0.,
        };
        assert!(matches!(
            lc().rebin(8, &totals),
            Err(PipelineError::Rebin {
                original: 7,
                requested: 8
            })
        ));
        assert!(lc().rebin(0, &totals).is_err());
    }
}
