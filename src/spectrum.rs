use crate::{table::Table, Result};
use std::path::Path;

/// Name of the spectrum table written by `ExtractSpectrum.cxx`
pub const EXTRACTED_SPECTRUM: &str = "extracted_spectrum.dat";

/// Mimrec source and background count spectra
///
/// Extracted from the Mimrec ROOT histograms, one row per energy bin
#[derive(Debug, Clone)]
pub struct ExtractedSpectrum {
    /// Bin center [keV]
    pub center: Vec<f64>,
    /// Bin lower edge [keV]
    pub low: Vec<f64>,
    /// Bin upper edge [keV]
    pub high: Vec<f64>,
    /// Bin width [keV]
    pub width: Vec<f64>,
    /// Source counts per keV
    pub source: Vec<f64>,
    /// Background counts per keV for the simulated background time
    pub background: Vec<f64>,
}

impl ExtractedSpectrum {
    /// Reads `extracted_spectrum.dat` from the Mimrec run directory `wdir`
    pub fn from_run<P: AsRef<Path>>(wdir: P) -> Result<Self> {
        Self::from_file(wdir.as_ref().join(EXTRACTED_SPECTRUM))
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = Table::read(path)?;
        Ok(Self {
            center: table.column("EC[keV]")?.to_vec(),
            low: table.column("EL[keV]")?.to_vec(),
            high: table.column("EH[keV]")?.to_vec(),
            width: table.column("BW[keV]")?.to_vec(),
            source: table.column("src_ct/keV")?.to_vec(),
            background: table.column("bg_ct/keV")?.to_vec(),
        })
    }
    /// Returns the number of energy bins
    pub fn len(&self) -> usize {
        self.width.len()
    }
    pub fn is_empty(&self) -> bool {
        self.width.is_empty()
    }
    /// Geometric mean of the bin edges [keV]
    pub fn energy(&self) -> Vec<f64> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(l, h)| (l * h).sqrt())
            .collect()
    }
    /// Bin energy errors, (`E-EL`,`EH-E`), about the geometric mean [keV]
    pub fn energy_errors(&self) -> Vec<(f64, f64)> {
        self.energy()
            .into_iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(e, (l, h))| (e - l, h - e))
            .collect()
    }
    /// Source counts per bin
    pub fn source_counts(&self) -> Vec<f64> {
        self.source
            .iter()
            .zip(&self.width)
            .map(|(s, w)| s * w)
            .collect()
    }
    /// Background counts per bin, scaled by `scale`
    pub fn background_counts(&self, scale: f64) -> Vec<f64> {
        self.background
            .iter()
            .zip(&self.width)
            .map(|(b, w)| b * scale * w)
            .collect()
    }
    /// Total number of source counts
    pub fn total_source_counts(&self) -> f64 {
        self.source_counts().into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    #[test]
    fn from_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(EXTRACTED_SPECTRUM),
            "EC[keV] EL[keV] EH[keV] BW[keV] src_ct/keV bg_ct/keV\n\
             550\t100\t1000\t900\t2\t0.01\n\
             5500\t1000\t10000\t9000\t0.1\t0.001\n",
        )
        .unwrap();
        let spectrum = ExtractedSpectrum::from_run(dir.path()).unwrap();
        assert_eq!(spectrum.len(), 2);
        let energy = spectrum.energy();
        assert_relative_eq!(energy[0], 1e5f64.sqrt());
        assert_relative_eq!(energy[1], 1e7f64.sqrt());
        let (lo, hi) = spectrum.energy_errors()[0];
        assert_relative_eq!(lo, 1e5f64.sqrt() - 100.);
        assert_relative_eq!(hi, 1000. - 1e5f64.sqrt());
        assert_eq!(spectrum.source_counts(), vec![1800., 900.]);
        assert_relative_eq!(spectrum.total_source_counts(), 2700.);
        let bg = spectrum.background_counts(10.);
        assert_relative_eq!(bg[0], 90.);
        assert_relative_eq!(bg[1], 90.);
    }

    #[test]
    fn missing_background_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXTRACTED_SPECTRUM);
        fs::write(
            &path,
            "EC[keV] EL[keV] EH[keV] BW[keV] src_ct/keV\n550 100 1000 900 2\n",
        )
        .unwrap();
        assert!(ExtractedSpectrum::from_file(&path).is_err());
    }
}
