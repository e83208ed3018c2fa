//! Whitespace delimited numeric tables
//!
//! The tables written by the ROOT extraction macros and the mission performance
//! files are whitespace delimited with a header line of column names.
//! The pipeline outputs are written tab separated.

use crate::{PipelineError, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A numeric table
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}
impl Table {
    /// Reads a table with a header line of column names
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        TableReader::new(path).read()
    }
    /// Returns the column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.data.first().map_or(0, |c| c.len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Returns the column `name`
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
                path: self.path.clone(),
            })
    }
}

/// [Table] reader
///
/// ```no_run
/// use megalib_pipeline::TableReader;
/// let table = TableReader::new("AMEGO_Performance/AMEGO_sensitivity.txt")
///     .skip_rows(1)
///     .names(["energy", "flux"])
///     .read()?;
/// # Ok::<(), megalib_pipeline::PipelineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TableReader {
    path: PathBuf,
    skip_rows: usize,
    names: Option<Vec<String>>,
}
impl TableReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            skip_rows: 0,
            names: None,
        }
    }
    /// Skips the first `n` lines of the file
    pub fn skip_rows(mut self, n: usize) -> Self {
        self.skip_rows = n;
        self
    }
    /// Sets the column names, the file has no header line
    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(|s| s.into()).collect());
        self
    }
    pub fn read(self) -> Result<Table> {
        log::debug!("Reading {:?}", self.path);
        let contents = fs::read_to_string(&self.path)?;
        let mut lines = contents
            .lines()
            .enumerate()
            .skip(self.skip_rows)
            .filter(|(_, line)| !line.trim().is_empty());
        let columns = match self.names {
            Some(names) => names,
            None => lines
                .next()
                .map(|(_, header)| header.split_whitespace().map(String::from).collect())
                .ok_or_else(|| PipelineError::EmptyTable(self.path.clone()))?,
        };
        let mut data = vec![Vec::new(); columns.len()];
        for (i, line) in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != columns.len() {
                return Err(PipelineError::Ragged {
                    path: self.path,
                    line: i + 1,
                    expected: columns.len(),
                    found: fields.len(),
                });
            }
            for (column, field) in data.iter_mut().zip(fields) {
                let value = field.parse::<f64>().map_err(|_| PipelineError::Parse {
                    path: self.path.clone(),
                    line: i + 1,
                    value: field.to_string(),
                })?;
                column.push(value);
            }
        }
        if data.first().map_or(true, |c| c.is_empty()) {
            return Err(PipelineError::EmptyTable(self.path));
        }
        Ok(Table {
            path: self.path,
            columns,
            data,
        })
    }
}

/// Writes the records to a tab separated file, the header is given by the record field names
pub fn write_tsv<P, T, I>(path: P, records: I) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    log::info!("Saved {path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn read_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extracted_lc.dat");
        fs::write(
            &path,
            "t_center[s] t_low[s] t_high[s] t_width[s] ct/s\n\
             5\t0\t10\t10\t0.5\n\
             15\t10\t20\t10\t1.5\n\n",
        )
        .unwrap();
        let table = Table::read(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().len(), 5);
        assert_eq!(table.column("ct/s").unwrap(), &[0.5, 1.5]);
        assert_eq!(table.column("t_center[s]").unwrap(), &[5., 15.]);
        assert!(matches!(
            table.column("counts"),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn read_with_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensitivity.txt");
        fs::write(&path, "Energy (MeV)  Sensitivity\n0.1  1e-3\n1   2E-4\n").unwrap();
        let table = TableReader::new(&path)
            .skip_rows(1)
            .names(["energy", "flux"])
            .read()
            .unwrap();
        assert_eq!(table.column("energy").unwrap(), &[0.1, 1.]);
        assert_eq!(table.column("flux").unwrap(), &[1e-3, 2e-4]);
    }

    #[test]
    fn reports_bad_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dat");
        fs::write(&path, "a b\n1 2\n3 x\n").unwrap();
        match Table::read(&path) {
            Err(PipelineError::Parse { line, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_ragged_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.dat");
        fs::write(&path, "a b\n1 2\n3\n").unwrap();
        assert!(matches!(
            Table::read(&path),
            Err(PipelineError::Ragged {
                line: 3,
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.dat");
        fs::write(&path, "a b\n").unwrap();
        assert!(matches!(
            Table::read(&path),
            Err(PipelineError::EmptyTable(_))
        ));
    }

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "energy[keV]")]
        energy: f64,
        #[serde(rename = "A_eff[cm^2]")]
        area: f64,
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("Aeff.dat");
        write_tsv(
            &path,
            [
                Row {
                    energy: 150.,
                    area: 12.5,
                },
                Row {
                    energy: 450.,
                    area: 80.,
                },
            ],
        )
        .unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("energy[keV]\tA_eff[cm^2]\n"));
        let table = Table::read(&path).unwrap();
        assert_eq!(table.column("A_eff[cm^2]").unwrap(), &[12.5, 80.]);
    }
}
