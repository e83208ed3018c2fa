use clap::Parser;
use megalib_pipeline::{process_runs, write_tsv, Inputs, SedPoints, Stage, EXTRACTED_SPECTRUM};
use serde::Serialize;
use std::{fs, path::PathBuf};

/// Post-processes all the Mimrec runs
#[derive(Debug, Parser)]
struct Cli {
    /// Pipeline inputs YAML file
    #[arg(long, default_value = "inputs.yaml")]
    inputs: PathBuf,
    /// Number of light curve bins
    #[arg(long, default_value_t = 1)]
    lc_bins: usize,
    /// Run directories, default to all the runs in `Mimrec`
    wdirs: Vec<PathBuf>,
}

#[derive(Serialize)]
struct RunRecord {
    run: String,
    #[serde(rename = "Aeff_total[cm^2]")]
    effective_area: f64,
    #[serde(rename = "BG_total[ph]")]
    background: f64,
    detected: f64,
    n_detection: usize,
    n_upper_limit: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let home = std::env::current_dir()?;
    let inputs = Inputs::from_yaml(&cli.inputs)?;

    let wdirs = if cli.wdirs.is_empty() {
        let mut wdirs = Vec::new();
        for entry in fs::read_dir(home.join(Stage::Mimrec.dir()))? {
            let path = entry?.path();
            if path.join(EXTRACTED_SPECTRUM).is_file() {
                wdirs.push(path);
            }
        }
        wdirs.sort();
        wdirs
    } else {
        cli.wdirs
    };
    println!("Processing {} runs ...", wdirs.len());

    let mut n_failed = 0;
    let records = process_runs(&inputs, &home, wdirs.as_slice(), cli.lc_bins, None)
        .into_iter()
        .zip(&wdirs)
        .filter_map(|(result, wdir)| match result {
            Ok(summary) => Some(RunRecord {
                run: wdir.display().to_string(),
                effective_area: summary.effective_area,
                background: summary.background,
                detected: summary.detected,
                n_detection: summary.sed.detections().len(),
                n_upper_limit: summary.sed.upper_limits().len(),
            }),
            Err(e) => {
                n_failed += 1;
                log::error!("{}: {e}", wdir.display());
                None
            }
        })
        .collect::<Vec<_>>();

    if !records.is_empty() {
        let summary = home.join(Stage::Mimrec.dir()).join("runs_summary.dat");
        write_tsv(&summary, &records)?;
        println!(
            "{}/{} runs processed, summary in {}",
            records.len(),
            wdirs.len(),
            summary.display()
        );
    }
    anyhow::ensure!(n_failed == 0, "{n_failed} run(s) failed");

    Ok(())
}
