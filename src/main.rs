use anyhow::Context;
use clap::{Parser, Subcommand};
use megalib_pipeline::{
    effective_area, light_curve, make_cosima_input, process_runs, sed, Inputs, Megalib,
    SedPoints, StartingModel,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "MEGAlib simulation pipeline and post-processing")]
struct Cli {
    /// Pipeline inputs YAML file
    #[arg(long, default_value = "inputs.yaml")]
    inputs: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Converts a source SED model into the Cosima input spectrum
    CosimaInput {
        /// Model file with the columns `energy[eV]` and `flux[erg/cm^2/s]`
        model: PathBuf,
        /// Output directory
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Runs the cosima simulation
    Cosima {
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Runs the revan event reconstruction
    Revan {
        /// Revan configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Runs the mimrec selections and extracts the spectra and light curve
    Mimrec {
        /// Run directory name within `Mimrec`
        save_dir: String,
        /// Number of log energy bins of the spectra
        #[arg(long, default_value_t = 6)]
        bins: usize,
        /// Radius of the extraction region [deg]
        #[arg(long, default_value_t = 2.)]
        radius: f64,
        /// Mimrec configuration file, overrides `bins` and `radius`
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Computes the effective area of a Mimrec run
    EffectiveArea { wdir: PathBuf },
    /// Computes the SED of a Mimrec run
    Sed {
        wdir: PathBuf,
        /// Model SED file with the columns `energy[eV]` and `flux[erg/cm^2/s]`
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Rebins the light curve of a Mimrec run
    Lightcurve {
        wdir: PathBuf,
        /// Number of light curve bins
        #[arg(long, default_value_t = 1)]
        bins: usize,
    },
    /// Computes effective area, SED and light curve for several Mimrec runs
    Process {
        #[arg(required = true)]
        wdirs: Vec<PathBuf>,
        /// Number of light curve bins
        #[arg(long, default_value_t = 1)]
        lc_bins: usize,
        /// Model SED file with the columns `energy[eV]` and `flux[erg/cm^2/s]`
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn load_model(model: Option<PathBuf>) -> anyhow::Result<Option<StartingModel>> {
    model
        .map(|path| {
            StartingModel::from_file(&path).with_context(|| format!("failed to load {path:?}"))
        })
        .transpose()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let home = std::env::current_dir()?;

    let inputs = || {
        Inputs::from_yaml(&cli.inputs).with_context(|| format!("failed to load {:?}", cli.inputs))
    };

    match cli.command {
        Commands::CosimaInput { model, output } => {
            let model = StartingModel::from_file(&model)
                .with_context(|| format!("failed to load {model:?}"))?;
            let input = make_cosima_input(&model, output)?;
            println!(
                "integral flux between 100 keV - 1 GeV: {:e} ph/cm^2/s",
                input.integral_flux
            );
            println!("Cosima spectrum: {}", input.path.display());
        }
        Commands::Cosima { seed } => {
            let sim = Megalib::new(inputs()?)?.run_cosima(seed)?;
            println!("Simulated events: {}", sim.display());
        }
        Commands::Revan { config } => {
            let tra = Megalib::new(inputs()?)?.run_revan(config.as_deref())?;
            println!("Reconstructed events: {}", tra.display());
        }
        Commands::Mimrec {
            save_dir,
            bins,
            radius,
            config,
        } => {
            let run = Megalib::new(inputs()?)?.run_mimrec(
                &save_dir,
                bins,
                radius,
                config.as_deref(),
            )?;
            println!("Run directory: {}", run.display());
        }
        Commands::EffectiveArea { wdir } => {
            let aeff = effective_area(&inputs()?, &home, home.join(wdir))?;
            println!("Total effective area: {:.3} cm^2", aeff.totals.area);
            println!("Total background: {:.1} counts", aeff.totals.background);
        }
        Commands::Sed { wdir, model } => {
            let model = load_model(model)?;
            let points = sed(&inputs()?, &home, home.join(wdir), model.as_ref())?;
            println!(
                "SED: {} detections, {} upper limits, {:.0} counts",
                points.detections().len(),
                points.upper_limits().len(),
                points.total_counts()
            );
        }
        Commands::Lightcurve { wdir, bins } => {
            let lc = light_curve(home.join(wdir), bins)?;
            for bin in lc {
                println!(
                    "{:>4} {:>12.1} {:>12.4e} {:>12.4e} {:>6.2}",
                    bin.bin, bin.time, bin.flux, bin.error, bin.sigma
                );
            }
        }
        Commands::Process {
            wdirs,
            lc_bins,
            model,
        } => {
            let model = load_model(model)?;
            let results = process_runs(
                &inputs()?,
                &home,
                wdirs.as_slice(),
                lc_bins,
                model.as_ref(),
            );
            let mut n_failed = 0;
            for (wdir, result) in wdirs.iter().zip(results) {
                match result {
                    Ok(summary) => println!(
                        "{:<40} Aeff: {:>10.3} cm^2 | detections: {:>3}/{:<3}",
                        wdir.display(),
                        summary.effective_area,
                        summary.sed.detections().len(),
                        summary.sed.len()
                    ),
                    Err(e) => {
                        n_failed += 1;
                        log::error!("{}: {e}", wdir.display());
                    }
                }
            }
            anyhow::ensure!(n_failed == 0, "{n_failed} run(s) failed");
        }
    }
    Ok(())
}
