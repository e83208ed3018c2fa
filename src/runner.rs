//! MEGAlib stages
//!
//! Each stage runs in its own directory under the home directory:
//! `Cosima/`, `Revan/` and `Mimrec/<run>/`.
//! The stage terminal output is copied into a log file in the stage directory.

use crate::{config::Inputs, PipelineError, Result};
use std::{
    fmt, fs,
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

/// MEGAlib stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Monte Carlo simulation
    Cosima,
    /// Event reconstruction
    Revan,
    /// Event selection and spectral extraction
    Mimrec,
}
impl Stage {
    /// Returns the stage executable name
    pub fn tag(&self) -> &'static str {
        use Stage::*;
        match self {
            Cosima => "cosima",
            Revan => "revan",
            Mimrec => "mimrec",
        }
    }
    /// Returns the stage directory name
    pub fn dir(&self) -> &'static str {
        use Stage::*;
        match self {
            Cosima => "Cosima",
            Revan => "Revan",
            Mimrec => "Mimrec",
        }
    }
}

/// An external program call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Terminal output copy
    pub log: PathBuf,
}
impl Invocation {
    /// Creates a call to `program` in `cwd`, the log file is relative to `cwd`
    pub fn new<S: Into<String>, L: AsRef<Path>>(program: S, cwd: &Path, log: L) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            log: cwd.join(log),
        }
    }
    pub fn arg<S: AsRef<std::ffi::OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }
}
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// External program runner
pub trait CommandRunner {
    /// Runs the program to completion
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs the programs as subprocesses
///
/// The standard output is printed and copied into the invocation log file
#[derive(Debug, Default, Clone, Copy)]
pub struct Shell;
impl CommandRunner for Shell {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        log::info!("{invocation}");
        let mut log_file = fs::File::create(&invocation.log)?;
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PipelineError::Tool {
                    program: invocation.program.clone(),
                    status: None,
                },
                _ => PipelineError::File(e),
            })?;
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();
            while reader.read_until(b'\n', &mut line)? > 0 {
                print!("{}", String::from_utf8_lossy(&line));
                log_file.write_all(&line)?;
                line.clear();
            }
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(PipelineError::Tool {
                program: invocation.program.clone(),
                status: status.code(),
            });
        }
        Ok(())
    }
}

/// Removes `path` if it exists and creates it anew
fn fresh_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// MEGAlib simulation, reconstruction and selection
pub struct Megalib<R = Shell> {
    home: PathBuf,
    inputs: Inputs,
    runner: R,
}
impl Megalib<Shell> {
    /// Creates the MEGAlib stages with the current directory as home
    pub fn new(inputs: Inputs) -> Result<Self> {
        Self::with_runner(inputs, std::env::current_dir()?, Shell)
    }
}
impl<R: CommandRunner> Megalib<R> {
    /// Creates the MEGAlib stages with the given `runner`
    ///
    /// A relative `home` is taken from the current directory, the stages run in
    /// their own directories and only get absolute paths.
    pub fn with_runner<P: AsRef<Path>>(inputs: Inputs, home: P, runner: R) -> Result<Self> {
        Ok(Self {
            home: std::env::current_dir()?.join(home),
            inputs,
            runner,
        })
    }
    pub fn home(&self) -> &Path {
        &self.home
    }
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }
    pub fn runner(&self) -> &R {
        &self.runner
    }
    /// Returns the directory of the stage
    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.home.join(stage.dir())
    }
    /// Resolves `path` against the home directory
    fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.home.join(path)
    }
    /// Runs cosima in a new `Cosima` directory
    ///
    /// An optional `seed` makes the simulation reproducible.
    /// Returns the path to the simulated events file.
    pub fn run_cosima(&self, seed: Option<u64>) -> Result<PathBuf> {
        log::info!("Running cosima ...");
        let dir = self.stage_dir(Stage::Cosima);
        fresh_dir(&dir)?;
        let mut cosima =
            Invocation::new(Stage::Cosima.tag(), &dir, "terminal_output_cosima.txt");
        if let Some(seed) = seed {
            log::info!("running with seed {seed}");
            cosima = cosima.arg("-s").arg(seed.to_string());
        }
        cosima = cosima.arg(self.resolve(&self.inputs.source_file));
        self.runner.run(&cosima)?;
        Ok(dir.join(self.inputs.output_file("sim")))
    }
    /// Runs revan on the cosima events in a new `Revan` directory
    ///
    /// Returns the path to the reconstructed events file.
    pub fn run_revan(&self, config: Option<&Path>) -> Result<PathBuf> {
        log::info!("Running revan ...");
        let dir = self.stage_dir(Stage::Revan);
        fresh_dir(&dir)?;
        let sim_file = self.inputs.output_file("sim");
        fs::copy(self.stage_dir(Stage::Cosima).join(&sim_file), dir.join(&sim_file))?;
        let mut revan = Invocation::new(Stage::Revan.tag(), &dir, "revan_terminal_output.txt")
            .arg("-g")
            .arg(self.resolve(&self.inputs.geometry_file));
        if let Some(config) = config {
            log::info!("running with configuration file {config:?}");
            revan = revan.arg("-c").arg(self.resolve(config));
        }
        revan = revan.arg("-f").arg(&sim_file).args(["-n", "-a"]);
        self.runner.run(&revan)?;
        Ok(dir.join(self.inputs.output_file("tra")))
    }
    fn selection(
        &self,
        run: &Path,
        config: Option<&Path>,
        events: &Path,
        mode: &str,
        output: &str,
        log: &str,
    ) -> Invocation {
        let mut mimrec = Invocation::new(
            Stage::Mimrec.tag(),
            &self.stage_dir(Stage::Mimrec),
            run.join(log),
        )
        .arg("-g")
        .arg(self.resolve(&self.inputs.geometry_file));
        if let Some(config) = config {
            mimrec = mimrec.arg("-c").arg(self.resolve(config));
        }
        mimrec
            .arg("-f")
            .arg(events)
            .arg(mode)
            .arg("-o")
            .arg(run.join(output))
            .arg("-n")
    }
    /// Runs the mimrec selections and extracts the spectra and light curve into `Mimrec/<save_dir>`
    ///
    /// The source and background spectra are sampled with `n_bin` log bins and
    /// the events are selected within `radius` degrees of the source, unless a
    /// configuration file is given that then sets both.
    /// Returns the run directory.
    pub fn run_mimrec(
        &self,
        save_dir: &str,
        n_bin: usize,
        radius: f64,
        config: Option<&Path>,
    ) -> Result<PathBuf> {
        log::info!("Running mimrec ...");
        let dir = self.stage_dir(Stage::Mimrec);
        fs::create_dir_all(&dir)?;
        let run = dir.join(save_dir);
        fresh_dir(&run)?;

        let tra_file = self.inputs.output_file("tra");
        fs::copy(self.stage_dir(Stage::Revan).join(&tra_file), dir.join(&tra_file))?;
        let tra_file = PathBuf::from(tra_file);
        let background = self.resolve(&self.inputs.background_tra_file);

        let source_spectrum = self.selection(
            &run,
            config,
            &tra_file,
            "-s",
            "source_counts_spectrum.root",
            "source_mimrec_terminal_output.txt",
        );
        let background_spectrum = self.selection(
            &run,
            config,
            &background,
            "-s",
            "background_counts_spectrum.root",
            "background_mimrec_terminal_output.txt",
        );
        let light_curve = self.selection(
            &run,
            config,
            &tra_file,
            "-l",
            "source_LC.root",
            "lightcurve_mimrec_terminal_output.txt",
        );
        let point_source = [
            "-C".to_string(),
            "EventSelections.Source.UsePointSource=true".to_string(),
            "-C".to_string(),
            format!("EventSelections.Source.ARM.Max={radius}"),
        ];
        let selections = match config {
            Some(_) => vec![source_spectrum, background_spectrum, light_curve],
            None => {
                let bins = ["-C".to_string(), format!("HistogramBins.Spectrum={}", n_bin + 1)];
                vec![
                    source_spectrum.args(&bins).args(&point_source),
                    background_spectrum.args(&bins).args(&point_source),
                    light_curve.args(&point_source),
                ]
            }
        };
        for selection in &selections {
            self.runner.run(selection)?;
        }

        let macros = self.resolve(&self.inputs.macro_dir);
        for name in ["ExtractSpectrum", "ExtractLightCurve"] {
            let root = Invocation::new("root", &run, format!("{name}_terminal_output.txt"))
                .args(["-q", "-b"])
                .arg(macros.join(name).with_extension("cxx"));
            self.runner.run(&root)?;
        }
        Ok(run)
    }
}
