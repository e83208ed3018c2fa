use approx::assert_relative_eq;
use megalib_pipeline::{
    effective_area, light_curve, process_run, process_runs, sed, Inputs, SedPoints,
    StartingModel, Table, KEV_TO_ERG, MEV_TO_ERG,
};
use std::{fs, path::Path};

const INPUTS: &str = r#"
name: flat
geometry_file: /opt/megalib/X.geo.setup
spectrum_file: Inputs/Cosima_input_spectrum.dat
source_file: Inputs/flat.source
background_tra_file: Inputs/background.inc1.id1.tra
observation_time: 1000.0
area: 100.0
mission: X
background_time: 1000.0
"#;

// Flat dN/dE of 1e-6 ph/cm^2/s/keV: 0.1 generated events per keV
fn home() -> (tempfile::TempDir, Inputs) {
    let home = tempfile::tempdir().unwrap();
    let inputs: Inputs = serde_yaml::from_str(INPUTS).unwrap();
    fs::create_dir(home.path().join("Inputs")).unwrap();
    fs::write(
        home.path().join(&inputs.spectrum_file),
        "IP LIN\nDP 100 1e-6\nDP 1000000 1e-6\nEN\n",
    )
    .unwrap();
    let performance = home.path().join("X_Performance");
    fs::create_dir(&performance).unwrap();
    fs::write(
        performance.join("X_sensitivity.txt"),
        "Energy(MeV) Sensitivity(MeV/cm2/s)\n1 1e-5\n10 2e-5\n",
    )
    .unwrap();
    (home, inputs)
}

fn mimrec_run(home: &Path, name: &str) -> std::path::PathBuf {
    let wdir = home.join("Mimrec").join(name);
    fs::create_dir_all(&wdir).unwrap();
    fs::write(
        wdir.join("extracted_spectrum.dat"),
        "EC[keV]\tEL[keV]\tEH[keV]\tBW[keV]\tsrc_ct/keV\tbg_ct/keV\n\
         550\t100\t1000\t900\t0.05\t0\n\
         5500\t1000\t10000\t9000\t0.001\t0.1\n",
    )
    .unwrap();
    fs::write(
        wdir.join("extracted_lc.dat"),
        "t_center[s] t_low[s] t_high[s] t_width[s] ct/s\n\
         125 0 250 250 0.01\n\
         375 250 500 250 0.03\n\
         625 500 750 250 0.02\n\
         875 750 1000 250 0.02\n",
    )
    .unwrap();
    wdir
}

#[test]
fn flat_spectrum_effective_area() {
    let (home, inputs) = home();
    let wdir = mimrec_run(home.path(), "run");
    let aeff = effective_area(&inputs, home.path(), &wdir).unwrap();
    assert_relative_eq!(aeff.area[0], 50., max_relative = 1e-12);
    assert_relative_eq!(aeff.area[1], 1., max_relative = 1e-12);
    assert_relative_eq!(aeff.totals.area, 5400. / 990., max_relative = 1e-12);
    assert_relative_eq!(aeff.totals.background, 900., max_relative = 1e-12);
    assert!(wdir.join("Aeff.dat").is_file());
    assert!(wdir.join("total_Aeff_and_BG_for_LC.dat").is_file());
}

#[test]
fn sed_detections_and_upper_limits() {
    let (home, inputs) = home();
    let wdir = mimrec_run(home.path(), "run");
    effective_area(&inputs, home.path(), &wdir).unwrap();
    let points = sed(&inputs, home.path(), &wdir, None).unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points.detections().len(), 1);
    assert_eq!(points.upper_limits().len(), 1);

    let detected = &points[0];
    assert!(detected.detected);
    assert_relative_eq!(detected.sigma, 45f64.sqrt(), max_relative = 1e-12);
    assert_relative_eq!(detected.flux, 0.1 * KEV_TO_ERG, max_relative = 1e-9);
    assert_relative_eq!(
        detected.flux_error,
        45f64.sqrt() / 900. * 2. * KEV_TO_ERG,
        max_relative = 1e-9
    );

    let upper_limit = &points[1];
    assert!(!upper_limit.detected);
    assert_relative_eq!(upper_limit.background, 900., max_relative = 1e-12);
    assert_relative_eq!(upper_limit.sigma, 9. / 909f64.sqrt(), max_relative = 1e-12);
    assert_relative_eq!(
        upper_limit.upper_limit,
        upper_limit.flux + upper_limit.flux_error
    );

    let table = fs::read_to_string(wdir.join("SED.dat")).unwrap();
    assert!(table.starts_with("energy[keV]\tenergy_low_error[keV]\tenergy_high_error[keV]"));
    assert_eq!(table.lines().count(), 3);

    let model = Table::read(wdir.join("SED_model.dat")).unwrap();
    assert_relative_eq!(
        model.column("flux[erg/cm^2/s]").unwrap()[0],
        1e4 * 1e-6 * KEV_TO_ERG,
        max_relative = 1e-12
    );

    let sensitivity = Table::read(wdir.join("SED_sensitivity.dat")).unwrap();
    assert_eq!(sensitivity.column("energy[keV]").unwrap(), &[1000., 10000.]);
    assert_relative_eq!(
        sensitivity.column("flux[erg/cm^2/s]").unwrap()[0],
        1e-5 * MEV_TO_ERG * (9.4608e7 * 0.2 / 1000f64).sqrt(),
        max_relative = 1e-12
    );

    let summary = fs::read_to_string(wdir.join("SED_summary.txt")).unwrap();
    assert!(summary.starts_with("Summary of SED calculation:"));
    assert!(summary.contains("Counts Error list (standard):"));
}

#[test]
fn sed_without_sensitivity_curve() {
    let (home, inputs) = home();
    fs::remove_file(home.path().join("X_Performance/X_sensitivity.txt")).unwrap();
    let wdir = mimrec_run(home.path(), "run");
    effective_area(&inputs, home.path(), &wdir).unwrap();
    let points = sed(&inputs, home.path(), &wdir, None).unwrap();
    assert_eq!(points.len(), 2);
    assert!(wdir.join("SED.dat").is_file());
    assert!(wdir.join("SED_summary.txt").is_file());
    assert!(!wdir.join("SED_sensitivity.dat").exists());
}

#[test]
fn sed_with_starting_model() {
    let (home, inputs) = home();
    let wdir = mimrec_run(home.path(), "run");
    effective_area(&inputs, home.path(), &wdir).unwrap();
    let model = StartingModel {
        energy: vec![100., 1000.],
        flux: vec![1e-11, 2e-11],
    };
    sed(&inputs, home.path(), &wdir, Some(&model)).unwrap();
    let table = Table::read(wdir.join("SED_model.dat")).unwrap();
    assert_eq!(table.column("energy[keV]").unwrap(), &[100., 1000.]);
    assert_eq!(table.column("flux[erg/cm^2/s]").unwrap(), &[1e-11, 2e-11]);
}

#[test]
fn sed_needs_effective_area() {
    let (home, inputs) = home();
    let wdir = mimrec_run(home.path(), "run");
    assert!(sed(&inputs, home.path(), &wdir, None).is_err());
    assert!(light_curve(&wdir, 2).is_err());
}

#[test]
fn rebinned_light_curve() {
    let (home, inputs) = home();
    let wdir = mimrec_run(home.path(), "run");
    let aeff = effective_area(&inputs, home.path(), &wdir).unwrap();
    let bins = light_curve(&wdir, 2).unwrap();
    assert_eq!(bins.len(), 2);
    assert_relative_eq!(bins[0].counts, 10., max_relative = 1e-12);
    assert_relative_eq!(bins[0].time, (125f64 * 375.).sqrt(), max_relative = 1e-12);
    assert_relative_eq!(bins[0].sigma, 10. / 460f64.sqrt(), max_relative = 1e-12);
    assert_relative_eq!(
        bins[1].flux,
        10. / 500. / aeff.totals.area,
        max_relative = 1e-12
    );

    let table = Table::read(wdir.join("Rebinned_LC_summary.dat")).unwrap();
    assert_eq!(
        table.columns(),
        ["bin", "sigma", "flux[ph/cm^2/s]", "error[ph/cm^2/s]", "time[s]"]
    );
    assert_eq!(table.column("bin").unwrap(), &[0., 1.]);
}

#[test]
fn single_run() {
    let (home, inputs) = home();
    mimrec_run(home.path(), "run");
    let summary = process_run(&inputs, home.path(), "Mimrec/run", 1, None).unwrap();
    assert_eq!(summary.wdir, home.path().join("Mimrec/run"));
    assert_relative_eq!(summary.background, 900., max_relative = 1e-12);
    assert_relative_eq!(summary.detected, 54., max_relative = 1e-12);
    assert_eq!(summary.sed.detections().len(), 1);
    assert_eq!(summary.light_curve.len(), 1);
}

#[test]
fn failed_run_does_not_stop_others() {
    let (home, inputs) = home();
    mimrec_run(home.path(), "good");
    fs::create_dir_all(home.path().join("Mimrec/empty")).unwrap();
    let results = process_runs(
        &inputs,
        home.path(),
        &["Mimrec/good", "Mimrec/empty"],
        2,
        None,
    );
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}
