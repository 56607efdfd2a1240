//! Simulate a suspension, corrupt the trace with sensor noise and recover the
//! damping and stiffness by least squares.
//!
//! Run with `RUST_LOG=lumpfit=debug` to follow the optimizer.

use std::fs::File;

use lumpfit::prelude::models::mass_spring_damper;
use lumpfit::prelude::*;
use lumpfit::DampingRegime;
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // m [kg], c [N s/m], k [N/m], x0 [m], v0 [m/s]
    let truth = [1.2, 2.4, 300.0, 0.02, 0.0];
    let model = mass_spring_damper();

    let system = SecondOrder::from_mass_spring_damper(truth[0], truth[1], truth[2])?;
    println!(
        "True system: wn = {:.3} rad/s, zeta = {:.4}, {:?}",
        system.natural_frequency(),
        system.damping_ratio(),
        system.regime()
    );
    assert_eq!(system.regime(), DampingRegime::Underdamped);

    // Displacement sampled at 100 Hz for two seconds
    let template = Trace::builder("suspension")
        .missing_observation(0.0, 0)
        .repeat(200, 0.01)
        .build();
    let clean = model.simulate(&template, &truth)?.to_trace(&template);

    let noise = NoiseModels::new().add(0, NoiseModel::additive(2e-4))?;
    let mut rng = StdRng::seed_from_u64(2024);
    let measured = noise.perturb(&clean, &mut rng)?;

    let path = std::env::temp_dir().join("suspension_trace.csv");
    write_trace_csv(&measured, File::create(&path)?)?;
    println!("Noisy trace written to {}", path.display());

    // The mass is known from the build sheet, damping and stiffness start 50% off
    let parameters = ParameterSet::new()
        .add(Parameter::positive("m", truth[0]).fixed())?
        .add(Parameter::positive("c", truth[1] * 1.5))?
        .add(Parameter::positive("k", truth[2] * 0.5))?
        .add(Parameter::new("x0", truth[3]).fixed())?
        .add(Parameter::new("v0", truth[4]).fixed())?;

    let result = Calibration::new(&model, &measured, parameters.clone())
        .weighted(&noise)
        .run()?;
    println!(
        "Calibrated c = {:.4} (true {}), k = {:.2} (true {})",
        result.get("c").unwrap_or(f64::NAN),
        truth[1],
        result.get("k").unwrap_or(f64::NAN),
        truth[2]
    );
    println!(
        "rmse {:.3e} after {} iterations ({}), loss {:.3e} -> {:.3e}",
        result.rmse,
        result.iterations,
        result.termination,
        result.history.first().copied().unwrap_or(f64::NAN),
        result.cost
    );

    let path = std::env::temp_dir().join("suspension_fit.csv");
    result.predictions.write_csv(File::create(&path)?)?;
    println!("Fitted predictions written to {}", path.display());

    // With the mass released, only the ratios c/m and k/m are determined
    let all_free = parameters.free("m")?;
    let report = analyze(&model, &measured, &all_free, 1e-4)?;
    println!(
        "Sensitivity of {:?}: condition number {:.3e}, weakest direction {:.3?}",
        report.names, report.condition_number, report.null_direction
    );

    let result = Calibration::new(&model, &measured, all_free)
        .weighted(&noise)
        .run()?;
    let (m, c, k) = (
        result.get("m").unwrap_or(f64::NAN),
        result.get("c").unwrap_or(f64::NAN),
        result.get("k").unwrap_or(f64::NAN),
    );
    println!(
        "All free: m = {:.3}, c = {:.3}, k = {:.1}; c/m = {:.4} (true {:.4}), k/m = {:.2} (true {:.2})",
        m,
        c,
        k,
        c / m,
        truth[1] / truth[0],
        k / m,
        truth[2] / truth[0]
    );

    Ok(())
}
