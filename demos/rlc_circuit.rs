//! Series RLC circuit switched onto a DC source, for three resistances.

use std::fs::File;

use lumpfit::prelude::models::{series_rlc, step_response};
use lumpfit::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (l, c, v): (f64, f64, f64) = (0.1, 1e-4, 5.0);
    let critical = 2.0 * (l / c).sqrt();
    let model = series_rlc().with_settings(SolverSettings::default().with_tolerances(1e-8, 1e-12));

    // Capacitor voltage and current every 0.5 ms, source switched on at 1 ms
    let trace = Trace::builder("rlc")
        .missing_observation(0.0, 0)
        .repeat(100, 5e-4)
        .missing_observation(0.0, 1)
        .repeat(100, 5e-4)
        .input(
            0,
            Signal::Step {
                time: 1e-3,
                amplitude: v,
            },
        )
        .build();

    let resistances = [0.25 * critical, critical, 4.0 * critical];
    let runs = sweep(&model, &trace, &[resistances[0], l, c], 0, &resistances)?;

    for (r, predictions) in &runs {
        let system = SecondOrder::from_series_rlc(*r, l, c)?;
        let peak = predictions
            .outeq(0)
            .iter()
            .map(|p| p.prediction())
            .fold(f64::NEG_INFINITY, f64::max);
        println!(
            "R = {:7.2} ohm: {:?}, wn = {:.1} rad/s, Q = {:.2}, peak v_c = {:.3} V (predicted overshoot {:.1}%)",
            r,
            system.regime(),
            system.natural_frequency(),
            system.quality_factor(),
            peak,
            system.overshoot()
        );

        let path = std::env::temp_dir().join(format!("rlc_r{:.0}.csv", r));
        predictions.write_csv(File::create(&path)?)?;
    }

    // Closed form, with time measured from the switching instant
    let switched = Trace::builder("rlc")
        .missing_observation(0.0, 0)
        .repeat(98, 5e-4)
        .build();
    let exact = step_response().simulate(&switched, &[resistances[0], l, c, v])?;
    let numeric = &runs[0].1;
    let worst = numeric
        .outeq(0)
        .iter()
        .filter(|p| p.time() >= 1e-3 - 1e-9)
        .zip(exact.predictions())
        .map(|(n, e)| (n.prediction() - e.prediction()).abs())
        .fold(0.0, f64::max);
    println!("Largest ODE error against the closed form: {:.2e} V", worst);

    Ok(())
}
