use approx::assert_relative_eq;
use lumpfit::prelude::models::{series_rlc, step_response};
use lumpfit::*;

const L: f64 = 0.1;
const C: f64 = 1e-4;
const V: f64 = 5.0;

fn switched_on() -> Trace {
    Trace::builder("rlc")
        .missing_observation(0.0, 0)
        .repeat(80, 5e-4)
        .missing_observation(0.0, 1)
        .repeat(80, 5e-4)
        .input(0, Signal::Constant(V))
        .build()
}

fn model() -> ODE {
    series_rlc().with_settings(SolverSettings::default().with_tolerances(1e-10, 1e-14))
}

#[test]
fn ode_matches_closed_form_in_every_regime() {
    let critical = 2.0 * (L / C).sqrt();
    let trace = switched_on();
    for r in [0.2 * critical, critical, 3.0 * critical] {
        let numeric = model().simulate(&trace, &[r, L, C]).unwrap();
        let exact = step_response().simulate(&trace, &[r, L, C, V]).unwrap();
        for (n, e) in numeric.predictions().iter().zip(exact.predictions()) {
            assert_relative_eq!(n.prediction(), e.prediction(), epsilon = 1e-4);
        }
    }
}

#[test]
fn underdamped_peak_matches_overshoot() {
    let r = 10.0;
    let system = SecondOrder::from_series_rlc(r, L, C).unwrap();
    let peak_time = std::f64::consts::PI / system.damped_frequency().unwrap();
    let trace = Trace::builder("peak")
        .missing_observation(peak_time, 0)
        .input(0, Signal::Constant(V))
        .build();
    let peak = model().simulate(&trace, &[r, L, C]).unwrap().flat_predictions()[0];
    assert_relative_eq!(100.0 * (peak - V) / V, system.overshoot(), max_relative = 1e-3);
}

#[test]
fn sweep_over_resistance_damps_the_ringing() {
    let trace = switched_on();
    let resistances = [5.0, 10.0, 20.0, 40.0];
    let runs = sweep(&model(), &trace, &[0.0, L, C], 0, &resistances).unwrap();
    assert_eq!(runs.len(), resistances.len());

    let peaks: Vec<f64> = runs
        .iter()
        .map(|(_, p)| {
            p.outeq(0)
                .iter()
                .map(|p| p.prediction())
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect();
    for (run, r) in runs.iter().zip(resistances) {
        assert_eq!(run.0, r);
    }
    assert!(peaks.windows(2).all(|w| w[0] > w[1]), "{:?}", peaks);
}

#[test]
fn source_voltage_from_a_table() {
    // Ramp to V over 10 ms and hold
    let trace = Trace::builder("ramp")
        .missing_observation(0.5, 0)
        .input(
            0,
            Signal::Table {
                times: vec![0.0, 0.01],
                values: vec![0.0, V],
            },
        )
        .build();
    let vc = series_rlc()
        .simulate(&trace, &[20.0, L, C])
        .unwrap()
        .flat_predictions()[0];
    assert_relative_eq!(vc, V, epsilon = 1e-4);
}
