use crate::{
    analysis::SecondOrder,
    fetch_params,
    simulator::equation::{Analytical, ODE},
};

/// Parameters of [series_rlc]
pub const SERIES_RLC_PARAMETERS: &[&str] = &["r", "l", "c"];

/// Parameters of [step_response]
pub const STEP_RESPONSE_PARAMETERS: &[&str] = &["r", "l", "c", "v"];

/// Series RLC circuit driven by a voltage source, `L q'' + R q' + q / C = V(t)`.
///
/// # Assumptions
/// - `p` is `[r, l, c]` in ohms, henries and farads
/// - input channel 0 is the source voltage
/// - states are capacitor charge and loop current `[q, i]`, both zero at the start
/// - outputs are capacitor voltage and loop current `[v_c, i]`
pub fn series_rlc() -> ODE {
    ODE::new(
        |x, p, _t, dx, u| {
            fetch_params!(p, r, l, c);
            dx[0] = x[1];
            dx[1] = (u[0] - r * x[1] - x[0] / c) / l;
        },
        |_p, _t, _x| {},
        |x, p, _t, y| {
            fetch_params!(p, _r, _l, c);
            y[0] = x[0] / c;
            y[1] = x[1];
        },
        (2, 2),
    )
    .with_nparams(SERIES_RLC_PARAMETERS.len())
}

/// Closed-form response of [series_rlc] to a source stepping from 0 to `v` at the trace start.
///
/// `p` is `[r, l, c, v]`. Non-physical parameters produce `NaN` outputs.
pub fn step_response() -> Analytical {
    Analytical::new(
        |p, t, y| {
            fetch_params!(p, r, l, c, v);
            match SecondOrder::from_series_rlc(r, l, c) {
                Ok(system) => {
                    let (q, i) = system.step_response(c * v, 0.0, 0.0, t);
                    y[0] = q / c;
                    y[1] = i;
                }
                Err(_) => y.fill(f64::NAN),
            }
        },
        (2, 2),
    )
    .with_nparams(STEP_RESPONSE_PARAMETERS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Signal, Trace};
    use crate::simulator::{equation::Equation, SolverSettings};
    use approx::assert_relative_eq;

    #[test]
    fn test_ode_matches_step_response() {
        let (r, l, c, v) = (10.0, 0.1, 1e-4, 5.0);
        let trace = Trace::builder("rlc")
            .missing_observation(0.0, 0)
            .repeat(50, 1e-3)
            .missing_observation(0.0, 1)
            .repeat(50, 1e-3)
            .input(0, Signal::Constant(v))
            .build();
        let ode = series_rlc().with_settings(SolverSettings::default().with_tolerances(1e-10, 1e-14));

        let numeric = ode.simulate(&trace, &[r, l, c]).unwrap();
        let exact = step_response().simulate(&trace, &[r, l, c, v]).unwrap();
        for (n, e) in numeric.predictions().iter().zip(exact.predictions()) {
            assert_relative_eq!(n.prediction(), e.prediction(), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_capacitor_charges_to_source_voltage() {
        let trace = Trace::builder("charge").missing_observation(1.0, 0).build();
        let predictions = step_response()
            .simulate(&trace, &[100.0, 0.01, 1e-4, 12.0])
            .unwrap();
        assert_relative_eq!(predictions.flat_predictions()[0], 12.0, epsilon = 1e-9);
    }
}
