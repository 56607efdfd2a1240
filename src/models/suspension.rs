use crate::{
    analysis::SecondOrder,
    fetch_params,
    simulator::equation::{Analytical, ODE},
};

/// Parameters of [mass_spring_damper] and [free_response]
pub const MASS_SPRING_DAMPER_PARAMETERS: &[&str] = &["m", "c", "k", "x0", "v0"];

/// Parameters of [quarter_car]
pub const QUARTER_CAR_PARAMETERS: &[&str] = &["ms", "mu", "ks", "cs", "kt"];

/// Single-degree-of-freedom suspension `m x'' + c x' + k x = F(t)`.
///
/// # Assumptions
/// - `p` is `[m, c, k, x0, v0]`; the last two are the initial displacement and velocity
/// - input channel 0 is the external force `F`
/// - states and outputs are `[x, v]`
pub fn mass_spring_damper() -> ODE {
    ODE::new(
        |x, p, _t, dx, u| {
            fetch_params!(p, m, c, k, _x0, _v0);
            dx[0] = x[1];
            dx[1] = (u[0] - c * x[1] - k * x[0]) / m;
        },
        |p, _t, x| {
            fetch_params!(p, _m, _c, _k, x0, v0);
            x[0] = x0;
            x[1] = v0;
        },
        |x, _p, _t, y| {
            y[0] = x[0];
            y[1] = x[1];
        },
        (2, 2),
    )
    .with_nparams(MASS_SPRING_DAMPER_PARAMETERS.len())
}

/// Closed-form free response of [mass_spring_damper] with no external force.
///
/// Non-physical parameters (non-positive mass or stiffness, negative damping)
/// produce `NaN` outputs.
pub fn free_response() -> Analytical {
    Analytical::new(
        |p, t, y| {
            fetch_params!(p, m, c, k, x0, v0);
            match SecondOrder::from_mass_spring_damper(m, c, k) {
                Ok(system) => {
                    let (x, v) = system.free_response(x0, v0, t);
                    y[0] = x;
                    y[1] = v;
                }
                Err(_) => y.fill(f64::NAN),
            }
        },
        (2, 2),
    )
    .with_nparams(MASS_SPRING_DAMPER_PARAMETERS.len())
}

/// Two-degree-of-freedom quarter-car suspension.
///
/// The sprung mass `ms` sits on a spring `ks` and damper `cs` above the unsprung
/// mass `mu`, which rides on a tyre of stiffness `kt` over the road profile.
/// Displacements are measured from static equilibrium.
///
/// # Assumptions
/// - `p` is `[ms, mu, ks, cs, kt]`
/// - input channel 0 is the road height
/// - states are `[xs, vs, xu, vu]`, all zero at the start
/// - outputs are body travel `xs` and suspension deflection `xs - xu`
pub fn quarter_car() -> ODE {
    ODE::new(
        |x, p, _t, dx, u| {
            fetch_params!(p, ms, mu, ks, cs, kt);
            let road = u[0];
            let spring = ks * (x[0] - x[2]) + cs * (x[1] - x[3]);
            dx[0] = x[1];
            dx[1] = -spring / ms;
            dx[2] = x[3];
            dx[3] = (spring - kt * (x[2] - road)) / mu;
        },
        |_p, _t, _x| {},
        |x, _p, _t, y| {
            y[0] = x[0];
            y[1] = x[0] - x[2];
        },
        (4, 2),
    )
    .with_nparams(QUARTER_CAR_PARAMETERS.len())
}
