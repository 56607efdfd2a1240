mod closure;

use std::hash::{DefaultHasher, Hash, Hasher};

use cached::proc_macro::cached;
use cached::SizedCache;
use closure::LumpProblem;
use diffsol::{NalgebraLU, OdeBuilder, OdeSolverMethod, OdeSolverStopReason};
use nalgebra::DVector;

use crate::{
    data::{Observation, Trace},
    simulator::{
        cache::{spphash, trace_hash},
        DiffEq, Init, Neqs, Out, Prediction, Predictions, SolverSettings, M, V,
    },
    LumpfitError,
};

use super::{check_trace, EqnKind, Equation};

/// A lumped-parameter model defined by ordinary differential equations.
///
/// The closures are compiled into a diffsol problem and integrated with BDF.
/// The solver stops at every observation time and at every breakpoint of the
/// trace excitation, so discontinuous inputs are resolved exactly.
#[derive(Clone, Debug)]
pub struct ODE {
    diffeq: DiffEq,
    init: Init,
    out: Out,
    neqs: Neqs,
    nparams: Option<usize>,
    settings: SolverSettings,
}

impl ODE {
    pub fn new(diffeq: DiffEq, init: Init, out: Out, neqs: Neqs) -> Self {
        Self {
            diffeq,
            init,
            out,
            neqs,
            nparams: None,
            settings: SolverSettings::default(),
        }
    }

    /// Reject parameter vectors whose length is not `nparams`
    pub fn with_nparams(mut self, nparams: usize) -> Self {
        self.nparams = Some(nparams);
        self
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Identity of the model for cache keys
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        (self.diffeq as usize).hash(&mut hasher);
        (self.init as usize).hash(&mut hasher);
        (self.out as usize).hash(&mut hasher);
        self.neqs.hash(&mut hasher);
        self.nparams.hash(&mut hasher);
        self.settings.fingerprint().hash(&mut hasher);
        hasher.finish()
    }

    /// Initial state at the start of `trace`
    pub fn initial_state(&self, params: &[f64], t0: f64) -> Vec<f64> {
        let p: V = DVector::from_column_slice(params);
        let mut x = V::zeros(self.neqs.0);
        (self.init)(&p, t0, &mut x);
        x.as_slice().to_vec()
    }

    fn predict(
        &self,
        x: &V,
        p: &V,
        observation: &Observation,
        y: &mut V,
    ) -> Result<Prediction, LumpfitError> {
        y.fill(0.0);
        (self.out)(x, p, observation.time(), y);
        let pred = y
            .get(observation.outeq())
            .copied()
            .ok_or(LumpfitError::OutputEquation {
                outeq: observation.outeq(),
                nouteqs: self.neqs.1,
            })?;
        Ok(Prediction::new(observation, pred, x.as_slice().to_vec()))
    }
}

/// Times at which the integrator must stop: every observation and every input breakpoint
fn stop_times(trace: &Trace) -> Vec<f64> {
    let t0 = trace.start();
    let tf = trace.final_time();
    let mut stops = trace.times();
    stops.extend(trace.excitation().breakpoints(t0, tf));
    stops.sort_by(|a, b| a.total_cmp(b));
    stops.dedup();
    stops
}

#[cached(
    ty = "SizedCache<(u64, u64, u64), Predictions>",
    create = "{ SizedCache::with_size(10_000) }",
    convert = r#"{ (ode.fingerprint(), trace_hash(trace), spphash(params)) }"#,
    result = "true"
)]
fn _cached_predictions(
    ode: &ODE,
    trace: &Trace,
    params: &[f64],
) -> Result<Predictions, LumpfitError> {
    ode.simulate(trace, params)
}

impl Equation for ODE {
    fn nstates(&self) -> usize {
        self.neqs.0
    }

    fn nouteqs(&self) -> usize {
        self.neqs.1
    }

    fn nparams(&self) -> Option<usize> {
        self.nparams
    }

    fn kind() -> EqnKind {
        EqnKind::ODE
    }

    fn estimate_predictions(
        &self,
        trace: &Trace,
        params: &[f64],
        cache: bool,
    ) -> Result<Predictions, LumpfitError> {
        if cache {
            _cached_predictions(self, trace, params)
        } else {
            self.simulate(trace, params)
        }
    }

    fn simulate(&self, trace: &Trace, params: &[f64]) -> Result<Predictions, LumpfitError> {
        self.check_params(params)?;
        check_trace(trace)?;
        let (nstates, nouteqs) = self.neqs;
        trace.excitation().validate(nstates)?;

        let mut output = Predictions::with_capacity(trace.observations().len());
        if trace.observations().is_empty() {
            return Ok(output);
        }

        let t0 = trace.start();
        let p: V = DVector::from_column_slice(params);
        let x0: V = DVector::from_vec(self.initial_state(params, t0));

        let problem = OdeBuilder::<M>::new()
            .atol(vec![self.settings.atol; nstates])
            .rtol(self.settings.rtol)
            .t0(t0)
            .h0(self.settings.h0)
            .p(params.to_vec())
            .build_from_eqn(LumpProblem::new(
                self.diffeq,
                nstates,
                p.clone(),
                trace.excitation().clone(),
                x0,
            ))?;
        let mut solver = problem.bdf::<NalgebraLU<f64>>()?;

        let mut y = V::zeros(nouteqs);
        let mut observations = trace.observations().iter().peekable();
        let mut t_current = t0;
        let mut steps = 0usize;

        for stop in stop_times(trace) {
            // Solve to the next stop
            if stop > t_current {
                solver.set_stop_time(stop)?;
                loop {
                    match solver.step()? {
                        OdeSolverStopReason::InternalTimestep => {
                            steps += 1;
                            if steps > self.settings.max_steps {
                                return Err(LumpfitError::StepLimit {
                                    limit: self.settings.max_steps,
                                    time: stop,
                                });
                            }
                        }
                        OdeSolverStopReason::TstopReached => break,
                        reason => {
                            return Err(LumpfitError::Solver(format!(
                                "Unexpected solver return value: {:?}",
                                reason
                            )))
                        }
                    }
                }
                t_current = stop;
            }

            while let Some(observation) = observations.next_if(|obs| obs.time() <= t_current) {
                let pred = self.predict(solver.state().y, &p, observation, &mut y)?;
                output.add_prediction(pred);
            }
        }

        tracing::trace!(
            "Simulated trace {} with {} internal steps",
            trace.id(),
            steps
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Signal;
    use crate::fetch_params;
    use approx::assert_relative_eq;

    fn decay() -> ODE {
        ODE::new(
            |x, p, _t, dx, _u| {
                fetch_params!(p, ke);
                dx[0] = -ke * x[0];
            },
            |_p, _t, x| {
                x[0] = 1.0;
            },
            |x, _p, _t, y| {
                y[0] = x[0];
            },
            (1, 1),
        )
        .with_nparams(1)
    }

    fn forced() -> ODE {
        ODE::new(
            |_x, _p, _t, dx, u| {
                dx[0] = u[0];
            },
            |_p, _t, _x| {},
            |x, _p, _t, y| {
                y[0] = x[0];
            },
            (1, 1),
        )
    }

    #[test]
    fn test_exponential_decay() {
        let trace = Trace::builder("decay")
            .missing_observation(0.0, 0)
            .repeat(10, 0.5)
            .build();
        let predictions = decay().simulate(&trace, &[0.7]).unwrap();
        assert_eq!(predictions.len(), 11);
        for p in predictions.predictions() {
            assert_relative_eq!(p.prediction(), (-0.7 * p.time()).exp(), max_relative = 1e-4);
        }
    }

    #[test]
    fn test_initial_observation_uses_initial_state() {
        let trace = Trace::builder("t0").observation(0.0, 1.0, 0).build();
        let predictions = decay().simulate(&trace, &[0.3]).unwrap();
        assert_eq!(predictions.flat_predictions(), vec![1.0]);
        assert_eq!(predictions.predictions()[0].state(), &[1.0]);
    }

    #[test]
    fn test_step_input_is_integrated_exactly() {
        // x(t) = 2 (t - 1) after the step at t = 1
        let trace = Trace::builder("ramp")
            .missing_observation(0.5, 0)
            .missing_observation(1.5, 0)
            .missing_observation(3.0, 0)
            .input(
                0,
                Signal::Step {
                    time: 1.0,
                    amplitude: 2.0,
                },
            )
            .build();
        let predictions = forced().simulate(&trace, &[]).unwrap();
        let values = predictions.flat_predictions();
        assert_relative_eq!(values[0], 0.0, epsilon = 1e-8);
        assert_relative_eq!(values[1], 1.0, max_relative = 1e-4);
        assert_relative_eq!(values[2], 4.0, max_relative = 1e-4);
    }

    #[test]
    fn test_rejects_wrong_parameter_length() {
        let trace = Trace::builder("x").observation(1.0, 0.5, 0).build();
        assert!(matches!(
            decay().simulate(&trace, &[0.1, 0.2]),
            Err(LumpfitError::ParameterLength {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_outeq_and_channel() {
        let trace = Trace::builder("x").observation(1.0, 0.5, 3).build();
        assert!(matches!(
            decay().simulate(&trace, &[0.1]),
            Err(LumpfitError::OutputEquation { outeq: 3, .. })
        ));

        let trace = Trace::builder("x")
            .observation(1.0, 0.5, 0)
            .input(1, Signal::Constant(1.0))
            .build();
        assert!(matches!(
            decay().simulate(&trace, &[0.1]),
            Err(LumpfitError::InputChannel { channel: 1, .. })
        ));

        let trace = Trace::builder("x")
            .observation(1.0, 0.5, 0)
            .input(
                0,
                Signal::Table {
                    times: vec![0.0, 1.0],
                    values: vec![1.0],
                },
            )
            .build();
        assert!(matches!(
            decay().simulate(&trace, &[0.1]),
            Err(LumpfitError::InvalidTable { channel: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_observation_before_start() {
        let trace = Trace::builder("x")
            .start(1.0)
            .observation(0.5, 0.5, 0)
            .build();
        assert!(matches!(
            decay().simulate(&trace, &[0.1]),
            Err(LumpfitError::ObservationBeforeStart { .. })
        ));
    }

    #[test]
    fn test_cached_predictions_match_fresh_solve() {
        let trace = Trace::builder("cache")
            .observation(0.0, 1.0, 0)
            .repeat(4, 1.0)
            .build();
        let ode = decay();
        let fresh = ode.simulate(&trace, &[0.25]).unwrap();
        let first = ode.estimate_predictions(&trace, &[0.25], true).unwrap();
        let second = ode.estimate_predictions(&trace, &[0.25], true).unwrap();
        assert_eq!(fresh, first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stop_times_merge_breakpoints() {
        let trace = Trace::builder("stops")
            .observation(0.0, 0.0, 0)
            .observation(2.0, 0.0, 0)
            .observation(2.0, 0.0, 1)
            .input(
                0,
                Signal::Pulse {
                    start: 0.5,
                    duration: 1.0,
                    amplitude: 1.0,
                },
            )
            .build();
        assert_eq!(stop_times(&trace), vec![0.0, 0.5, 1.5, 2.0]);
    }
}
