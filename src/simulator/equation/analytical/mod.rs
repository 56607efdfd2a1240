use nalgebra::DVector;

use crate::{
    data::Trace,
    simulator::{AnalyticalEq, Neqs, Prediction, Predictions, V},
    LumpfitError,
};

use super::{check_trace, EqnKind, Equation};

/// A model with a closed-form solution.
///
/// The solution is evaluated directly at every observation time, measured from the
/// trace start. The trace excitation is not consulted: any input must be encoded
/// in the parameters (for example the amplitude of a step applied at the start).
#[derive(Clone, Debug)]
pub struct Analytical {
    solution: AnalyticalEq,
    neqs: Neqs,
    nparams: Option<usize>,
}

impl Analytical {
    pub fn new(solution: AnalyticalEq, neqs: Neqs) -> Self {
        Self {
            solution,
            neqs,
            nparams: None,
        }
    }

    /// Reject parameter vectors whose length is not `nparams`
    pub fn with_nparams(mut self, nparams: usize) -> Self {
        self.nparams = Some(nparams);
        self
    }
}

impl Equation for Analytical {
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
        EqnKind::Analytical
    }

    fn simulate(&self, trace: &Trace, params: &[f64]) -> Result<Predictions, LumpfitError> {
        self.check_params(params)?;
        check_trace(trace)?;

        let p: V = DVector::from_column_slice(params);
        let mut y = V::zeros(self.neqs.1);
        let mut output = Predictions::with_capacity(trace.observations().len());
        for observation in trace.observations() {
            y.fill(0.0);
            (self.solution)(&p, observation.time() - trace.start(), &mut y);
            let pred = y
                .get(observation.outeq())
                .copied()
                .ok_or(LumpfitError::OutputEquation {
                    outeq: observation.outeq(),
                    nouteqs: self.neqs.1,
                })?;
            output.add_prediction(Prediction::new(observation, pred, vec![]));
        }
        Ok(output)
    }
}
