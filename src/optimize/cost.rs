use argmin::core::{CostFunction, Error};

use crate::{
    data::{NoiseModels, Trace},
    optimize::parameters::ParameterSet,
    simulator::equation::Equation,
    LumpfitError,
};

/// Least-squares loss of a model against one trace, over optimizer coordinates.
///
/// Every evaluation maps the free coordinates back to natural parameters and
/// re-solves the model. A failed or non-finite evaluation costs `+∞`.
pub struct LeastSquares<'a, E: Equation> {
    equation: &'a E,
    trace: &'a Trace,
    parameters: &'a ParameterSet,
    noise: Option<&'a NoiseModels>,
}

impl<'a, E: Equation> LeastSquares<'a, E> {
    pub fn new(equation: &'a E, trace: &'a Trace, parameters: &'a ParameterSet) -> Self {
        Self {
            equation,
            trace,
            parameters,
            noise: None,
        }
    }

    /// Scale each residual by the noise standard deviation of its output
    pub fn weighted(mut self, noise: &'a NoiseModels) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Loss at natural-space parameters
    pub fn loss(&self, params: &[f64]) -> Result<f64, LumpfitError> {
        let predictions = self
            .equation
            .estimate_predictions(self.trace, params, true)?;
        match self.noise {
            Some(noise) => predictions.weighted_sum_of_squares(noise),
            None => Ok(predictions.sum_of_squares()),
        }
    }
}

impl<E: Equation> CostFunction for LeastSquares<'_, E> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, z: &Self::Param) -> Result<Self::Output, Error> {
        let params = self.parameters.from_free(z)?;
        match self.loss(&params) {
            Ok(loss) if loss.is_finite() => Ok(loss),
            Ok(loss) => {
                tracing::debug!("Non-finite loss {} at {:?}", loss, params);
                Ok(f64::INFINITY)
            }
            Err(err) => {
                tracing::debug!("Simulation failed at {:?}: {}", params, err);
                Ok(f64::INFINITY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NoiseModel;
    use crate::fetch_params;
    use crate::optimize::parameters::Parameter;
    use crate::simulator::equation::Analytical;
    use approx::assert_relative_eq;

    fn line() -> Analytical {
        Analytical::new(
            |p, t, y| {
                fetch_params!(p, slope);
                y[0] = slope * t;
            },
            (0, 1),
        )
        .with_nparams(1)
    }

    fn trace() -> Trace {
        Trace::builder("line")
            .observation(1.0, 2.0, 0)
            .observation(2.0, 4.0, 0)
            .missing_observation(3.0, 0)
            .build()
    }

    #[test]
    fn test_cost_is_sum_of_squares_in_free_space() {
        let equation = line();
        let trace = trace();
        let parameters = ParameterSet::new()
            .add(Parameter::positive("slope", 1.0))
            .unwrap();
        let cost = LeastSquares::new(&equation, &trace, &parameters);

        assert_relative_eq!(cost.cost(&vec![2f64.ln()]).unwrap(), 0.0, epsilon = 1e-12);
        // slope 3: residuals 1 and 2, the missing point is skipped
        assert_relative_eq!(cost.cost(&vec![3f64.ln()]).unwrap(), 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_weighted_cost_divides_by_variance() {
        let equation = line();
        let trace = trace();
        let parameters = ParameterSet::new()
            .add(Parameter::new("slope", 3.0))
            .unwrap();
        let noise = NoiseModels::new()
            .add(0, NoiseModel::additive(0.5))
            .unwrap();
        let cost = LeastSquares::new(&equation, &trace, &parameters).weighted(&noise);
        assert_relative_eq!(cost.cost(&vec![3.0]).unwrap(), 20.0, max_relative = 1e-12);
    }

    #[test]
    fn test_failed_simulation_costs_infinity() {
        // The model expects one parameter, the set provides two
        let equation = line();
        let trace = trace();
        let parameters = ParameterSet::positive(&["a", "b"], &[1.0, 1.0]).unwrap();
        let cost = LeastSquares::new(&equation, &trace, &parameters);
        assert_eq!(cost.cost(&vec![0.0, 0.0]).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_wrong_coordinate_length_is_an_error() {
        let equation = line();
        let trace = trace();
        let parameters = ParameterSet::positive(&["slope"], &[1.0]).unwrap();
        let cost = LeastSquares::new(&equation, &trace, &parameters);
        assert!(cost.cost(&vec![0.0, 1.0]).is_err());
    }
}
