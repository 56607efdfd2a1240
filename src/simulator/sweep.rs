use rayon::prelude::*;

use crate::{data::Trace, simulator::equation::Equation, simulator::Predictions, LumpfitError};

/// Simulate `trace` once per entry of `values`, each time replacing parameter `index` of `base`.
///
/// Simulations run in parallel; the output keeps the order of `values`.
pub fn sweep<E: Equation>(
    equation: &E,
    trace: &Trace,
    base: &[f64],
    index: usize,
    values: &[f64],
) -> Result<Vec<(f64, Predictions)>, LumpfitError> {
    if index >= base.len() {
        return Err(LumpfitError::ParameterLength {
            expected: index + 1,
            got: base.len(),
        });
    }
    values
        .par_iter()
        .map(|&value| {
            let mut params = base.to_vec();
            params[index] = value;
            equation
                .simulate(trace, &params)
                .map(|predictions| (value, predictions))
        })
        .collect()
}
