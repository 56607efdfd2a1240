//! Local practical identifiability from output sensitivities.
//!
//! The sensitivity matrix `S[i, j] = ∂y_i / ∂ln p_j` is built by central finite
//! differences over the free parameters, at every observed point of a trace.
//! A small singular value of `S` means some combination of parameters barely
//! changes the output; its right singular vector is that combination.

use nalgebra::{DMatrix, DVector};

use crate::{
    data::Trace,
    optimize::parameters::{ParameterError, ParameterSet},
    simulator::equation::Equation,
    LumpfitError,
};

#[derive(Debug, Clone)]
pub struct IdentifiabilityReport {
    /// Free parameter names, one per column of `sensitivity`
    pub names: Vec<String>,
    /// Log-parameter sensitivities, one row per observed point
    pub sensitivity: DMatrix<f64>,
    /// Singular values of `sensitivity` in descending order
    pub singular_values: Vec<f64>,
    pub condition_number: f64,
    /// Correlation implied by the (pseudo-)inverse of `SᵀS`
    pub correlation: DMatrix<f64>,
    /// Unit right singular vector of the smallest singular value, largest component positive
    pub null_direction: Vec<f64>,
}

impl IdentifiabilityReport {
    pub fn is_identifiable(&self, max_condition_number: f64) -> bool {
        self.condition_number.is_finite() && self.condition_number <= max_condition_number
    }
}

/// Outputs at the observed points of `trace`
fn observed_outputs<E: Equation>(
    equation: &E,
    trace: &Trace,
    params: &[f64],
) -> Result<DVector<f64>, LumpfitError> {
    let predictions = equation.simulate(trace, params)?;
    Ok(DVector::from_iterator(
        trace.n_observed(),
        predictions
            .predictions()
            .iter()
            .filter(|p| p.observation().is_some())
            .map(|p| p.prediction()),
    ))
}

/// Analyse the free parameters of `params` around their current values.
///
/// `step` is the relative perturbation, applied as `p·exp(±step)`. Parameters at
/// zero are perturbed by `±step` instead.
pub fn analyze<E: Equation>(
    equation: &E,
    trace: &Trace,
    params: &ParameterSet,
    step: f64,
) -> Result<IdentifiabilityReport, LumpfitError> {
    let nobs = trace.n_observed();
    if nobs == 0 {
        return Err(LumpfitError::NoObservations);
    }
    let names: Vec<String> = params.free_names().iter().map(|n| n.to_string()).collect();
    if names.is_empty() {
        return Err(ParameterError::NoFreeParameters.into());
    }
    let nfree = names.len();
    let base = params.values();

    let mut sensitivity = DMatrix::zeros(nobs, nfree);
    for (col, name) in names.iter().enumerate() {
        let idx = params
            .names()
            .iter()
            .position(|n| *n == name.as_str())
            .ok_or_else(|| ParameterError::Unknown(name.clone()))?;
        let value = base[idx];
        let (plus, minus) = if value == 0.0 {
            (step, -step)
        } else {
            (value * step.exp(), value * (-step).exp())
        };

        let mut p = base.clone();
        p[idx] = plus;
        let y_plus = observed_outputs(equation, trace, &p)?;
        p[idx] = minus;
        let y_minus = observed_outputs(equation, trace, &p)?;
        sensitivity.set_column(col, &((y_plus - y_minus) / (2.0 * step)));
    }

    // Zero rows leave the singular values and right vectors unchanged but
    // guarantee one singular value per parameter.
    let mut padded = DMatrix::zeros(nobs.max(nfree), nfree);
    padded.view_mut((0, 0), (nobs, nfree)).copy_from(&sensitivity);
    let svd = padded.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| LumpfitError::Optimizer("SVD did not converge".to_string()))?;

    let mut order: Vec<usize> = (0..nfree).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    let singular_values: Vec<f64> = order.iter().map(|&i| svd.singular_values[i]).collect();

    let largest = singular_values[0];
    let smallest = singular_values[nfree - 1];
    let condition_number = if smallest > 0.0 {
        largest / smallest
    } else {
        f64::INFINITY
    };

    let weakest = order[nfree - 1];
    let mut null_direction: Vec<f64> = v_t.row(weakest).iter().copied().collect();
    let dominant = null_direction
        .iter()
        .copied()
        .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    if dominant < 0.0 {
        null_direction.iter_mut().for_each(|v| *v = -*v);
    }

    // Pseudo-inverse of SᵀS from the SVD: Σ v vᵀ / σ²
    let cutoff = largest * f64::EPSILON * nobs.max(nfree) as f64;
    let mut covariance = DMatrix::zeros(nfree, nfree);
    for i in 0..nfree {
        let sigma = svd.singular_values[i];
        if sigma > cutoff {
            let v = v_t.row(i).transpose();
            covariance += &v * v.transpose() / (sigma * sigma);
        }
    }
    let correlation = DMatrix::from_fn(nfree, nfree, |i, j| {
        let scale = (covariance[(i, i)] * covariance[(j, j)]).sqrt();
        if i == j {
            1.0
        } else if scale > 0.0 {
            covariance[(i, j)] / scale
        } else {
            0.0
        }
    });

    tracing::debug!(
        "Sensitivity of {:?}: singular values {:?}, condition number {:.3e}",
        names,
        singular_values,
        condition_number
    );

    Ok(IdentifiabilityReport {
        names,
        sensitivity,
        singular_values,
        condition_number,
        correlation,
        null_direction,
    })
}
