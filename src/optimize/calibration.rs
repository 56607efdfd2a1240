use argmin::{
    core::{observers::ObserverMode, Executor, State},
    solver::neldermead::NelderMead,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    data::{NoiseModels, Trace},
    optimize::{
        cost::LeastSquares,
        observer::LossHistory,
        parameters::{ParameterError, ParameterSet},
    },
    simulator::{equation::Equation, Predictions},
    LumpfitError,
};

/// Edge length of the starting simplex, in optimizer coordinates
const SIMPLEX_STEP: f64 = 0.1;

/// Settings for [Calibration]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Nelder-Mead iterations per run
    pub max_iters: u64,
    /// Stop a run when the standard deviation of the simplex losses falls below this
    pub sd_tolerance: f64,
    /// Polishing runs restarted from the best point
    pub restarts: usize,
    /// Additional runs from perturbed starting points
    pub random_starts: usize,
    pub seed: u64,
    /// Random starts scale each free parameter by a log-uniform factor in `[1/spread, spread]`
    pub spread: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            sd_tolerance: 1e-10,
            restarts: 2,
            random_starts: 4,
            seed: 42,
            spread: 2.0,
        }
    }
}

impl CalibrationSettings {
    pub fn from_json_str(json: &str) -> Result<Self, LumpfitError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome of [Calibration::run]
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub names: Vec<String>,
    /// Calibrated values in natural space, in model order
    pub parameters: Vec<f64>,
    pub cost: f64,
    pub rmse: f64,
    /// Nelder-Mead iterations of the winning run and its polishing runs
    pub iterations: u64,
    /// Best loss per iteration, in the same order
    pub history: Vec<f64>,
    pub termination: String,
    /// Model output at the calibrated parameters
    pub predictions: Predictions,
}

impl CalibrationResult {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.parameters[i])
    }
}

struct Run {
    z: Vec<f64>,
    cost: f64,
    iterations: u64,
    history: Vec<f64>,
    termination: String,
}

/// Least-squares calibration of a model against a single trace.
///
/// # Examples
///
/// ```
/// use lumpfit::prelude::*;
/// use lumpfit::fetch_params;
///
/// let decay = Analytical::new(
///     |p, t, y| {
///         fetch_params!(p, a, b);
///         y[0] = a * (-b * t).exp();
///     },
///     (0, 1),
/// );
/// let trace = Trace::builder("decay")
///     .missing_observation(0.0, 0)
///     .repeat(20, 0.25)
///     .build();
/// let truth = decay.simulate(&trace, &[3.0, 1.2]).unwrap().to_trace(&trace);
///
/// let parameters = ParameterSet::positive(&["a", "b"], &[1.0, 0.5]).unwrap();
/// let result = Calibration::new(&decay, &truth, parameters).run().unwrap();
/// assert!((result.get("b").unwrap() - 1.2).abs() < 1e-3);
/// ```
pub struct Calibration<'a, E: Equation> {
    equation: &'a E,
    trace: &'a Trace,
    parameters: ParameterSet,
    noise: Option<&'a NoiseModels>,
    settings: CalibrationSettings,
}

impl<'a, E: Equation> Calibration<'a, E> {
    pub fn new(equation: &'a E, trace: &'a Trace, parameters: ParameterSet) -> Self {
        Self {
            equation,
            trace,
            parameters,
            noise: None,
            settings: CalibrationSettings::default(),
        }
    }

    /// Minimise the noise-weighted sum of squares instead of the plain one
    pub fn weighted(mut self, noise: &'a NoiseModels) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn settings(mut self, settings: CalibrationSettings) -> Self {
        self.settings = settings;
        self
    }

    fn cost(&self) -> LeastSquares<'_, E> {
        let cost = LeastSquares::new(self.equation, self.trace, &self.parameters);
        match self.noise {
            Some(noise) => cost.weighted(noise),
            None => cost,
        }
    }

    pub fn run(&self) -> Result<CalibrationResult, LumpfitError> {
        if self.trace.n_observed() == 0 {
            return Err(LumpfitError::NoObservations);
        }
        if self.parameters.n_free() == 0 {
            return Err(ParameterError::NoFreeParameters.into());
        }
        tracing::info!(
            "Calibrating {:?} against trace {} ({} observations, {} starts)",
            self.parameters.free_names(),
            self.trace.id(),
            self.trace.n_observed(),
            self.settings.random_starts + 1
        );

        let runs: Vec<Result<Run, LumpfitError>> = self
            .starting_points()
            .into_par_iter()
            .map(|z| self.nelder_mead(z))
            .collect();

        let mut best: Option<Run> = None;
        let mut last_error = None;
        for (i, run) in runs.into_iter().enumerate() {
            match run {
                Ok(run) => {
                    let better = match &best {
                        Some(b) => run.cost < b.cost,
                        None => true,
                    };
                    if better {
                        best = Some(run);
                    }
                }
                Err(err) => {
                    tracing::warn!("Discarding start {}: {}", i, err);
                    last_error = Some(err);
                }
            }
        }
        let best = match (best, last_error) {
            (Some(best), _) => best,
            (None, Some(err)) => return Err(err),
            (None, None) => {
                return Err(LumpfitError::Optimizer("no starting points".to_string()))
            }
        };

        let best = polish(best, self.settings.restarts, |z| self.nelder_mead(z));

        if !best.cost.is_finite() {
            return Err(LumpfitError::Optimizer(
                "every evaluation of the loss failed".to_string(),
            ));
        }

        let parameters = self.parameters.from_free(&best.z)?;
        let predictions = self
            .equation
            .estimate_predictions(self.trace, &parameters, false)?;
        let rmse = predictions.rmse().unwrap_or(f64::NAN);

        tracing::info!(
            "Calibration finished after {} iterations: loss {:.6e}, rmse {:.6e}",
            best.iterations,
            best.cost,
            rmse
        );

        Ok(CalibrationResult {
            names: self
                .parameters
                .names()
                .iter()
                .map(|n| n.to_string())
                .collect(),
            parameters,
            cost: best.cost,
            rmse,
            iterations: best.iterations,
            history: best.history,
            termination: best.termination,
            predictions,
        })
    }

    /// The nominal point followed by `random_starts` seeded perturbations of it.
    ///
    /// Each free value is scaled by a log-uniform factor, clamped into its bounds
    /// and mapped to optimizer coordinates. Values at zero stay at zero.
    fn starting_points(&self) -> Vec<Vec<f64>> {
        let width = self.settings.spread.max(1.0).ln();
        let mut points = vec![self.parameters.to_free()];
        for i in 0..self.settings.random_starts {
            let mut rng = StdRng::seed_from_u64(self.settings.seed.wrapping_add(i as u64));
            points.push(
                self.parameters
                    .parameters()
                    .iter()
                    .filter(|p| !p.is_fixed())
                    .map(|p| {
                        let factor = rng.random_range(-width..=width).exp();
                        let value = (p.value() * factor).clamp(p.lower(), p.upper());
                        p.transform().to_free(value)
                    })
                    .collect(),
            );
        }
        points
    }

    fn nelder_mead(&self, z: Vec<f64>) -> Result<Run, LumpfitError> {
        let history = LossHistory::new();
        let simplex = create_initial_simplex(&z);
        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
            .with_sd_tolerance(self.settings.sd_tolerance)
            .map_err(|e| LumpfitError::Optimizer(e.to_string()))?;
        let res = Executor::new(self.cost(), solver)
            .configure(|state| state.max_iters(self.settings.max_iters))
            .add_observer(history.clone(), ObserverMode::Always)
            .run()
            .map_err(|e| LumpfitError::Optimizer(e.to_string()))?;

        let z = res
            .state
            .best_param
            .clone()
            .ok_or_else(|| LumpfitError::Optimizer("no best parameter".to_string()))?;
        Ok(Run {
            z,
            cost: res.state.get_best_cost(),
            iterations: res.state.get_iter(),
            history: history.values(),
            termination: format!("{:?}", res.state.get_termination_status()),
        })
    }
}

/// Restart from the best point up to `restarts` times.
///
/// A failed restart ends polishing and keeps the best run so far. Termination
/// status follows the run whose point is kept.
fn polish<F>(mut best: Run, restarts: usize, mut run: F) -> Run
where
    F: FnMut(Vec<f64>) -> Result<Run, LumpfitError>,
{
    for restart in 0..restarts {
        let polished = match run(best.z.clone()) {
            Ok(polished) => polished,
            Err(err) => {
                tracing::warn!("Stopping after restart {}: {}", restart + 1, err);
                break;
            }
        };
        tracing::debug!(
            "Restart {}: loss {:.6e} -> {:.6e}",
            restart + 1,
            best.cost,
            polished.cost
        );
        best.iterations += polished.iterations;
        best.history.extend(polished.history);
        if polished.cost <= best.cost {
            best.z = polished.z;
            best.cost = polished.cost;
            best.termination = polished.termination;
        }
    }
    best
}

fn create_initial_simplex(initial_point: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(initial_point.len() + 1);
    vertices.push(initial_point.to_vec());
    for i in 0..initial_point.len() {
        let mut perturbed_point = initial_point.to_vec();
        perturbed_point[i] += SIMPLEX_STEP;
        vertices.push(perturbed_point);
    }
    vertices
}
