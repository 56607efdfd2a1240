mod cache;
pub mod equation;
pub mod prediction;
pub mod settings;
pub mod sweep;

pub use prediction::{Prediction, Predictions};
pub use settings::SolverSettings;

pub(crate) type T = f64;
pub(crate) type V = nalgebra::DVector<T>;
pub(crate) type M = nalgebra::DMatrix<T>;

/// This closure represents the differential equation of the model:
/// Params:
/// - x: The state vector at time t
/// - p: The parameters of the model; Use the [fetch_params!] macro to extract the parameters
/// - t: The time at which the differential equation is evaluated
/// - dx: A mutable reference to the derivative of the state vector at time t
/// - u: The input vector at time t, one slot per excitation channel (sized to the number of states)
/// Example:
/// ```ignore
/// use lumpfit::*;
/// let diff_eq = |x, p, _t, dx, u| {
///  fetch_params!(p, m, c, k);
///  dx[0] = x[1];
///  dx[1] = (u[0] - c * x[1] - k * x[0]) / m;
/// };
/// ```
pub type DiffEq = fn(&V, &V, T, &mut V, &V);

/// This closure represents the initial state of the system:
/// Params:
/// - p: The parameters of the model; Use the [fetch_params!] macro to extract the parameters
/// - t: The start time of the trace
/// - x: A mutable reference to the state vector, zeroed before the call
/// Example:
/// ```ignore
/// use lumpfit::*;
/// let init = |p, _t, x| {
///  fetch_params!(p, _m, _c, _k, x0);
///  x[0] = x0;
/// };
/// ```
pub type Init = fn(&V, T, &mut V);

/// This closure represents the output equation of the model:
/// Params:
/// - x: The state vector at time t
/// - p: The parameters of the model; Use the [fetch_params!] macro to extract the parameters
/// - t: The time at which the output equation is evaluated
/// - y: A mutable reference to the output vector at time t
/// Example:
/// ```ignore
/// use lumpfit::*;
/// let out = |x, _p, _t, y| {
///   y[0] = x[0];
/// };
/// ```
pub type Out = fn(&V, &V, T, &mut V);

/// This closure represents a closed-form solution of the model.
/// Params:
/// - p: The parameters of the model
/// - t: Time elapsed since the start of the trace
/// - y: A mutable reference to the output vector at time t
pub type AnalyticalEq = fn(&V, T, &mut V);

/// The number of states and output equations of the model
/// The first element is the number of states and the second element is the number of output equations
/// Example:
/// ```ignore
/// let neqs = (2, 1);
/// ```
/// This means that the system of equations has 2 states and there is only 1 output equation.
pub type Neqs = (usize, usize);
