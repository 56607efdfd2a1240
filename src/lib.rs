pub mod analysis;
pub mod data;
pub mod error;
pub mod models;
pub mod optimize;
pub mod simulator;

pub use crate::analysis::identifiability::{analyze, IdentifiabilityReport};
pub use crate::analysis::{DampingRegime, SecondOrder};
pub use crate::data::*;
pub use crate::optimize::{
    Calibration, CalibrationResult, CalibrationSettings, LeastSquares, LossHistory, Parameter,
    ParameterSet,
};
pub use crate::simulator::equation::{self, Analytical, EqnKind, Equation, ODE};
pub use crate::simulator::sweep::sweep;
pub use crate::simulator::{Neqs, Prediction, Predictions, SolverSettings};
pub use error::LumpfitError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{
            read_trace_csv, write_trace_csv, Excitation, NoiseModel, NoiseModels, Observation,
            Signal, Trace,
        };
    }
    pub mod simulator {
        pub use crate::simulator::{
            equation,
            equation::{Analytical, Equation, ODE},
            sweep::sweep,
            Prediction, Predictions, SolverSettings,
        };
    }
    pub mod models {
        pub use crate::models::rlc::{series_rlc, step_response};
        pub use crate::models::suspension::{free_response, mass_spring_damper, quarter_car};
    }

    pub use crate::analysis::{identifiability::analyze, SecondOrder};
    pub use crate::data::*;
    pub use crate::optimize::{Calibration, CalibrationSettings, Parameter, ParameterSet};
    pub use crate::simulator::equation::{Analytical, Equation, ODE};
    pub use crate::simulator::sweep::sweep;
    pub use crate::simulator::{Predictions, SolverSettings};
    pub use crate::LumpfitError;

    /// Bind model parameters to local names, in model order.
    ///
    /// ```ignore
    /// fetch_params!(p, m, c, k);
    /// ```
    #[macro_export]
    macro_rules! fetch_params {
        ($p:expr, $($name:ident),*) => {
            let p = $p;
            let mut idx = 0;
            $(
                #[allow(unused_mut)]
                let mut $name = p[idx];
                idx += 1;
            )*
            let _ = idx; // Consume idx to avoid unused_assignments warning
        };
    }
}
