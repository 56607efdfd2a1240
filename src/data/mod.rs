pub mod excitation;
pub mod io;
pub mod noise;
pub mod trace;

pub use excitation::{Excitation, Signal};
pub use io::{read_trace_csv, write_trace_csv};
pub use noise::{NoiseError, NoiseModel, NoiseModels};
pub use trace::{Observation, Trace, TraceBuilder};
