use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::excitation::{Excitation, Signal};

/// A single sample of a model output.
///
/// A `value` of `None` marks a missing observation: the simulator still predicts
/// it, but it never contributes to a loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    time: f64,
    value: Option<f64>,
    outeq: usize,
}

impl Observation {
    pub fn new(time: f64, value: Option<f64>, outeq: usize) -> Self {
        Self { time, value, outeq }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn outeq(&self) -> usize {
        self.outeq
    }

    pub(crate) fn set_value(&mut self, value: Option<f64>) {
        self.value = value;
    }
}

/// One experiment: the inputs applied to a system and the outputs sampled from it.
///
/// # Examples
///
/// ```
/// use lumpfit::*;
///
/// let trace = Trace::builder("free_decay")
///     .observation(0.0, 0.1, 0)
///     .repeat(100, 0.05)
///     .build();
/// assert_eq!(trace.observations().len(), 101);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    id: String,
    start: f64,
    observations: Vec<Observation>,
    excitation: Excitation,
}

impl Trace {
    /// Create a trace directly. Observations are sorted by time.
    pub fn new(
        id: impl Into<String>,
        start: f64,
        mut observations: Vec<Observation>,
        excitation: Excitation,
    ) -> Self {
        observations.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            id: id.into(),
            start,
            observations,
            excitation,
        }
    }

    pub fn builder(id: impl Into<String>) -> TraceBuilder {
        TraceBuilder {
            id: id.into(),
            start: 0.0,
            observations: Vec::new(),
            excitation: Excitation::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Time at which the initial state is applied
    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub(crate) fn observations_mut(&mut self) -> &mut [Observation] {
        &mut self.observations
    }

    /// Observations that carry a value
    pub fn observed(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|obs| obs.value.is_some())
    }

    pub fn n_observed(&self) -> usize {
        self.observed().count()
    }

    pub fn times(&self) -> Vec<f64> {
        self.observations.iter().map(|obs| obs.time).collect()
    }

    /// Time of the last observation, or the start time for an empty trace
    pub fn final_time(&self) -> f64 {
        self.observations
            .last()
            .map(|obs| obs.time)
            .unwrap_or(self.start)
    }

    pub fn excitation(&self) -> &Excitation {
        &self.excitation
    }

    pub fn with_excitation(mut self, excitation: Excitation) -> Self {
        self.excitation = excitation;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Trace {} (start {}, {} observations)",
            self.id,
            self.start,
            self.observations.len()
        )?;
        for obs in &self.observations {
            match obs.value {
                Some(value) => writeln!(f, "  t={:.4}\touteq={}\t{:.6}", obs.time, obs.outeq, value)?,
                None => writeln!(f, "  t={:.4}\touteq={}\tNA", obs.time, obs.outeq)?,
            }
        }
        Ok(())
    }
}

pub struct TraceBuilder {
    id: String,
    start: f64,
    observations: Vec<Observation>,
    excitation: Excitation,
}

impl TraceBuilder {
    /// Set the time at which the initial state applies (defaults to 0)
    pub fn start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    pub fn observation(mut self, time: f64, value: f64, outeq: usize) -> Self {
        self.observations
            .push(Observation::new(time, Some(value), outeq));
        self
    }

    /// Add a sample that should be predicted but not scored
    pub fn missing_observation(mut self, time: f64, outeq: usize) -> Self {
        self.observations.push(Observation::new(time, None, outeq));
        self
    }

    /// Repeat the last observation `n` times, `delta` apart.
    ///
    /// Does nothing if no observation has been added yet.
    pub fn repeat(mut self, n: usize, delta: f64) -> Self {
        let Some(last) = self.observations.last().copied() else {
            return self;
        };
        for i in 1..=n {
            self.observations.push(Observation::new(
                last.time + delta * i as f64,
                last.value,
                last.outeq,
            ));
        }
        self
    }

    /// Apply `signal` to input `channel`
    pub fn input(mut self, channel: usize, signal: Signal) -> Self {
        self.excitation.insert(channel, signal);
        self
    }

    pub fn build(self) -> Trace {
        Trace::new(self.id, self.start, self.observations, self.excitation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_builder() {
        let trace = Trace::builder("test")
            .observation(1.0, 0.5, 0)
            .repeat(2, 0.5)
            .missing_observation(0.5, 1)
            .input(
                0,
                Signal::Step {
                    time: 0.0,
                    amplitude: 1.0,
                },
            )
            .build();

        assert_eq!(trace.id(), "test");
        assert_eq!(trace.times(), vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(trace.n_observed(), 3);
        assert_eq!(trace.final_time(), 2.0);
        assert_eq!(trace.excitation().nchannels(), 1);
    }

    #[test]
    fn test_repeat_without_observation_is_noop() {
        let trace = Trace::builder("empty").repeat(5, 1.0).build();
        assert!(trace.observations().is_empty());
        assert_eq!(trace.final_time(), 0.0);
    }

    #[test]
    fn test_sort_is_stable_for_equal_times() {
        let trace = Trace::builder("stable")
            .observation(1.0, 1.0, 1)
            .observation(1.0, 2.0, 0)
            .observation(0.0, 3.0, 0)
            .build();
        let outeqs: Vec<usize> = trace.observations().iter().map(|o| o.outeq()).collect();
        assert_eq!(outeqs, vec![0, 1, 0]);
    }
}
