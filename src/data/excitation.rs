use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::LumpfitError;

/// A scalar input signal applied to one input channel of a model.
///
/// Signals are evaluated by the simulator every time the right-hand side is
/// called, so they must be cheap and deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    /// A constant level for all times
    Constant(f64),
    /// Zero before `time`, `amplitude` from `time` onwards
    Step { time: f64, amplitude: f64 },
    /// A rectangular pulse of `amplitude` over `[start, start + duration)`
    Pulse {
        start: f64,
        duration: f64,
        amplitude: f64,
    },
    /// A sinusoid with `frequency` in Hz, switched on at `start`
    Sine {
        amplitude: f64,
        frequency: f64,
        phase: f64,
        start: f64,
    },
    /// A half-cosine road bump of `height` spanning `duration`
    Bump {
        start: f64,
        duration: f64,
        height: f64,
    },
    /// Piecewise-linear interpolation between knots, held constant outside them
    Table { times: Vec<f64>, values: Vec<f64> },
}

impl Signal {
    /// Evaluate the signal at time `t`
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Signal::Constant(v) => *v,
            Signal::Step { time, amplitude } => {
                if t >= *time {
                    *amplitude
                } else {
                    0.0
                }
            }
            Signal::Pulse {
                start,
                duration,
                amplitude,
            } => {
                if t >= *start && t < start + duration {
                    *amplitude
                } else {
                    0.0
                }
            }
            Signal::Sine {
                amplitude,
                frequency,
                phase,
                start,
            } => {
                if t >= *start {
                    amplitude * (2.0 * PI * frequency * (t - start) + phase).sin()
                } else {
                    0.0
                }
            }
            Signal::Bump {
                start,
                duration,
                height,
            } => {
                if *duration > 0.0 && t >= *start && t <= start + duration {
                    0.5 * height * (1.0 - (2.0 * PI * (t - start) / duration).cos())
                } else {
                    0.0
                }
            }
            Signal::Table { times, values } => interpolate(times, values, t),
        }
    }

    /// Times at which the signal (or its slope) is discontinuous
    pub fn breakpoints(&self) -> Vec<f64> {
        match self {
            Signal::Constant(_) => vec![],
            Signal::Step { time, .. } => vec![*time],
            Signal::Pulse {
                start, duration, ..
            }
            | Signal::Bump {
                start, duration, ..
            } => vec![*start, start + duration],
            Signal::Sine { start, .. } => vec![*start],
            Signal::Table { times, .. } => times.clone(),
        }
    }
}

fn interpolate(times: &[f64], values: &[f64], t: f64) -> f64 {
    let n = times.len().min(values.len());
    if n == 0 {
        return 0.0;
    }
    if t <= times[0] {
        return values[0];
    }
    if t >= times[n - 1] {
        return values[n - 1];
    }
    // First knot strictly after t
    let idx = times[..n].partition_point(|&knot| knot <= t);
    let (t0, t1) = (times[idx - 1], times[idx]);
    let (v0, v1) = (values[idx - 1], values[idx]);
    if t1 == t0 {
        return v1;
    }
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

/// The set of signals driving a model, keyed by input channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Excitation {
    signals: BTreeMap<usize, Signal>,
}

impl Excitation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `signal` to `channel`, replacing any previous signal on it
    pub fn insert(&mut self, channel: usize, signal: Signal) {
        self.signals.insert(channel, signal);
    }

    pub fn with(mut self, channel: usize, signal: Signal) -> Self {
        self.insert(channel, signal);
        self
    }

    pub fn get(&self, channel: usize) -> Option<&Signal> {
        self.signals.get(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Number of input slots needed to hold every channel
    pub fn nchannels(&self) -> usize {
        self.signals
            .keys()
            .next_back()
            .map(|channel| channel + 1)
            .unwrap_or(0)
    }

    /// Check that every channel fits in an input vector of length `len` and that
    /// every table has matching, finite, non-decreasing knots
    pub fn validate(&self, len: usize) -> Result<(), LumpfitError> {
        for (&channel, signal) in &self.signals {
            if channel >= len {
                return Err(LumpfitError::InputChannel {
                    channel,
                    nstates: len,
                });
            }
            if let Signal::Table { times, values } = signal {
                let reason = if times.len() != values.len() {
                    Some("times and values differ in length")
                } else if times.iter().chain(values).any(|v| !v.is_finite()) {
                    Some("knots must be finite")
                } else if times.windows(2).any(|w| w[1] < w[0]) {
                    Some("times must be sorted")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(LumpfitError::InvalidTable { channel, reason });
                }
            }
        }
        Ok(())
    }

    /// Write the value of every signal at time `t` into `u`.
    ///
    /// Slots without a signal are set to zero. Call [Excitation::validate] first,
    /// channels outside `u` are skipped.
    #[inline(always)]
    pub fn evaluate(&self, t: f64, u: &mut [f64]) {
        u.fill(0.0);
        for (&channel, signal) in &self.signals {
            if let Some(slot) = u.get_mut(channel) {
                *slot = signal.value(t);
            }
        }
    }

    /// Sorted, de-duplicated breakpoints inside `(t0, tf]`
    pub fn breakpoints(&self, t0: f64, tf: f64) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .signals
            .values()
            .flat_map(|signal| signal.breakpoints())
            .filter(|&t| t.is_finite() && t > t0 && t <= tf)
            .collect();
        points.sort_by(|a, b| a.total_cmp(b));
        points.dedup();
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_and_pulse() {
        let step = Signal::Step {
            time: 1.0,
            amplitude: 2.0,
        };
        assert_eq!(step.value(0.999), 0.0);
        assert_eq!(step.value(1.0), 2.0);

        let pulse = Signal::Pulse {
            start: 1.0,
            duration: 0.5,
            amplitude: 3.0,
        };
        assert_eq!(pulse.value(0.5), 0.0);
        assert_eq!(pulse.value(1.25), 3.0);
        assert_eq!(pulse.value(1.5), 0.0);
        assert_eq!(pulse.breakpoints(), vec![1.0, 1.5]);
    }

    #[test]
    fn test_bump_peaks_at_midpoint() {
        let bump = Signal::Bump {
            start: 2.0,
            duration: 0.4,
            height: 0.05,
        };
        assert_eq!(bump.value(1.9), 0.0);
        assert_relative_eq!(bump.value(2.2), 0.05, epsilon = 1e-12);
        assert_relative_eq!(bump.value(2.4), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sine_is_off_before_start() {
        let sine = Signal::Sine {
            amplitude: 1.0,
            frequency: 1.0,
            phase: 0.0,
            start: 0.5,
        };
        assert_eq!(sine.value(0.25), 0.0);
        assert_relative_eq!(sine.value(0.75), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_table_interpolation() {
        let table = Signal::Table {
            times: vec![0.0, 1.0, 3.0],
            values: vec![0.0, 2.0, 0.0],
        };
        assert_eq!(table.value(-1.0), 0.0);
        assert_relative_eq!(table.value(0.5), 1.0);
        assert_relative_eq!(table.value(2.0), 1.0);
        assert_eq!(table.value(10.0), 0.0);
    }

    #[test]
    fn test_excitation_evaluate_and_breakpoints() {
        let excitation = Excitation::new()
            .with(
                0,
                Signal::Step {
                    time: 1.0,
                    amplitude: 5.0,
                },
            )
            .with(
                1,
                Signal::Pulse {
                    start: 0.0,
                    duration: 2.0,
                    amplitude: 1.0,
                },
            );
        assert_eq!(excitation.nchannels(), 2);

        let mut u = vec![9.0; 3];
        excitation.evaluate(1.5, &mut u);
        assert_eq!(u, vec![5.0, 1.0, 0.0]);

        assert_eq!(excitation.breakpoints(0.0, 10.0), vec![1.0, 2.0]);
        assert_eq!(excitation.breakpoints(0.0, 1.5), vec![1.0]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_channel() {
        let excitation = Excitation::new().with(3, Signal::Constant(1.0));
        assert!(matches!(
            excitation.validate(2),
            Err(LumpfitError::InputChannel {
                channel: 3,
                nstates: 2
            })
        ));
        assert!(excitation.validate(4).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_tables() {
        let table = |times: Vec<f64>, values: Vec<f64>| {
            Excitation::new().with(0, Signal::Table { times, values })
        };
        assert!(table(vec![0.0, 1.0, 1.0, 2.0], vec![0.0, 1.0, 2.0, 2.0])
            .validate(1)
            .is_ok());
        for excitation in [
            table(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]),
            table(vec![0.0, 2.0, 1.0], vec![0.0, 1.0, 2.0]),
            table(vec![0.0, f64::NAN], vec![0.0, 1.0]),
        ] {
            assert!(matches!(
                excitation.validate(1),
                Err(LumpfitError::InvalidTable { channel: 0, .. })
            ));
        }
    }
}
