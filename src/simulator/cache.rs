use std::hash::{DefaultHasher, Hash, Hasher};

use crate::data::{Signal, Trace};

/// Hash a parameter vector for cache key generation.
#[inline(always)]
pub(crate) fn spphash(spp: &[f64]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for &value in spp {
        // Normalize -0.0 to 0.0 for consistent hashing
        let bits = if value == 0.0 { 0u64 } else { value.to_bits() };
        bits.hash(&mut hasher);
    }
    hasher.finish()
}

/// Hash everything about a trace that ends up in its predictions.
///
/// Observed values are included because cached predictions carry them, and the
/// id is left out.
pub(crate) fn trace_hash(trace: &Trace) -> u64 {
    let mut hasher = DefaultHasher::new();
    trace.start().to_bits().hash(&mut hasher);
    for obs in trace.observations() {
        obs.time().to_bits().hash(&mut hasher);
        obs.outeq().hash(&mut hasher);
        obs.value().map(f64::to_bits).hash(&mut hasher);
    }
    for channel in 0..trace.excitation().nchannels() {
        if let Some(signal) = trace.excitation().get(channel) {
            channel.hash(&mut hasher);
            hash_signal(signal, &mut hasher);
        }
    }
    hasher.finish()
}

fn hash_bits(values: &[f64], hasher: &mut DefaultHasher) {
    for value in values {
        value.to_bits().hash(hasher);
    }
}

fn hash_signal(signal: &Signal, hasher: &mut DefaultHasher) {
    match signal {
        Signal::Constant(v) => {
            0u8.hash(hasher);
            hash_bits(&[*v], hasher);
        }
        Signal::Step { time, amplitude } => {
            1u8.hash(hasher);
            hash_bits(&[*time, *amplitude], hasher);
        }
        Signal::Pulse {
            start,
            duration,
            amplitude,
        } => {
            2u8.hash(hasher);
            hash_bits(&[*start, *duration, *amplitude], hasher);
        }
        Signal::Sine {
            amplitude,
            frequency,
            phase,
            start,
        } => {
            3u8.hash(hasher);
            hash_bits(&[*amplitude, *frequency, *phase, *start], hasher);
        }
        Signal::Bump {
            start,
            duration,
            height,
        } => {
            4u8.hash(hasher);
            hash_bits(&[*start, *duration, *height], hasher);
        }
        Signal::Table { times, values } => {
            5u8.hash(hasher);
            times.len().hash(hasher);
            hash_bits(times.as_slice(), hasher);
            hash_bits(values.as_slice(), hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_zero_hashes_equal() {
        assert_eq!(spphash(&[0.0, 1.0]), spphash(&[-0.0, 1.0]));
        assert_ne!(spphash(&[1.0, 0.0]), spphash(&[0.0, 1.0]));
    }

    #[test]
    fn test_trace_hash_ignores_id_but_not_values_or_inputs() {
        let a = Trace::builder("a").observation(1.0, 2.0, 0).build();
        let b = Trace::builder("b").observation(1.0, 2.0, 0).build();
        assert_eq!(trace_hash(&a), trace_hash(&b));

        let noisy = Trace::builder("a").observation(1.0, 3.0, 0).build();
        assert_ne!(trace_hash(&a), trace_hash(&noisy));

        let c = Trace::builder("c")
            .observation(1.0, 2.0, 0)
            .input(0, Signal::Constant(1.0))
            .build();
        assert_ne!(trace_hash(&a), trace_hash(&c));
    }
}
