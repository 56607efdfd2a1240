use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::data::trace::{Observation, Trace};
use crate::LumpfitError;

#[derive(Debug, Serialize, Deserialize)]
struct TraceRow {
    time: f64,
    outeq: usize,
    value: Option<f64>,
}

/// Write the observations of `trace` as CSV with columns `time,outeq,value`.
///
/// Missing observations are written with an empty value. The excitation is not
/// part of the file.
pub fn write_trace_csv<W: Write>(trace: &Trace, writer: W) -> Result<(), LumpfitError> {
    let mut writer = csv::Writer::from_writer(writer);
    for obs in trace.observations() {
        writer.serialize(TraceRow {
            time: obs.time(),
            outeq: obs.outeq(),
            value: obs.value(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a trace written by [write_trace_csv].
///
/// Lines starting with `#` are ignored. The trace starts at time 0 and has no
/// excitation, attach one with [Trace::with_excitation].
pub fn read_trace_csv<R: Read>(reader: R, id: impl Into<String>) -> Result<Trace, LumpfitError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut observations = Vec::new();
    for row in reader.deserialize() {
        let row: TraceRow = row?;
        observations.push(Observation::new(row.time, row.value, row.outeq));
    }
    Ok(Trace::new(id, 0.0, observations, Default::default()))
}
