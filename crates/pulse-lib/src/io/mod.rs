pub mod text;

use crate::error::TraceError;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use text::{parse_f64_series, read_f64_series, series_to_trace};

/// One raw reading as recorded from the camera signal extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    pub time_ms: i64,
    pub value: f64,
}

/// Read a `time_ms,value` CSV trace.
pub fn read_trace(path: &Path) -> Result<Vec<TraceSample>, TraceError> {
    let file = std::fs::File::open(path).map_err(|source| TraceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_trace_from(file)
}

pub fn read_trace_from<R: std::io::Read>(reader: R) -> Result<Vec<TraceSample>, TraceError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut samples = Vec::new();
    for row in reader.deserialize::<TraceSample>() {
        samples.push(row?);
    }
    if samples.is_empty() {
        return Err(TraceError::Empty);
    }
    Ok(samples)
}

pub fn write_trace(path: &Path, samples: &[TraceSample]) -> Result<(), TraceError> {
    let file = std::fs::File::create(path).map_err(|source| TraceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    write_trace_to(file, samples)
}

pub fn write_trace_to<W: std::io::Write>(
    writer: W,
    samples: &[TraceSample],
) -> Result<(), TraceError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    for sample in samples {
        writer.serialize(sample)?;
    }
    writer.flush().map_err(|source| TraceError::Io {
        path: "<writer>".into(),
        source,
    })?;
    Ok(())
}
