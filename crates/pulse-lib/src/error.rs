use thiserror::Error;

/// Construction-time configuration failures. Streaming never produces these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Why a sample was dropped instead of entering the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RejectReason {
    #[error("non-finite sample value {0}")]
    NonFinite(f64),
    #[error("sample value {0} overflows the baseline filter")]
    OutOfRange(f64),
    #[error("timestamp {got} ms precedes previous sample at {last} ms")]
    OutOfOrder { last: i64, got: i64 },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn pipeline worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Trace file read/write failures.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to access trace {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed trace: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line} is not a number: {text}")]
    NotNumeric { line: usize, text: String },
    #[error("no numeric samples found")]
    Empty,
    #[error("sampling rate must be positive, got {0}")]
    InvalidRate(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_chains_io_source() {
        use std::error::Error;
        let err = ConfigError::Read {
            path: "pulse.toml".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("pulse.toml"));
    }

    #[test]
    fn reject_reason_mentions_timestamps() {
        let reason = RejectReason::OutOfOrder { last: 120, got: 80 };
        let text = reason.to_string();
        assert!(text.contains("120") && text.contains("80"));
    }
}
