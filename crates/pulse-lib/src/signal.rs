use serde::{Deserialize, Serialize};
use std::fmt;

/// One smoothed, baseline-normalized reading as stored in the sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Source clock timestamp in milliseconds.
    pub time: i64,
    /// Scaled deviation from the tracked baseline.
    pub value: f64,
    pub is_peak: bool,
    pub is_irregular_beat: bool,
}

impl Sample {
    pub fn new(time: i64, value: f64) -> Self {
        Self {
            time,
            value,
            is_peak: false,
            is_irregular_beat: false,
        }
    }
}

/// An accepted heartbeat peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub time: i64,
    pub value: f64,
    pub is_irregular: bool,
    /// Set once a downstream one-shot side effect (tone, flash) fired for this peak.
    pub consumed: bool,
}

impl PeakRecord {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            time: sample.time,
            value: sample.value,
            is_irregular: false,
            consumed: false,
        }
    }
}

/// Peak-to-peak interval, stamped with the time of the newer peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrInterval {
    pub time: i64,
    pub interval_ms: f64,
    pub valid: bool,
}

impl RrInterval {
    pub fn bpm(&self) -> Option<f64> {
        if self.interval_ms > 0.0 {
            Some(60_000.0 / self.interval_ms)
        } else {
            None
        }
    }
}

/// Result of the most recent rhythm evaluation together with the running count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrregularityStatus {
    pub is_irregular: bool,
    pub count: u32,
}

impl fmt::Display for IrregularityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.is_irregular {
            "IRREGULAR"
        } else {
            "NORMAL"
        };
        write!(f, "{}|{}", tag, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_formats_for_display() {
        let status = IrregularityStatus {
            is_irregular: true,
            count: 3,
        };
        assert_eq!(status.to_string(), "IRREGULAR|3");
        assert_eq!(IrregularityStatus::default().to_string(), "NORMAL|0");
    }

    #[test]
    fn interval_converts_to_bpm() {
        let rr = RrInterval {
            time: 1000,
            interval_ms: 750.0,
            valid: true,
        };
        assert_eq!(rr.bpm(), Some(80.0));
    }
}
