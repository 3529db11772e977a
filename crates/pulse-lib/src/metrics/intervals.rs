use crate::{
    config::PipelineConfig,
    signal::{PeakRecord, RrInterval},
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub rr_min_ms: f64,
    pub rr_max_ms: f64,
    pub history: usize,
    pub min_intervals_for_rate: usize,
    pub trim_fraction: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        IntervalConfig::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for IntervalConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            rr_min_ms: cfg.rr_min_ms,
            rr_max_ms: cfg.rr_max_ms,
            history: cfg.interval_history,
            min_intervals_for_rate: cfg.min_intervals_for_rate,
            trim_fraction: cfg.rate_trim_fraction,
            min_bpm: cfg.min_bpm,
            max_bpm: cfg.max_bpm,
        }
    }
}

/// What a single accepted peak changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatUpdate {
    /// `None` for the first peak of a session.
    pub interval: Option<RrInterval>,
    pub bpm: Option<f64>,
}

/// Tracks peak-to-peak intervals and derives a robust heart rate.
#[derive(Debug, Clone)]
pub struct BeatIntervalTracker {
    cfg: IntervalConfig,
    previous_peak: Option<i64>,
    history: VecDeque<f64>,
    last_valid: Option<RrInterval>,
    bpm: Option<f64>,
}

impl BeatIntervalTracker {
    pub fn new(mut cfg: IntervalConfig) -> Self {
        cfg.history = cfg.history.max(1);
        Self {
            cfg,
            previous_peak: None,
            history: VecDeque::with_capacity(cfg.history),
            last_valid: None,
            bpm: None,
        }
    }

    pub fn on_peak_accepted(&mut self, peak: &PeakRecord) -> BeatUpdate {
        let interval = self.previous_peak.map(|prev| {
            let interval_ms = peak.time.saturating_sub(prev) as f64;
            RrInterval {
                time: peak.time,
                interval_ms,
                valid: interval_ms >= self.cfg.rr_min_ms && interval_ms <= self.cfg.rr_max_ms,
            }
        });
        // Advance even on a rejected interval so one jittery peak does not
        // poison the next measurement.
        self.previous_peak = Some(peak.time);

        if let Some(rr) = interval.filter(|rr| rr.valid) {
            while self.history.len() >= self.cfg.history {
                self.history.pop_front();
            }
            self.history.push_back(rr.interval_ms);
            self.last_valid = Some(rr);
            self.update_rate();
        }

        BeatUpdate {
            interval,
            bpm: self.bpm,
        }
    }

    fn update_rate(&mut self) {
        if self.history.len() < self.cfg.min_intervals_for_rate {
            return;
        }
        let window: Vec<f64> = self.history.iter().copied().collect();
        let Some(mean) = trimmed_mean(&window, self.cfg.trim_fraction) else {
            return;
        };
        if mean <= 0.0 {
            return;
        }
        let bpm = 60_000.0 / mean;
        if bpm >= self.cfg.min_bpm && bpm <= self.cfg.max_bpm {
            self.bpm = Some(bpm);
        } else {
            log::debug!("discarding out-of-range rate estimate {bpm:.1} bpm");
        }
    }

    /// Trimmed-mean rate over the interval history.
    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    /// Rate implied by the most recent valid interval alone.
    pub fn instantaneous_bpm(&self) -> Option<f64> {
        self.last_valid.and_then(|rr| rr.bpm())
    }

    pub fn last_interval(&self) -> Option<RrInterval> {
        self.last_valid
    }

    /// Valid intervals in milliseconds, oldest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    /// Forget intervals and the previous peak. The rate survives when `keep_rate` is set.
    pub fn clear(&mut self, keep_rate: bool) {
        self.previous_peak = None;
        self.history.clear();
        self.last_valid = None;
        if !keep_rate {
            self.bpm = None;
        }
    }
}

/// Mean after dropping `floor(n * fraction)` values from each end of the sorted input.
pub fn trimmed_mean(values: &[f64], fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let trim = (sorted.len() as f64 * fraction).floor() as usize;
    let kept = if 2 * trim < sorted.len() {
        &sorted[trim..sorted.len() - trim]
    } else {
        &sorted[..]
    };
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}
