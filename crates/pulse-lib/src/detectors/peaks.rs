use crate::{
    config::PipelineConfig,
    signal::{PeakRecord, Sample},
};
use serde::{Deserialize, Serialize};

/// Parameters of the windowed local-maximum peak detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PeakDetectorConfig {
    /// Samples required on each side of a candidate.
    pub half_window: usize,
    /// Refractory distance between accepted peaks (ms).
    pub min_peak_distance_ms: i64,
    /// Minimum absolute amplitude of a peak.
    pub threshold: f64,
    /// Upper bound on retained peaks.
    pub max_peaks: usize,
    /// Peaks older than this relative to `now` are dropped (ms).
    pub retention_ms: i64,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        PeakDetectorConfig::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PeakDetectorConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            half_window: cfg.half_window,
            min_peak_distance_ms: cfg.min_peak_distance_ms,
            threshold: cfg.peak_threshold,
            max_peaks: cfg.max_peaks,
            retention_ms: cfg.peak_retention_ms,
        }
    }
}

/// Streaming peak detector over a window of buffered samples.
///
/// Each call rescans the supplied samples, so a candidate is only final once
/// `half_window` samples follow it. Accepted peaks are kept in time order and
/// every new peak must be newer than the last one accepted, even if that one
/// has since been pruned.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    cfg: PeakDetectorConfig,
    peaks: Vec<PeakRecord>,
    last_accepted: Option<i64>,
}

impl PeakDetector {
    pub fn new(cfg: PeakDetectorConfig) -> Self {
        Self {
            cfg,
            peaks: Vec::with_capacity(cfg.max_peaks),
            last_accepted: None,
        }
    }

    pub fn config(&self) -> &PeakDetectorConfig {
        &self.cfg
    }

    /// Scan `samples` (oldest first) and return the peaks accepted by this call.
    pub fn detect_peaks(&mut self, samples: &[Sample], now: i64) -> Vec<PeakRecord> {
        let w = self.cfg.half_window.max(1);
        let mut candidates: Vec<PeakRecord> = Vec::new();

        if samples.len() >= 2 * w + 1 {
            for i in w..samples.len() - w {
                let sample = &samples[i];
                if !self.is_clear_of_accepted(sample.time) {
                    continue;
                }
                if !is_local_max(samples, i, w) {
                    continue;
                }
                if sample.value.abs() <= self.cfg.threshold {
                    continue;
                }
                let spaced = candidates.last().map_or(true, |prev| {
                    sample.time.saturating_sub(prev.time) >= self.cfg.min_peak_distance_ms
                });
                if spaced {
                    candidates.push(PeakRecord::from_sample(sample));
                }
            }
        }

        if let Some(last) = candidates.last() {
            self.last_accepted = Some(last.time);
            self.peaks.extend_from_slice(&candidates);
            self.peaks.sort_by_key(|p| p.time);
        }
        self.prune(now);
        candidates
    }

    fn is_clear_of_accepted(&self, time: i64) -> bool {
        if let Some(last) = self.last_accepted {
            if time <= last || time.saturating_sub(last) < self.cfg.min_peak_distance_ms {
                return false;
            }
        }
        self.peaks
            .iter()
            .all(|p| time.saturating_sub(p.time).saturating_abs() >= self.cfg.min_peak_distance_ms)
    }

    fn prune(&mut self, now: i64) {
        let horizon = now.saturating_sub(self.cfg.retention_ms);
        self.peaks.retain(|p| p.time >= horizon);
        if self.peaks.len() > self.cfg.max_peaks {
            let excess = self.peaks.len() - self.cfg.max_peaks;
            self.peaks.drain(..excess);
        }
    }

    /// Accepted peaks, oldest first.
    pub fn peaks(&self) -> &[PeakRecord] {
        &self.peaks
    }

    pub fn peak_at(&self, time: i64) -> Option<&PeakRecord> {
        self.peaks
            .binary_search_by_key(&time, |p| p.time)
            .ok()
            .map(|idx| &self.peaks[idx])
    }

    pub fn mark_irregular(&mut self, time: i64) -> bool {
        match self.peaks.binary_search_by_key(&time, |p| p.time) {
            Ok(idx) => {
                self.peaks[idx].is_irregular = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Return peaks whose one-shot side effects have not fired yet and mark them consumed.
    pub fn take_unconsumed(&mut self) -> Vec<PeakRecord> {
        let mut out = Vec::new();
        for peak in self.peaks.iter_mut().filter(|p| !p.consumed) {
            peak.consumed = true;
            out.push(*peak);
        }
        out
    }

    pub fn clear(&mut self) {
        self.peaks.clear();
        self.last_accepted = None;
    }
}

/// Strictly above the `w` samples before `i`, and not below the `w` after it.
/// On a plateau the earliest sample therefore wins.
fn is_local_max(samples: &[Sample], i: usize, w: usize) -> bool {
    let value = samples[i].value;
    if samples[i - w..i].iter().any(|s| s.value >= value) {
        return false;
    }
    samples[i + 1..=i + w].iter().all(|s| value >= s.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn cfg(half_window: usize, min_distance: i64, threshold: f64) -> PeakDetectorConfig {
        PeakDetectorConfig {
            half_window,
            min_peak_distance_ms: min_distance,
            threshold,
            max_peaks: 50,
            retention_ms: 60_000,
        }
    }

    fn series(points: &[(i64, f64)]) -> Vec<Sample> {
        points.iter().map(|&(t, v)| Sample::new(t, v)).collect()
    }

    #[test]
    fn finds_sinusoid_crests() {
        let samples: Vec<Sample> = (-2..=26)
            .map(|k| {
                let t = k * 100;
                Sample::new(t, 5.0 * (2.0 * PI * t as f64 / 800.0).cos())
            })
            .collect();
        let mut detector = PeakDetector::new(cfg(2, 250, 3.0));
        let peaks = detector.detect_peaks(&samples, 2600);
        let times: Vec<i64> = peaks.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0, 800, 1600, 2400]);
        assert_eq!(detector.peaks().len(), 4);
    }

    #[test]
    fn drops_peak_inside_refractory_distance() {
        let samples = series(&[
            (-100, 0.0),
            (-50, 1.0),
            (0, 6.0),
            (50, 1.0),
            (100, 2.0),
            (150, 5.0),
            (200, 1.0),
            (250, 0.0),
        ]);
        let mut detector = PeakDetector::new(cfg(2, 250, 3.0));
        let peaks = detector.detect_peaks(&samples, 250);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].time, 0);
    }

    #[test]
    fn short_input_yields_nothing() {
        let mut detector = PeakDetector::new(cfg(8, 250, 3.0));
        let samples = series(&[(0, 0.0), (30, 9.0), (60, 0.0)]);
        assert!(detector.detect_peaks(&samples, 60).is_empty());
        assert!(detector.detect_peaks(&[], 0).is_empty());
        let exactly_short: Vec<Sample> = (0..16).map(|i| Sample::new(i * 30, 0.0)).collect();
        assert!(detector.detect_peaks(&exactly_short, 480).is_empty());
    }

    #[test]
    fn below_threshold_is_ignored() {
        let samples = series(&[(0, 0.0), (100, 1.0), (200, 2.5), (300, 1.0), (400, 0.0)]);
        let mut detector = PeakDetector::new(cfg(2, 250, 3.0));
        assert!(detector.detect_peaks(&samples, 400).is_empty());
    }

    #[test]
    fn plateau_keeps_earliest_sample() {
        let samples = series(&[
            (0, 0.0),
            (100, 1.0),
            (200, 4.0),
            (300, 4.0),
            (400, 1.0),
            (500, 0.0),
        ]);
        let mut detector = PeakDetector::new(cfg(2, 50, 3.0));
        let peaks = detector.detect_peaks(&samples, 500);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].time, 200);
    }

    #[test]
    fn rescanning_does_not_duplicate_peaks() {
        let samples = series(&[(0, 0.0), (100, 1.0), (200, 6.0), (300, 1.0), (400, 0.0)]);
        let mut detector = PeakDetector::new(cfg(2, 250, 3.0));
        assert_eq!(detector.detect_peaks(&samples, 400).len(), 1);
        assert!(detector.detect_peaks(&samples, 400).is_empty());
        assert_eq!(detector.peaks().len(), 1);
    }

    #[test]
    fn pruned_peak_is_not_reaccepted() {
        let samples = series(&[(0, 0.0), (100, 1.0), (200, 6.0), (300, 1.0), (400, 0.0)]);
        let mut detector = PeakDetector::new(PeakDetectorConfig {
            retention_ms: 100,
            ..cfg(2, 250, 3.0)
        });
        assert_eq!(detector.detect_peaks(&samples, 400).len(), 1);
        assert!(detector.peaks().is_empty());
        assert!(detector.detect_peaks(&samples, 400).is_empty());
    }

    #[test]
    fn keeps_only_newest_peaks() {
        let mut points = Vec::new();
        for beat in 0..6 {
            let t0 = beat * 1000;
            points.extend_from_slice(&[
                (t0, 0.0),
                (t0 + 100, 1.0),
                (t0 + 200, 6.0),
                (t0 + 300, 1.0),
                (t0 + 400, 0.0),
            ]);
        }
        let samples = series(&points);
        let mut detector = PeakDetector::new(PeakDetectorConfig {
            max_peaks: 3,
            ..cfg(2, 250, 3.0)
        });
        let accepted = detector.detect_peaks(&samples, 5400);
        assert_eq!(accepted.len(), 6);
        let kept: Vec<i64> = detector.peaks().iter().map(|p| p.time).collect();
        assert_eq!(kept, vec![3200, 4200, 5200]);
    }

    #[test]
    fn accepted_peaks_respect_min_distance() {
        let samples: Vec<Sample> = (0..400)
            .map(|i| {
                let t = i * 33;
                let v = 6.0 * (2.0 * PI * t as f64 / 420.0).sin()
                    + 1.5 * (2.0 * PI * t as f64 / 97.0).sin();
                Sample::new(t, v)
            })
            .collect();
        let mut detector = PeakDetector::new(PeakDetectorConfig {
            max_peaks: 500,
            ..cfg(3, 250, 3.0)
        });
        detector.detect_peaks(&samples, 400 * 33);
        for pair in detector.peaks().windows(2) {
            assert!(pair[1].time - pair[0].time >= 250);
        }
    }

    #[test]
    fn consumed_peaks_are_returned_once() {
        let samples = series(&[(0, 0.0), (100, 1.0), (200, 6.0), (300, 1.0), (400, 0.0)]);
        let mut detector = PeakDetector::new(cfg(2, 250, 3.0));
        detector.detect_peaks(&samples, 400);
        assert!(detector.mark_irregular(200));
        let pending = detector.take_unconsumed();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].is_irregular);
        assert!(detector.take_unconsumed().is_empty());
        assert!(detector.peak_at(200).map_or(false, |p| p.consumed));
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let samples = series(&[
            (i64::MIN + 10, 0.0),
            (i64::MIN + 20, 6.0),
            (i64::MIN + 30, 0.0),
            (i64::MAX - 30, 0.0),
            (i64::MAX - 20, 6.0),
            (i64::MAX - 10, 0.0),
        ]);
        let mut detector = PeakDetector::new(cfg(1, 250, 3.0));
        let times: Vec<i64> = detector
            .detect_peaks(&samples, i64::MAX - 10)
            .iter()
            .map(|p| p.time)
            .collect();
        assert_eq!(times, vec![i64::MIN + 20, i64::MAX - 20]);
        assert_eq!(detector.peaks().len(), 1);
        assert!(detector.detect_peaks(&samples, i64::MAX - 10).is_empty());
    }
}
