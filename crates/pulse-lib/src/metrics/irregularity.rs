//! Rhythm irregularity heuristic.
//!
//! Compares the most recent RR intervals against their own mean and flags a
//! beat when any of them deviates by more than a fixed fraction. This is a
//! relative-variation proxy for arrhythmia likelihood, not a clinical
//! classifier.

use crate::{config::PipelineConfig, signal::IrregularityStatus};

#[derive(Debug, Clone)]
pub struct IrregularityScorer {
    window: usize,
    threshold: f64,
    count: u32,
    last: Option<bool>,
    last_deviation: Option<f64>,
}

impl IrregularityScorer {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(2),
            threshold,
            count: 0,
            last: None,
            last_deviation: None,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(cfg.irregularity_window, cfg.irregularity_threshold)
    }

    /// Evaluate the newest beat given the interval history (ms, oldest first).
    ///
    /// With fewer than `window` intervals nothing is evaluated and the beat
    /// counts as regular.
    pub fn evaluate(&mut self, intervals: &[f64]) -> IrregularityStatus {
        let Some(deviation) = max_relative_deviation(intervals, self.window) else {
            return IrregularityStatus {
                is_irregular: false,
                count: self.count,
            };
        };
        let irregular = deviation > self.threshold;
        if irregular {
            self.count = self.count.saturating_add(1);
            log::debug!(
                "irregular beat: {:.0}% deviation over last {} intervals (count {})",
                deviation * 100.0,
                self.window,
                self.count
            );
        }
        self.last = Some(irregular);
        self.last_deviation = Some(deviation);
        self.status()
    }

    pub fn status(&self) -> IrregularityStatus {
        IrregularityStatus {
            is_irregular: self.last.unwrap_or(false),
            count: self.count,
        }
    }

    /// `None` until at least one full window was evaluated.
    pub fn last_deviation(&self) -> Option<f64> {
        self.last_deviation
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last = None;
        self.last_deviation = None;
    }
}

/// Largest `|rr - mean| / mean` over the last `window` intervals.
pub fn max_relative_deviation(intervals: &[f64], window: usize) -> Option<f64> {
    if window == 0 || intervals.len() < window {
        return None;
    }
    let recent = &intervals[intervals.len() - window..];
    let mean = recent.iter().sum::<f64>() / window as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(
        recent
            .iter()
            .map(|rr| (rr - mean).abs() / mean)
            .fold(0.0, f64::max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay(scorer: &mut IrregularityScorer, intervals: &[f64]) -> Vec<IrregularityStatus> {
        (1..=intervals.len())
            .map(|n| scorer.evaluate(&intervals[..n]))
            .collect()
    }

    #[test]
    fn doubled_interval_is_flagged_once() {
        let mut scorer = IrregularityScorer::new(3, 0.2);
        let statuses = replay(&mut scorer, &[800.0, 800.0, 800.0, 1600.0]);
        assert!(statuses[..3].iter().all(|s| !s.is_irregular && s.count == 0));
        assert_eq!(
            statuses[3],
            IrregularityStatus {
                is_irregular: true,
                count: 1
            }
        );
    }

    #[test]
    fn steady_rhythm_is_never_flagged() {
        let mut scorer = IrregularityScorer::new(3, 0.2);
        let statuses = replay(&mut scorer, &[800.0; 5]);
        assert!(statuses.iter().all(|s| !s.is_irregular));
        assert_eq!(scorer.count(), 0);
        assert_eq!(scorer.last_deviation(), Some(0.0));
    }

    #[test]
    fn too_little_history_is_not_evaluated() {
        let mut scorer = IrregularityScorer::new(3, 0.2);
        let status = scorer.evaluate(&[400.0, 1400.0]);
        assert!(!status.is_irregular);
        assert_eq!(scorer.last_deviation(), None);
    }

    #[test]
    fn counter_never_decreases_until_reset() {
        let mut scorer = IrregularityScorer::new(3, 0.2);
        let intervals = [
            800.0, 820.0, 500.0, 1100.0, 790.0, 805.0, 810.0, 450.0, 1200.0, 800.0,
        ];
        let mut previous = 0;
        for status in replay(&mut scorer, &intervals) {
            assert!(status.count >= previous);
            previous = status.count;
        }
        assert!(previous > 0);
        scorer.reset();
        assert_eq!(scorer.status(), IrregularityStatus::default());
        scorer.reset();
        assert_eq!(scorer.count(), 0);
    }

    #[test]
    fn deviation_uses_only_trailing_window() {
        let dev = max_relative_deviation(&[2000.0, 900.0, 900.0, 900.0], 3).unwrap();
        assert!(dev.abs() < 1e-12);
    }
}
