use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning constants for the whole pipeline.
///
/// The physiological bounds (interval range, rate range, irregularity
/// threshold) are heuristic defaults rather than validated clinical limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of samples kept in the ring buffer.
    pub buffer_capacity: usize,
    /// Length of the moving-average smoother (samples).
    pub smoothing_window: usize,
    /// Weight of each new value in the exponential baseline.
    pub baseline_alpha: f64,
    /// Gain applied to the baseline-normalized deviation.
    pub vertical_scale: f64,
    /// Samples required on each side of a peak candidate.
    pub half_window: usize,
    /// Refractory distance between accepted peaks (ms).
    pub min_peak_distance_ms: i64,
    /// Minimum absolute scaled amplitude for a peak.
    pub peak_threshold: f64,
    /// Accepted peaks retained for display.
    pub max_peaks: usize,
    /// Accepted peaks older than this relative to the newest sample are dropped (ms).
    pub peak_retention_ms: i64,
    /// Shortest RR interval considered physiological (ms).
    pub rr_min_ms: f64,
    /// Longest RR interval considered physiological (ms).
    pub rr_max_ms: f64,
    /// Valid RR intervals kept for rate and rhythm estimation.
    pub interval_history: usize,
    /// Intervals required before a rate is reported.
    pub min_intervals_for_rate: usize,
    /// Fraction trimmed from each end of the sorted interval window.
    pub rate_trim_fraction: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Intervals compared by the irregularity scorer.
    pub irregularity_window: usize,
    /// Maximum fractional deviation from the window mean before a beat is irregular.
    pub irregularity_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 300,
            smoothing_window: 3,
            baseline_alpha: 0.05,
            vertical_scale: 8.0,
            half_window: 8,
            min_peak_distance_ms: 250,
            peak_threshold: 3.0,
            max_peaks: 30,
            peak_retention_ms: 10_000,
            rr_min_ms: 300.0,
            rr_max_ms: 1500.0,
            interval_history: 10,
            min_intervals_for_rate: 3,
            rate_trim_fraction: 0.2,
            min_bpm: 40.0,
            max_bpm: 200.0,
            irregularity_window: 3,
            irregularity_threshold: 0.2,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: &str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        }
        if self.buffer_capacity == 0 {
            return invalid("buffer_capacity must be at least 1");
        }
        if self.smoothing_window == 0 {
            return invalid("smoothing_window must be at least 1");
        }
        if !(self.baseline_alpha > 0.0 && self.baseline_alpha <= 1.0) {
            return invalid("baseline_alpha must be in (0, 1]");
        }
        if !self.vertical_scale.is_finite() || self.vertical_scale == 0.0 {
            return invalid("vertical_scale must be finite and non-zero");
        }
        if self.half_window == 0 {
            return invalid("half_window must be at least 1");
        }
        if self.buffer_capacity < 2 * self.half_window + 1 {
            return invalid("buffer_capacity must hold at least one full detection window");
        }
        if self.min_peak_distance_ms < 0 {
            return invalid("min_peak_distance_ms must not be negative");
        }
        if !(self.peak_threshold >= 0.0) {
            return invalid("peak_threshold must not be negative");
        }
        if self.max_peaks == 0 {
            return invalid("max_peaks must be at least 1");
        }
        if self.peak_retention_ms <= 0 {
            return invalid("peak_retention_ms must be positive");
        }
        if !(self.rr_min_ms > 0.0 && self.rr_min_ms < self.rr_max_ms) {
            return invalid("rr_min_ms must be positive and below rr_max_ms");
        }
        if self.min_intervals_for_rate == 0 || self.interval_history < self.min_intervals_for_rate
        {
            return invalid("interval_history must hold at least min_intervals_for_rate intervals");
        }
        if !(0.0..0.5).contains(&self.rate_trim_fraction) {
            return invalid("rate_trim_fraction must be in [0, 0.5)");
        }
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return invalid("min_bpm must be positive and below max_bpm");
        }
        if self.irregularity_window < 2 || self.irregularity_window > self.interval_history {
            return invalid("irregularity_window must be between 2 and interval_history");
        }
        if !(self.irregularity_threshold > 0.0) {
            return invalid("irregularity_threshold must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            buffer_capacity = 450
            peak_threshold = 2.5
        "#,
        )
        .expect("parse config");
        assert_eq!(cfg.buffer_capacity, 450);
        assert_eq!(cfg.peak_threshold, 2.5);
        assert_eq!(cfg.half_window, 8);
        assert_eq!(cfg.min_peak_distance_ms, 250);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = PipelineConfig::from_toml_str("buffer_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_inverted_interval_range() {
        let cfg = PipelineConfig {
            rr_min_ms: 1500.0,
            rr_max_ms: 300.0,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_template_round_trips() {
        let text = PipelineConfig::default().to_toml_string().unwrap();
        assert!(text.contains("min_peak_distance_ms = 250"));
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        std::fs::write(&path, "half_window = 4\n").unwrap();
        let cfg = PipelineConfig::load(&path).unwrap();
        assert_eq!(cfg.half_window, 4);
    }
}
