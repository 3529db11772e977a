use crate::{
    buffer::SampleBuffer,
    config::PipelineConfig,
    detectors::peaks::{PeakDetector, PeakDetectorConfig},
    error::{ConfigError, RejectReason},
    filter::BaselineFilter,
    io::TraceSample,
    metrics::{
        hrv::{hrv_time, HrvTime},
        intervals::{BeatIntervalTracker, IntervalConfig},
        irregularity::IrregularityScorer,
    },
    signal::{IrregularityStatus, PeakRecord, RrInterval, Sample},
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

const EVENT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Stopped,
    Started,
}

/// What happened to one submitted sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// The pipeline is stopped; nothing was recorded.
    Stopped,
    Rejected(RejectReason),
    Accepted {
        /// Smoothed, scaled value stored in the buffer.
        value: f64,
        /// Peaks accepted during this tick, oldest first.
        peaks: Vec<PeakRecord>,
        /// Intervals measured during this tick, including invalid ones.
        intervals: Vec<RrInterval>,
    },
}

impl SampleOutcome {
    pub fn peaks(&self) -> &[PeakRecord] {
        match self {
            SampleOutcome::Accepted { peaks, .. } => peaks,
            _ => &[],
        }
    }
}

/// Push notifications for subscribers that drive one-shot side effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    PeakAccepted(PeakRecord),
    IrregularBeat(PeakRecord),
}

/// Immutable copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub samples: Vec<Sample>,
    pub peaks: Vec<PeakRecord>,
    pub intervals_ms: Vec<f64>,
    pub bpm: Option<f64>,
    pub instantaneous_bpm: Option<f64>,
    pub irregularity: IrregularityStatus,
}

/// Owns the smoother, sample buffer, peak detector, interval tracker and
/// irregularity scorer, and runs them once per submitted sample.
pub struct Pipeline {
    cfg: PipelineConfig,
    state: PipelineState,
    filter: BaselineFilter,
    buffer: SampleBuffer,
    detector: PeakDetector,
    intervals: BeatIntervalTracker,
    scorer: IrregularityScorer,
    last_time: Option<i64>,
    scratch: Vec<Sample>,
    listeners: Vec<Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let capacity = NonZeroUsize::new(cfg.buffer_capacity)
            .ok_or_else(|| ConfigError::Invalid("buffer_capacity must be at least 1".into()))?;
        Ok(Self {
            cfg,
            state: PipelineState::Stopped,
            filter: BaselineFilter::new(
                cfg.smoothing_window,
                cfg.baseline_alpha,
                cfg.vertical_scale,
            ),
            buffer: SampleBuffer::new(capacity),
            detector: PeakDetector::new(PeakDetectorConfig::from(&cfg)),
            intervals: BeatIntervalTracker::new(IntervalConfig::from(&cfg)),
            scorer: IrregularityScorer::from_config(&cfg),
            last_time: None,
            scratch: Vec::with_capacity(cfg.buffer_capacity),
            listeners: Vec::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == PipelineState::Started
    }

    /// Clear all state and begin accepting samples.
    pub fn start(&mut self) {
        self.reset();
        self.state = PipelineState::Started;
        log::debug!("pipeline started");
    }

    /// Stop accepting samples. Signal buffers are cleared; with
    /// `preserve_results` the irregularity count and last rate stay readable.
    pub fn stop(&mut self, preserve_results: bool) {
        if preserve_results {
            self.clear_signal();
        } else {
            self.reset();
        }
        self.state = PipelineState::Stopped;
        log::debug!("pipeline stopped (preserve_results={preserve_results})");
    }

    /// Clear buffer, peaks, intervals, baseline, irregularity count and rate.
    pub fn reset(&mut self) {
        self.clear_signal();
        self.intervals.clear(false);
        self.scorer.reset();
    }

    /// Clear buffer, peaks, intervals and baseline but keep the irregularity
    /// count and the last rate estimate.
    pub fn clear_signal(&mut self) {
        self.filter.reset();
        self.buffer.clear();
        self.detector.clear();
        self.intervals.clear(true);
        self.last_time = None;
        self.scratch.clear();
    }

    /// Run one tick: smooth, buffer, detect peaks, update intervals and rhythm.
    pub fn submit_sample(&mut self, raw: f64, time: i64) -> SampleOutcome {
        if self.state != PipelineState::Started {
            log::trace!("ignoring sample at {time} ms while stopped");
            return SampleOutcome::Stopped;
        }
        if let Some(last) = self.last_time {
            if time < last {
                return self.reject(RejectReason::OutOfOrder { last, got: time });
            }
        }
        if !raw.is_finite() {
            return self.reject(RejectReason::NonFinite(raw));
        }
        let Some(value) = self.filter.process(raw) else {
            return self.reject(RejectReason::OutOfRange(raw));
        };
        self.last_time = Some(time);
        self.buffer.push(Sample::new(time, value));

        self.buffer.copy_into(&mut self.scratch);
        let mut peaks = self.detector.detect_peaks(&self.scratch, time);
        let mut intervals = Vec::new();
        for peak in peaks.iter_mut() {
            let update = self.intervals.on_peak_accepted(peak);
            if let Some(rr) = update.interval {
                intervals.push(rr);
                if rr.valid {
                    let status = self.scorer.evaluate(&self.intervals.history());
                    if status.is_irregular {
                        peak.is_irregular = true;
                        self.detector.mark_irregular(peak.time);
                    }
                }
            }
            log::debug!(
                "peak at {} ms (value {:.2}, bpm {:?})",
                peak.time,
                peak.value,
                update.bpm
            );
            self.emit(PipelineEvent::PeakAccepted(*peak));
            if peak.is_irregular {
                self.emit(PipelineEvent::IrregularBeat(*peak));
            }
        }

        SampleOutcome::Accepted {
            value,
            peaks,
            intervals,
        }
    }

    fn reject(&self, reason: RejectReason) -> SampleOutcome {
        log::warn!("rejected sample: {reason}");
        SampleOutcome::Rejected(reason)
    }

    /// Register a listener for peak and irregular-beat events. Disconnected
    /// receivers are dropped on the next emit; a full queue drops the event.
    pub fn subscribe(&mut self) -> Receiver<PipelineEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_DEPTH);
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: PipelineEvent) {
        self.listeners.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("event listener queue full, dropping {event:?}");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Buffered samples, oldest first, with peak flags applied.
    pub fn snapshot_samples(&self) -> Vec<Sample> {
        let mut samples = self.buffer.snapshot();
        for sample in samples.iter_mut() {
            if let Some(peak) = self.detector.peak_at(sample.time) {
                sample.is_peak = true;
                sample.is_irregular_beat = peak.is_irregular;
            }
        }
        samples
    }

    pub fn latest_sample(&self) -> Option<Sample> {
        self.buffer.latest().copied()
    }

    pub fn peaks(&self) -> &[PeakRecord] {
        self.detector.peaks()
    }

    /// Peaks not yet handed to a one-shot consumer; each is returned once.
    pub fn take_unconsumed_peaks(&mut self) -> Vec<PeakRecord> {
        self.detector.take_unconsumed()
    }

    pub fn intervals_ms(&self) -> Vec<f64> {
        self.intervals.history()
    }

    pub fn current_rate(&self) -> Option<f64> {
        self.intervals.bpm()
    }

    pub fn instantaneous_rate(&self) -> Option<f64> {
        self.intervals.instantaneous_bpm()
    }

    pub fn irregularity_status(&self) -> IrregularityStatus {
        self.scorer.status()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.state,
            samples: self.snapshot_samples(),
            peaks: self.detector.peaks().to_vec(),
            intervals_ms: self.intervals.history(),
            bpm: self.current_rate(),
            instantaneous_bpm: self.instantaneous_rate(),
            irregularity: self.irregularity_status(),
        }
    }
}

/// Result of replaying a whole recording through a fresh pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub samples: usize,
    pub rejected: usize,
    pub peaks: Vec<PeakRecord>,
    pub intervals: Vec<RrInterval>,
    pub bpm: Option<f64>,
    pub irregularity: IrregularityStatus,
    pub hrv: Option<HrvTime>,
}

pub fn run_trace(
    cfg: PipelineConfig,
    trace: &[TraceSample],
) -> Result<RecordingSummary, ConfigError> {
    let mut pipeline = Pipeline::new(cfg)?;
    pipeline.start();
    let mut rejected = 0;
    let mut peaks = Vec::new();
    let mut intervals = Vec::new();
    for sample in trace {
        match pipeline.submit_sample(sample.value, sample.time_ms) {
            SampleOutcome::Accepted {
                peaks: new_peaks,
                intervals: new_intervals,
                ..
            } => {
                peaks.extend(new_peaks);
                intervals.extend(new_intervals);
            }
            SampleOutcome::Rejected(_) => rejected += 1,
            SampleOutcome::Stopped => {}
        }
    }
    let valid: Vec<f64> = intervals
        .iter()
        .filter(|rr| rr.valid)
        .map(|rr| rr.interval_ms)
        .collect();
    Ok(RecordingSummary {
        samples: trace.len(),
        rejected,
        peaks,
        intervals,
        bpm: pipeline.current_rate(),
        irregularity: pipeline.irregularity_status(),
        hrv: hrv_time(&valid),
    })
}
