use anyhow::{bail, Context, Result};
use pulse_lib::io::TraceSample;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of a synthetic camera PPG recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSpec {
    pub duration_s: f64,
    /// Camera frame rate.
    pub fps: f64,
    pub bpm: f64,
    /// Uniform jitter added to every RR interval (ms).
    pub rr_jitter_ms: f64,
    /// Every n-th beat arrives early, followed by a compensatory pause. 0 disables.
    pub ectopic_every: usize,
    /// Fraction of the RR interval by which an ectopic beat is premature.
    pub ectopic_prematurity: f64,
    /// Resting brightness of the fingertip image.
    pub brightness: f64,
    /// Depth of the brightness dip at each beat.
    pub pulse_amplitude: f64,
    /// Gaussian width of the dip (ms).
    pub pulse_width_ms: f64,
    /// Uniform sensor noise amplitude.
    pub noise_amplitude: f64,
    pub first_beat_ms: f64,
    pub seed: u64,
}

impl Default for SimulationSpec {
    fn default() -> Self {
        Self {
            duration_s: 30.0,
            fps: 30.0,
            bpm: 72.0,
            rr_jitter_ms: 0.0,
            ectopic_every: 0,
            ectopic_prematurity: 0.4,
            brightness: 120.0,
            pulse_amplitude: 2.0,
            pulse_width_ms: 80.0,
            noise_amplitude: 0.0,
            first_beat_ms: 500.0,
            seed: 0,
        }
    }
}

impl SimulationSpec {
    pub fn validate(&self) -> Result<()> {
        if !(self.duration_s > 0.0) {
            bail!("duration_s must be positive");
        }
        if !(self.fps > 0.0) {
            bail!("fps must be positive");
        }
        if !(self.bpm > 0.0) {
            bail!("bpm must be positive");
        }
        if !(0.0..1.0).contains(&self.ectopic_prematurity) {
            bail!("ectopic_prematurity must be in [0, 1)");
        }
        if !(self.pulse_width_ms > 0.0) {
            bail!("pulse_width_ms must be positive");
        }
        if self.rr_jitter_ms < 0.0 || self.noise_amplitude < 0.0 {
            bail!("jitter and noise amplitudes must not be negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedTrace {
    pub samples: Vec<TraceSample>,
    /// Ground-truth beat centres (ms).
    pub beat_times_ms: Vec<f64>,
}

impl SimulatedTrace {
    /// Ground-truth RR intervals between consecutive beats.
    pub fn rr_intervals_ms(&self) -> Vec<f64> {
        self.beat_times_ms.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

pub fn read_spec(path: &Path) -> Result<SimulationSpec> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read simulation spec {}", path.display()))?;
    let spec: SimulationSpec = toml::from_str(&contents)
        .with_context(|| format!("parsing simulation spec {}", path.display()))?;
    spec.validate()?;
    Ok(spec)
}

fn beat_schedule(spec: &SimulationSpec, rng: &mut StdRng) -> Vec<f64> {
    let duration_ms = spec.duration_s * 1000.0;
    let rr = 60_000.0 / spec.bpm;
    let mut beats = Vec::new();
    let mut t = spec.first_beat_ms;
    let mut compensate = false;
    while t <= duration_ms {
        beats.push(t);
        let mut next = rr;
        if spec.rr_jitter_ms > 0.0 {
            next += rng.gen_range(-spec.rr_jitter_ms..=spec.rr_jitter_ms);
        }
        if compensate {
            next += rr * spec.ectopic_prematurity;
            compensate = false;
        } else if spec.ectopic_every > 0 && beats.len() % spec.ectopic_every == 0 {
            next -= rr * spec.ectopic_prematurity;
            compensate = true;
        }
        t += next.max(1.0);
    }
    beats
}

pub fn simulate(spec: &SimulationSpec) -> Result<SimulatedTrace> {
    spec.validate()?;
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let beats = beat_schedule(spec, &mut rng);
    let frames = (spec.duration_s * spec.fps).floor() as usize;
    let frame_ms = 1000.0 / spec.fps;
    let reach = 5.0 * spec.pulse_width_ms;

    let mut samples = Vec::with_capacity(frames);
    let mut first = 0;
    for i in 0..frames {
        let t = i as f64 * frame_ms;
        while first < beats.len() && beats[first] < t - reach {
            first += 1;
        }
        let dip: f64 = beats[first..]
            .iter()
            .take_while(|&&b| b <= t + reach)
            .map(|&b| (-0.5 * ((t - b) / spec.pulse_width_ms).powi(2)).exp())
            .sum();
        let noise = if spec.noise_amplitude > 0.0 {
            rng.gen_range(-spec.noise_amplitude..=spec.noise_amplitude)
        } else {
            0.0
        };
        samples.push(TraceSample {
            time_ms: t.round() as i64,
            value: spec.brightness - spec.pulse_amplitude * dip + noise,
        });
    }
    log::debug!(
        "simulated {} frames with {} beats at {:.0} bpm",
        samples.len(),
        beats.len(),
        spec.bpm
    );
    Ok(SimulatedTrace {
        samples,
        beat_times_ms: beats,
    })
}

pub fn write_beats_json(path: &Path, trace: &SimulatedTrace) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating beat annotations {}", path.display()))?;
    serde_json::to_writer_pretty(
        file,
        &serde_json::json!({
            "beat_times_ms": trace.beat_times_ms,
            "rr_ms": trace.rr_intervals_ms(),
        }),
    )?;
    Ok(())
}
