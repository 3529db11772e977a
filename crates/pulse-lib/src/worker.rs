//! Background processing thread.
//!
//! The worker owns the [`Pipeline`] exclusively. Samples and lifecycle
//! requests travel over one command channel, so a stop or reset takes effect
//! before any sample queued after it. Consumers only ever see immutable
//! [`PipelineSnapshot`] copies.

use crate::{
    config::PipelineConfig,
    error::WorkerError,
    pipeline::{Pipeline, PipelineEvent, PipelineSnapshot},
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::thread::JoinHandle;

const COMMAND_QUEUE_DEPTH: usize = 1024;
const UPDATE_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineCommand {
    Sample { value: f64, time: i64 },
    Start,
    Stop { preserve_results: bool },
    Reset,
    ClearSignal,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum PipelineUpdate {
    Snapshot(PipelineSnapshot),
    Event(PipelineEvent),
}

pub struct PipelineHandle {
    command_tx: Sender<PipelineCommand>,
    update_rx: Receiver<PipelineUpdate>,
    worker: Option<JoinHandle<PipelineSnapshot>>,
    latest: Option<PipelineSnapshot>,
    pending: Vec<PipelineEvent>,
}

impl PipelineHandle {
    /// Spawn a worker owning a pipeline built from `cfg`. A snapshot is
    /// published every `snapshot_every` processed samples and after every
    /// lifecycle command.
    pub fn spawn(cfg: PipelineConfig, snapshot_every: usize) -> Result<Self, WorkerError> {
        let mut pipeline = Pipeline::new(cfg)?;
        let events = pipeline.subscribe();
        let (command_tx, command_rx) = bounded(COMMAND_QUEUE_DEPTH);
        let (update_tx, update_rx) = bounded(UPDATE_QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("pulse-pipeline".into())
            .spawn(move || {
                PipelineWorker {
                    pipeline,
                    events,
                    command_rx,
                    update_tx,
                    snapshot_every: snapshot_every.max(1),
                    since_snapshot: 0,
                }
                .run()
            })
            .map_err(WorkerError::Spawn)?;
        Ok(Self {
            command_tx,
            update_rx,
            worker: Some(worker),
            latest: None,
            pending: Vec::new(),
        })
    }

    fn send(&self, command: PipelineCommand) -> bool {
        if self.command_tx.send(command).is_err() {
            log::warn!("pipeline worker is gone, dropping {command:?}");
            return false;
        }
        true
    }

    pub fn submit_sample(&self, value: f64, time: i64) -> bool {
        self.send(PipelineCommand::Sample { value, time })
    }

    pub fn start(&self) -> bool {
        self.send(PipelineCommand::Start)
    }

    pub fn stop(&self, preserve_results: bool) -> bool {
        self.send(PipelineCommand::Stop { preserve_results })
    }

    pub fn reset(&self) -> bool {
        self.send(PipelineCommand::Reset)
    }

    pub fn clear_signal(&self) -> bool {
        self.send(PipelineCommand::ClearSignal)
    }

    fn drain(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                PipelineUpdate::Snapshot(snapshot) => self.latest = Some(snapshot),
                PipelineUpdate::Event(event) => self.pending.push(event),
            }
        }
    }

    /// Peak events received since the last call, in arrival order.
    pub fn poll(&mut self) -> Vec<PipelineEvent> {
        self.drain();
        std::mem::take(&mut self.pending)
    }

    pub fn latest_snapshot(&mut self) -> Option<&PipelineSnapshot> {
        self.drain();
        self.latest.as_ref()
    }

    /// Stop the worker after it drains the commands already queued and
    /// return its final state.
    pub fn shutdown(mut self) -> Option<PipelineSnapshot> {
        self.finish().or_else(|| {
            self.drain();
            self.latest.take()
        })
    }

    fn finish(&mut self) -> Option<PipelineSnapshot> {
        let handle = self.worker.take()?;
        let _ = self.command_tx.send(PipelineCommand::Shutdown);
        match handle.join() {
            Ok(snapshot) => Some(snapshot),
            Err(_) => {
                log::error!("pipeline worker panicked");
                None
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

struct PipelineWorker {
    pipeline: Pipeline,
    events: Receiver<PipelineEvent>,
    command_rx: Receiver<PipelineCommand>,
    update_tx: Sender<PipelineUpdate>,
    snapshot_every: usize,
    since_snapshot: usize,
}

impl PipelineWorker {
    fn run(mut self) -> PipelineSnapshot {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                PipelineCommand::Sample { value, time } => {
                    self.pipeline.submit_sample(value, time);
                    self.forward_events();
                    self.since_snapshot += 1;
                    if self.since_snapshot >= self.snapshot_every {
                        self.publish();
                    }
                }
                PipelineCommand::Start => {
                    self.pipeline.start();
                    self.publish();
                }
                PipelineCommand::Stop { preserve_results } => {
                    self.pipeline.stop(preserve_results);
                    self.publish();
                }
                PipelineCommand::Reset => {
                    self.pipeline.reset();
                    self.publish();
                }
                PipelineCommand::ClearSignal => {
                    self.pipeline.clear_signal();
                    self.publish();
                }
                PipelineCommand::Shutdown => break,
            }
        }
        log::debug!("pipeline worker exiting");
        self.pipeline.snapshot()
    }

    fn forward_events(&self) {
        for event in self.events.try_iter() {
            self.send_update(PipelineUpdate::Event(event));
        }
    }

    fn publish(&mut self) {
        self.since_snapshot = 0;
        self.send_update(PipelineUpdate::Snapshot(self.pipeline.snapshot()));
    }

    /// Never blocks: a consumer that stops polling loses updates, not the worker.
    fn send_update(&self, update: PipelineUpdate) {
        match self.update_tx.try_send(update) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => log::trace!("update queue full, dropping update"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineState;

    fn brightness(t_ms: f64, rr_ms: f64) -> f64 {
        let phase = (t_ms - 500.0).rem_euclid(rr_ms);
        let offset = phase.min(rr_ms - phase);
        120.0 - 2.0 * (-0.5 * (offset / 80.0).powi(2)).exp()
    }

    fn stream(handle: &PipelineHandle, frames: usize, rr_ms: f64) {
        for i in 0..frames {
            let t = i as f64 * 1000.0 / 30.0;
            handle.submit_sample(brightness(t, rr_ms), t.round() as i64);
        }
    }

    #[test]
    fn worker_processes_samples_in_order() {
        let handle = PipelineHandle::spawn(PipelineConfig::default(), 30).unwrap();
        handle.start();
        stream(&handle, 300, 800.0);
        let snapshot = handle.shutdown().expect("final snapshot");
        assert_eq!(snapshot.state, PipelineState::Started);
        assert_eq!(snapshot.samples.len(), 300);
        let bpm = snapshot.bpm.expect("rate");
        assert!((68.0..82.0).contains(&bpm), "bpm {bpm}");
    }

    #[test]
    fn samples_after_stop_are_ignored() {
        let handle = PipelineHandle::spawn(PipelineConfig::default(), 10).unwrap();
        handle.start();
        stream(&handle, 60, 800.0);
        handle.stop(false);
        stream(&handle, 60, 800.0);
        let snapshot = handle.shutdown().unwrap();
        assert_eq!(snapshot.state, PipelineState::Stopped);
        assert!(snapshot.samples.is_empty());
    }

    #[test]
    fn peak_events_reach_the_handle() {
        let mut handle = PipelineHandle::spawn(PipelineConfig::default(), 150).unwrap();
        handle.start();
        stream(&handle, 150, 800.0);
        // the snapshot after sample 150 is sent after that sample's events
        while handle
            .latest_snapshot()
            .map_or(true, |s| s.samples.len() < 150)
        {
            std::thread::yield_now();
        }
        let events = handle.poll();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::PeakAccepted(_))));
        assert!(handle.poll().is_empty());
    }
}
