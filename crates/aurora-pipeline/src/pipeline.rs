//! The pipeline state machine.
//!
//! One long-lived tokio task owns the source, the analysis core, and the
//! sink. The task suspends only while waiting for the next chunk and during
//! the paced inter-chunk delay; the five analysis stages run as a single
//! uninterrupted step per chunk, so per-processor state needs no locks and
//! frames are always emitted in chunk order.
//!
//! A single failed read is logged and retried. Hitting the consecutive
//! failure cap parks the pipeline in `Degraded`, where it retries on a
//! slower cadence instead of busy-looping; a successful read returns it to
//! `Running`. Stop is idempotent and guarantees no sink invocation after it
//! returns.

use std::sync::Arc;
use std::time::Duration;

use aurora_dsp::{AudioConfig, AudioProcessor};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::sink::FrameSink;
use crate::source::{PcmSource, SourceEvent};
use crate::{PipelineError, Result};

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed or fully stopped; no task is running
    Idle,
    /// Processing chunks normally
    Running,
    /// Too many consecutive read failures; retrying on a slow cadence
    Degraded,
    /// Stop requested; releasing the source
    Stopping,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Analysis core configuration
    pub audio: AudioConfig,
    /// Emission pacing target in frames per second
    pub target_fps: f64,
    /// How long to wait for one chunk before counting a failure
    pub read_timeout: Duration,
    /// Consecutive failures before entering Degraded
    pub max_consecutive_failures: u32,
    /// Retry cadence while Degraded
    pub retry_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            target_fps: 30.0,
            read_timeout: Duration::from_secs(1),
            max_consecutive_failures: 5,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Counters published by the worker task
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    /// Chunks pulled from the source
    pub chunks_processed: u64,
    /// Frames handed to the sink
    pub frames_emitted: u64,
    /// Failed or timed-out reads
    pub read_failures: u64,
    /// Accepted beats
    pub beats_detected: u64,
    /// Chunks whose sample rate differed from the configured rate
    pub rate_mismatches: u64,
}

/// Handle to one processing pipeline. Owns the worker task; dropping the
/// handle also shuts the worker down.
pub struct AudioPipeline<S: PcmSource> {
    worker: Option<Worker<S>>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<PipelineState>,
    stats: Arc<RwLock<PipelineStats>>,
}

impl<S: PcmSource + 'static> AudioPipeline<S> {
    /// Validate the configuration and assemble the pipeline in `Idle`.
    ///
    /// Configuration problems are rejected here, before anything runs.
    pub fn new(
        config: PipelineConfig,
        source: S,
        sink: impl FrameSink + 'static,
    ) -> Result<Self> {
        let processor = AudioProcessor::new(config.audio.clone())?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let stats = Arc::new(RwLock::new(PipelineStats::default()));

        Ok(Self {
            worker: Some(Worker {
                source,
                sink: Box::new(sink),
                processor,
                config,
                stats: Arc::clone(&stats),
                state_tx,
                shutdown_rx,
            }),
            task: None,
            shutdown_tx,
            state_rx,
            stats,
        })
    }

    /// Spawn the worker task: Idle → Running.
    ///
    /// A pipeline runs its source exactly once; starting a second time,
    /// or after stop, is rejected.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(PipelineError::NotStartable("already running"));
        }
        let worker = self
            .worker
            .take()
            .ok_or(PipelineError::NotStartable("source already consumed"))?;
        self.task = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Stop the pipeline and wait for the worker to finish: → Idle.
    ///
    /// Cancels a pending chunk read promptly. Idempotent: stopping an
    /// already-stopped pipeline is a no-op. After this returns, the sink
    /// will never be invoked again.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "pipeline worker panicked");
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Watch receiver observing every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Snapshot of the worker's counters
    pub fn stats(&self) -> PipelineStats {
        *self.stats.read()
    }
}

struct Worker<S> {
    source: S,
    sink: Box<dyn FrameSink>,
    processor: AudioProcessor,
    config: PipelineConfig,
    stats: Arc<RwLock<PipelineStats>>,
    state_tx: watch::Sender<PipelineState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: PcmSource> Worker<S> {
    async fn run(mut self) {
        let _ = self.state_tx.send(PipelineState::Running);
        info!("pipeline running");

        let started = Instant::now();
        let mut failures = 0u32;
        let mut rate_warned = false;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let read = tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                read = tokio::time::timeout(
                    self.config.read_timeout,
                    self.source.next_chunk(),
                ) => read,
            };

            match read {
                Ok(Ok(SourceEvent::Chunk(chunk))) => {
                    failures = 0;
                    if *self.state_tx.borrow() == PipelineState::Degraded {
                        info!("source recovered");
                        let _ = self.state_tx.send(PipelineState::Running);
                    }

                    let rate_mismatch = chunk.sample_rate != self.config.audio.sample_rate;
                    if rate_mismatch && !rate_warned {
                        // Bands are laid out for the configured rate; a
                        // mismatched source mislabels every frequency
                        warn!(
                            chunk_rate = chunk.sample_rate,
                            configured_rate = self.config.audio.sample_rate,
                            "source sample rate differs from configured rate"
                        );
                        rate_warned = true;
                    }

                    let now = started.elapsed().as_secs_f64();
                    let frame = self.processor.process_chunk(&chunk.samples, now);
                    let tempo = frame.tempo;
                    {
                        let mut stats = self.stats.write();
                        stats.chunks_processed += 1;
                        stats.frames_emitted += 1;
                        if frame.is_beat {
                            stats.beats_detected += 1;
                        }
                        if rate_mismatch {
                            stats.rate_mismatches += 1;
                        }
                    }
                    self.sink.on_frame(frame);

                    let delay = pace_delay(self.config.target_fps, tempo);
                    if !self.pause(delay).await {
                        break;
                    }
                }
                Ok(Ok(SourceEvent::EndOfStream)) => {
                    info!("source reached end of stream");
                    break;
                }
                Ok(Err(err)) => {
                    if !self.handle_failure(&mut failures, &err.to_string()).await {
                        break;
                    }
                }
                Err(_elapsed) => {
                    if !self.handle_failure(&mut failures, "chunk read timed out").await {
                        break;
                    }
                }
            }
        }

        let _ = self.state_tx.send(PipelineState::Stopping);
        self.source.close().await;
        let _ = self.state_tx.send(PipelineState::Idle);
        info!("pipeline stopped");
    }

    /// Count one failed read and back off. Returns false when shutdown was
    /// requested during the backoff.
    async fn handle_failure(&mut self, failures: &mut u32, reason: &str) -> bool {
        *failures += 1;
        self.stats.write().read_failures += 1;
        warn!(consecutive = *failures, reason, "source read failed");

        let degraded = *failures >= self.config.max_consecutive_failures;
        if degraded && *self.state_tx.borrow() != PipelineState::Degraded {
            warn!(
                cap = self.config.max_consecutive_failures,
                "entering degraded state"
            );
            let _ = self.state_tx.send(PipelineState::Degraded);
        }

        let backoff = if degraded {
            self.config.retry_interval
        } else {
            // Brief pause so a flapping source is not hammered
            Duration::from_millis(100).min(self.config.retry_interval)
        };
        self.pause(backoff).await
    }

    /// Sleep, but wake immediately on shutdown. Returns false on shutdown.
    async fn pause(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.shutdown_rx.changed() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Inter-chunk delay. Paces toward `target_fps`; once tempo is known the
/// delay is tightened to divide the beat period evenly, keeping emissions
/// phase-aligned with the beat.
fn pace_delay(target_fps: f64, tempo: f32) -> Duration {
    let base = 1.0 / target_fps.max(1.0);
    if tempo > 0.0 {
        let beat_period = 60.0 / tempo as f64;
        let per_beat = (beat_period / base).ceil().max(1.0);
        Duration::from_secs_f64(beat_period / per_beat)
    } else {
        Duration::from_secs_f64(base)
    }
}
