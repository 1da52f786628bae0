//! The PCM source boundary.
//!
//! The pipeline requires only two operations from whatever produces audio:
//! pull the next chunk, and close. End-of-stream is an event, not an error;
//! transient errors are reported per read and counted by the orchestrator.

use std::future::Future;

use thiserror::Error;

/// A fixed-size chunk of mono f32 PCM samples
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Monotonically increasing per-source sequence number
    pub sequence: u64,
}

/// Outcome of a successful read
#[derive(Debug)]
pub enum SourceEvent {
    /// One chunk of samples
    Chunk(AudioChunk),
    /// The stream ended normally; subsequent reads repeat this
    EndOfStream,
}

/// A failed read. Always treated as transient by the pipeline.
#[derive(Error, Debug)]
pub enum SourceError {
    /// I/O failure reading from the underlying stream
    #[error("source read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The producing process or device went away
    #[error("source disconnected: {0}")]
    Disconnected(String),
}

/// Producer of raw PCM chunks.
///
/// Implementations are driven by exactly one pipeline task, so `&mut self`
/// reads need no internal synchronization. Futures must be `Send` because
/// the pipeline worker runs on a tokio executor thread.
pub trait PcmSource: Send {
    /// Pull the next chunk, or report end-of-stream / a transient failure
    fn next_chunk(&mut self) -> impl Future<Output = Result<SourceEvent, SourceError>> + Send;

    /// Release the underlying resource. Must be idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// In-memory source that replays a sample buffer as fixed-size chunks.
/// The final partial chunk is zero-padded; after the buffer is exhausted
/// every read reports end-of-stream.
#[derive(Debug)]
pub struct MemorySource {
    samples: Vec<f32>,
    sample_rate: u32,
    chunk_size: usize,
    position: usize,
    sequence: u64,
}

impl MemorySource {
    /// Wrap a sample buffer
    pub fn new(samples: Vec<f32>, sample_rate: u32, chunk_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            chunk_size: chunk_size.max(1),
            position: 0,
            sequence: 0,
        }
    }
}

impl PcmSource for MemorySource {
    async fn next_chunk(&mut self) -> Result<SourceEvent, SourceError> {
        if self.position >= self.samples.len() {
            return Ok(SourceEvent::EndOfStream);
        }
        let end = (self.position + self.chunk_size).min(self.samples.len());
        let mut samples = self.samples[self.position..end].to_vec();
        samples.resize(self.chunk_size, 0.0);
        self.position = end;

        let chunk = AudioChunk {
            samples,
            sample_rate: self.sample_rate,
            sequence: self.sequence,
        };
        self.sequence += 1;
        Ok(SourceEvent::Chunk(chunk))
    }

    async fn close(&mut self) {
        self.position = self.samples.len();
    }
}
