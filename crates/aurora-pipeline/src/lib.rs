//! Aurora Pipeline - Async Orchestration for the Analysis Core
//!
//! This crate wraps the synchronous `aurora-dsp` core in a long-lived tokio
//! task:
//! - `PcmSource` boundary to whatever produces raw PCM chunks
//! - FFmpeg transcoder source for media-stream input
//! - `FrameSink` boundary to the feature-frame consumer
//! - The pipeline state machine (Idle / Running / Degraded / Stopping)
//!   with failure counting, paced emission, and idempotent stop
//!
//! The pipeline never lets a transient source failure kill the process;
//! repeated failures park it in a degraded state that retries periodically.

#![warn(missing_docs)]

use thiserror::Error;

pub mod pipeline;
pub mod sink;
pub mod source;
pub mod transcoder;

pub use pipeline::{AudioPipeline, PipelineConfig, PipelineState, PipelineStats};
pub use sink::{ChannelSink, FrameSink};
pub use source::{AudioChunk, MemorySource, PcmSource, SourceError, SourceEvent};
pub use transcoder::{FfmpegSource, TranscoderConfig};

/// Setup-time pipeline errors. Runtime source failures never surface here;
/// they drive the Running/Degraded state machine instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration rejected before any stage was built
    #[error("invalid configuration: {0}")]
    Config(#[from] aurora_dsp::ConfigError),

    /// The external transcoder process could not be started
    #[error("failed to spawn transcoder: {0}")]
    TranscoderSpawn(#[source] std::io::Error),

    /// Start was called while the pipeline was not idle, or after its
    /// source was already consumed by a previous run
    #[error("pipeline is not startable: {0}")]
    NotStartable(&'static str),
}

/// Result type for pipeline setup operations
pub type Result<T> = std::result::Result<T, PipelineError>;
