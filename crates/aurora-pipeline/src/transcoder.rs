//! FFmpeg transcoder source.
//!
//! Spawns an `ffmpeg` child process that decodes an arbitrary media stream
//! to raw mono 32-bit float PCM on its stdout, which this source reads in
//! fixed-size chunks. The child's lifecycle is owned here: spawned on
//! construction, terminated on close with a bounded wait before the kill is
//! given up on.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::source::{AudioChunk, PcmSource, SourceError, SourceEvent};
use crate::{PipelineError, Result};

/// Transcoder source configuration
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: String,
    /// Stream URL or file path handed to `-i`
    pub input: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Samples per chunk
    pub chunk_size: usize,
    /// How long to wait for a graceful exit before giving up on close
    pub shutdown_timeout: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            input: String::new(),
            sample_rate: 44100,
            chunk_size: 2048,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// PCM source backed by an ffmpeg child process
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    byte_buf: Vec<u8>,
    sample_rate: u32,
    shutdown_timeout: Duration,
    sequence: u64,
    closed: bool,
}

impl FfmpegSource {
    /// Spawn the transcoder. Failure to start the process is a setup error;
    /// the pipeline will not enter Running.
    pub fn spawn(config: &TranscoderConfig) -> Result<Self> {
        let mut child = Command::new(&config.ffmpeg_path)
            .arg("-i")
            .arg(&config.input)
            .args(["-f", "f32le"])
            .args(["-acodec", "pcm_f32le"])
            .args(["-ac", "1"])
            .args(["-ar", &config.sample_rate.to_string()])
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(PipelineError::TranscoderSpawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| {
                PipelineError::TranscoderSpawn(std::io::Error::other("no stdout pipe"))
            })?;

        info!(input = %config.input, "transcoder started");

        Ok(Self {
            child,
            stdout,
            byte_buf: vec![0u8; config.chunk_size * 4],
            sample_rate: config.sample_rate,
            shutdown_timeout: config.shutdown_timeout,
            sequence: 0,
            closed: false,
        })
    }
}

impl PcmSource for FfmpegSource {
    async fn next_chunk(&mut self) -> std::result::Result<SourceEvent, SourceError> {
        if self.closed {
            return Ok(SourceEvent::EndOfStream);
        }

        match self.stdout.read_exact(&mut self.byte_buf).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("transcoder stream ended");
                return Ok(SourceEvent::EndOfStream);
            }
            Err(err) => return Err(SourceError::Io(err)),
        }

        let samples: Vec<f32> = self
            .byte_buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let chunk = AudioChunk {
            samples,
            sample_rate: self.sample_rate,
            sequence: self.sequence,
        };
        self.sequence += 1;
        Ok(SourceEvent::Chunk(chunk))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(err) = self.child.start_kill() {
            warn!(error = %err, "failed to signal transcoder");
        }
        match tokio::time::timeout(self.shutdown_timeout, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "transcoder exited"),
            Ok(Err(err)) => warn!(error = %err, "error reaping transcoder"),
            Err(_) => warn!("transcoder did not exit within the shutdown window"),
        }
    }
}
