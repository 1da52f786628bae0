//! The feature-frame consumer boundary.
//!
//! The pipeline invokes the sink synchronously from its single task, so a
//! sink that blocks directly delays pacing. Consumers that live on another
//! thread should use `ChannelSink`, which hands frames over a bounded
//! channel and drops (with accounting) rather than block when the consumer
//! falls behind.

use aurora_dsp::FeatureFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

/// Consumer of feature frames. Must not block significantly.
pub trait FrameSink: Send {
    /// Receive ownership of one emitted frame
    fn on_frame(&mut self, frame: FeatureFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(FeatureFrame) + Send,
{
    fn on_frame(&mut self, frame: FeatureFrame) {
        self(frame)
    }
}

/// Sink that forwards frames into a bounded channel, dropping the frame
/// when the consumer is not keeping up.
pub struct ChannelSink {
    tx: Sender<FeatureFrame>,
    dropped: u64,
}

impl ChannelSink {
    /// Create a sink and the receiving half, with room for `capacity`
    /// in-flight frames
    pub fn new(capacity: usize) -> (Self, Receiver<FeatureFrame>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx, dropped: 0 }, rx)
    }

    /// Frames dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&mut self, frame: FeatureFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!(dropped = self.dropped, "frame dropped, consumer behind");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
