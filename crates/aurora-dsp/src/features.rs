//! The per-chunk output record consumed by the light-effect renderer.

use serde::{Deserialize, Serialize};

/// One frame of audio features. Immutable once emitted; ownership moves to
/// the consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Timestamp of the chunk this frame was derived from, in seconds
    pub timestamp: f64,
    /// Monotonically increasing chunk sequence number
    pub sequence: u64,
    /// Normalized band energies, each in [0, 1], strongest band 1.0
    pub bands: Vec<f32>,
    /// Mean of the lowest configured bands
    pub bass: f32,
    /// Mean of the lower half of the remaining bands
    pub mid: f32,
    /// Mean of the upper half of the remaining bands
    pub high: f32,
    /// Smoothed bass-region energy in [0, 1]
    pub energy: f32,
    /// Chunk waveform downsampled to `bands.len()` points
    pub waveform: Vec<f32>,
    /// Whether this chunk carried an accepted beat
    pub is_beat: bool,
    /// Normalized beat strength in [0, 1], 0 when `is_beat` is false
    pub beat_intensity: f32,
    /// Smoothed tempo in BPM, or 0 while undetermined
    pub tempo: f32,
    /// Current AGC gain
    pub gain: f32,
    /// Mean RMS level over the AGC history window
    pub rms_level: f32,
    /// Decaying peak level tracked by the AGC
    pub peak_level: f32,
}
