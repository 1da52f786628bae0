//! Configuration for the analysis core.
//!
//! All tunables are explicit config fields with documented defaults.
//! Validation happens once at construction time; a running processor never
//! re-checks its configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest accepted FFT size. Below this the window and band layout
/// degenerate (a length-1 chunk has no usable spectrum at all).
pub const MIN_CHUNK_SIZE: usize = 64;

/// Configuration errors, reported before the pipeline starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Band count too small to form bass/mid/high aggregates
    #[error("band_count must be at least 2, got {0}")]
    BandCount(usize),

    /// Bass aggregate width out of range
    #[error("bass_bands must be in 1..band_count, got {bass_bands} of {band_count}")]
    BassBands {
        /// Requested bass aggregate width
        bass_bands: usize,
        /// Configured total band count
        band_count: usize,
    },

    /// Frequency range empty, inverted, or above Nyquist
    #[error("invalid frequency range {min}..{max} Hz at sample rate {sample_rate}")]
    FrequencyRange {
        /// Lower band edge in Hz
        min: f32,
        /// Upper band edge in Hz
        max: f32,
        /// Configured sample rate
        sample_rate: u32,
    },

    /// FFT size must be a power of two of usable length
    #[error("chunk_size must be a power of two of at least {MIN_CHUNK_SIZE}, got {0}")]
    ChunkSize(usize),

    /// AGC gain bounds must satisfy 0 < min < max
    #[error("invalid AGC gain bounds [{min}, {max}]")]
    GainBounds {
        /// Lower gain clamp
        min: f32,
        /// Upper gain clamp
        max: f32,
    },

    /// Smoothing rates must lie in (0, 1]
    #[error("invalid {name} rate {value}, expected (0, 1]")]
    Rate {
        /// Which rate field was rejected
        name: &'static str,
        /// The rejected value
        value: f32,
    },
}

/// Automatic gain control parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgcConfig {
    /// Whether AGC is applied at all
    pub enabled: bool,
    /// Target RMS level the gain steers toward
    pub target_rms: f32,
    /// Per-chunk fraction of the gain gap closed when gain must rise
    pub attack_rate: f32,
    /// Per-chunk fraction of the gain gap closed when gain must fall
    pub decay_rate: f32,
    /// RMS below this is passed through unamplified
    pub noise_gate: f32,
    /// Lower gain clamp
    pub min_gain: f32,
    /// Upper gain clamp
    pub max_gain: f32,
    /// Multiplicative peak-hold decay applied every chunk
    pub peak_decay: f32,
    /// Capacity of the rolling RMS history used for smoothing
    pub rms_window: usize,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_rms: 0.2,
            attack_rate: 0.001,
            decay_rate: 0.0005,
            noise_gate: 0.001,
            min_gain: 0.1,
            max_gain: 10.0,
            peak_decay: 0.9995,
            rms_window: 50,
        }
    }
}

/// Beat detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatConfig {
    /// Refractory window: minimum seconds between accepted beats
    pub min_interval: f64,
    /// Bass energy must exceed the local average times this factor
    pub threshold_factor: f32,
    /// Capacity of the bass-energy history ring
    pub energy_history: usize,
    /// Samples required in the history before a beat can fire
    pub warmup: usize,
    /// Capacity of the accepted-beat timestamp buffer
    pub beat_history: usize,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            min_interval: 0.2,
            threshold_factor: 1.5,
            energy_history: 64,
            warmup: 8,
            beat_history: 50,
        }
    }
}

/// Tempo estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Shortest beat interval considered plausible, in seconds (300 BPM)
    pub min_interval: f64,
    /// Longest beat interval considered plausible, in seconds (30 BPM)
    pub max_interval: f64,
    /// Capacity of the instantaneous-BPM history used for the median
    pub smoothing_window: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_interval: 0.2,
            max_interval: 2.0,
            smoothing_window: 8,
        }
    }
}

/// Top-level configuration for the analysis core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Input sample rate in Hz, fixed for the processor's lifetime
    pub sample_rate: u32,
    /// Chunk length in samples; also the FFT size
    pub chunk_size: usize,
    /// Number of logarithmic frequency bands
    pub band_count: usize,
    /// Lowest band edge in Hz
    pub min_freq: f32,
    /// Highest band edge in Hz
    pub max_freq: f32,
    /// How many of the lowest bands form the bass aggregate
    pub bass_bands: usize,
    /// Gain control parameters
    pub agc: AgcConfig,
    /// Beat detector parameters
    pub beat: BeatConfig,
    /// Tempo estimator parameters
    pub tempo: TempoConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_size: 2048,
            band_count: 32,
            min_freq: 20.0,
            max_freq: 20000.0,
            bass_bands: 8,
            agc: AgcConfig::default(),
            beat: BeatConfig::default(),
            tempo: TempoConfig::default(),
        }
    }
}

impl AudioConfig {
    /// Validate the configuration before any stage is constructed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.band_count < 2 {
            return Err(ConfigError::BandCount(self.band_count));
        }
        if self.bass_bands == 0 || self.bass_bands >= self.band_count {
            return Err(ConfigError::BassBands {
                bass_bands: self.bass_bands,
                band_count: self.band_count,
            });
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.min_freq <= 0.0 || self.max_freq <= self.min_freq || self.max_freq > nyquist {
            return Err(ConfigError::FrequencyRange {
                min: self.min_freq,
                max: self.max_freq,
                sample_rate: self.sample_rate,
            });
        }
        if self.chunk_size < MIN_CHUNK_SIZE || !self.chunk_size.is_power_of_two() {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.agc.min_gain <= 0.0 || self.agc.min_gain >= self.agc.max_gain {
            return Err(ConfigError::GainBounds {
                min: self.agc.min_gain,
                max: self.agc.max_gain,
            });
        }
        for (name, value) in [
            ("attack", self.agc.attack_rate),
            ("decay", self.agc.decay_rate),
            ("peak_decay", self.agc.peak_decay),
        ] {
            if value <= 0.0 || value > 1.0 {
                return Err(ConfigError::Rate { name, value });
            }
        }
        Ok(())
    }
}
