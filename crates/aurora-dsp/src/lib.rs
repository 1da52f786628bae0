//! Aurora DSP - Real-time Audio Feature Extraction
//!
//! This crate contains the analysis core of the Aurora sound-to-light
//! pipeline:
//! - Automatic gain control with peak limiting
//! - Windowed FFT with logarithmic frequency bands
//! - Bass-energy beat detection
//! - Beat-interval tempo estimation
//! - Per-chunk feature frame assembly
//!
//! Everything here is synchronous and deterministic: timestamps are passed
//! in by the caller, and no stage performs I/O. The async orchestration
//! around this core lives in `aurora-pipeline`.

#![warn(missing_docs)]

pub mod agc;
pub mod beat;
pub mod config;
pub mod features;
pub mod processor;
pub mod spectrum;
pub mod tempo;

pub use agc::Agc;
pub use beat::BeatDetector;
pub use config::{AgcConfig, AudioConfig, BeatConfig, ConfigError, TempoConfig};
pub use features::FeatureFrame;
pub use processor::AudioProcessor;
pub use spectrum::{SpectrumAnalyzer, SpectrumFrame};
pub use tempo::TempoEstimator;

/// Result type for setup-time operations
pub type Result<T> = std::result::Result<T, ConfigError>;
