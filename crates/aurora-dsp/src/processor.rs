//! Per-chunk sequencing of the analysis stages.
//!
//! One `AudioProcessor` owns one of each stage and runs them in a fixed
//! order: AGC, spectrum, beat, tempo, frame assembly. Each stage sees only
//! outputs computed earlier in the same chunk or its own persisted state,
//! so a frame for chunk N is always complete before chunk N+1 starts.

use tracing::debug;

use crate::agc::Agc;
use crate::beat::BeatDetector;
use crate::config::AudioConfig;
use crate::features::FeatureFrame;
use crate::spectrum::SpectrumAnalyzer;
use crate::tempo::TempoEstimator;

/// Smoothing factor for the aggregate energy supplement
const ENERGY_SMOOTH: f32 = 0.2;

/// The assembled analysis core. One instance per pipeline; never shared.
pub struct AudioProcessor {
    config: AudioConfig,
    agc: Agc,
    spectrum: SpectrumAnalyzer,
    beat: BeatDetector,
    tempo: TempoEstimator,
    scratch: Vec<f32>,
    energy: f32,
    sequence: u64,
}

impl AudioProcessor {
    /// Validate the configuration and build all stages
    pub fn new(config: AudioConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            agc: Agc::new(config.agc.clone()),
            spectrum: SpectrumAnalyzer::new(&config),
            beat: BeatDetector::new(config.beat.clone()),
            tempo: TempoEstimator::new(config.tempo.clone()),
            scratch: Vec::with_capacity(config.chunk_size),
            energy: 0.0,
            sequence: 0,
            config,
        })
    }

    /// Run all stages over one chunk and assemble its feature frame.
    ///
    /// `now` is the chunk timestamp in seconds on the caller's clock.
    /// Non-finite samples are replaced with silence before any stage sees
    /// them, so a corrupt chunk can never poison the persisted state.
    pub fn process_chunk(&mut self, samples: &[f32], now: f64) -> FeatureFrame {
        self.scratch.clear();
        self.scratch.extend(
            samples
                .iter()
                .map(|&s| if s.is_finite() { s } else { 0.0 }),
        );

        self.agc.process(&mut self.scratch);
        let spectrum = self.spectrum.analyze(&self.scratch);

        self.energy = ENERGY_SMOOTH * spectrum.bass + (1.0 - ENERGY_SMOOTH) * self.energy;

        let is_beat = self.beat.detect(spectrum.bass, now);
        if is_beat {
            self.tempo.on_beat(self.beat.beat_times());
        }

        let waveform = downsample(&self.scratch, self.config.band_count);

        let sequence = self.sequence;
        self.sequence += 1;
        if sequence % 256 == 0 {
            debug!(
                sequence,
                gain = self.agc.gain(),
                tempo = self.tempo.bpm(),
                "processed chunk"
            );
        }

        FeatureFrame {
            timestamp: now,
            sequence,
            bands: spectrum.bands,
            bass: spectrum.bass,
            mid: spectrum.mid,
            high: spectrum.high,
            energy: self.energy,
            waveform,
            is_beat,
            beat_intensity: self.beat.intensity(),
            tempo: self.tempo.bpm(),
            gain: self.agc.gain(),
            rms_level: self.agc.rms_level(),
            peak_level: self.agc.peak_level(),
        }
    }

    /// The configuration this processor was built with
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Enable or disable gain control at runtime
    pub fn set_agc_enabled(&mut self, enabled: bool) {
        self.agc.set_enabled(enabled);
    }

    /// Reset every stage to its initial state, keeping the configuration
    pub fn reset(&mut self) {
        self.agc.reset();
        self.beat.reset();
        self.tempo.reset();
        self.energy = 0.0;
        self.sequence = 0;
    }
}

/// Downsample a chunk to `points` evenly spaced samples
fn downsample(samples: &[f32], points: usize) -> Vec<f32> {
    if samples.is_empty() || points == 0 {
        return vec![0.0; points];
    }
    (0..points)
        .map(|i| samples[i * samples.len() / points])
        .collect()
}
