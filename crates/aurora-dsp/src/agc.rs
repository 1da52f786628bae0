//! Automatic gain control.
//!
//! Steers the signal toward a target RMS level with asymmetric smoothing:
//! gain rises at the attack rate and falls at the slower decay rate, which
//! keeps the correction from pumping audibly. A decaying peak hold caps the
//! applied gain at `1 / peak_hold` so the scaled signal cannot clip.

use std::collections::VecDeque;

use crate::config::AgcConfig;

const EPSILON: f32 = 1e-10;

/// Gain control stage. Mutated once per chunk; state persists across chunks.
#[derive(Debug)]
pub struct Agc {
    config: AgcConfig,
    current_gain: f32,
    peak_hold: f32,
    rms_history: VecDeque<f32>,
}

impl Agc {
    /// Create a gain stage from validated configuration
    pub fn new(config: AgcConfig) -> Self {
        let rms_window = config.rms_window.max(1);
        Self {
            config,
            current_gain: 1.0,
            peak_hold: 0.0,
            rms_history: VecDeque::with_capacity(rms_window),
        }
    }

    /// Apply gain control to one chunk in place.
    ///
    /// The RMS history and peak hold update even when the chunk is gated or
    /// AGC is disabled, so diagnostics stay live and the peak follower does
    /// not lose onsets. Never fails: degenerate input leaves the chunk
    /// untouched.
    pub fn process(&mut self, samples: &mut [f32]) {
        if samples.is_empty() {
            return;
        }

        let rms = chunk_rms(samples);
        if self.rms_history.len() == self.config.rms_window.max(1) {
            self.rms_history.pop_front();
        }
        self.rms_history.push_back(rms);

        let chunk_peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        self.peak_hold = chunk_peak.max(self.peak_hold * self.config.peak_decay);

        if !self.config.enabled {
            return;
        }

        // Silence and noise are never amplified
        if rms < self.config.noise_gate {
            return;
        }

        let smoothed_rms =
            self.rms_history.iter().sum::<f32>() / self.rms_history.len() as f32;
        let target_gain = (self.config.target_rms / (smoothed_rms + EPSILON))
            .clamp(self.config.min_gain, self.config.max_gain);

        if target_gain > self.current_gain {
            self.current_gain += self.config.attack_rate * (target_gain - self.current_gain);
        } else {
            self.current_gain -= self.config.decay_rate * (self.current_gain - target_gain);
        }
        self.current_gain = self
            .current_gain
            .clamp(self.config.min_gain, self.config.max_gain);

        // Peak hold of exactly zero skips the clip guard
        let applied_gain = if self.peak_hold > 0.0 {
            self.current_gain.min(1.0 / self.peak_hold)
        } else {
            self.current_gain
        };

        for sample in samples.iter_mut() {
            *sample *= applied_gain;
        }
    }

    /// Enable or disable the stage. Disabling resets gain to unity.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.current_gain = 1.0;
        }
    }

    /// Whether gain is currently being applied
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Smoothed gain value steering toward the target
    pub fn gain(&self) -> f32 {
        self.current_gain
    }

    /// Mean of the rolling RMS history, 0 before any chunk
    pub fn rms_level(&self) -> f32 {
        if self.rms_history.is_empty() {
            return 0.0;
        }
        self.rms_history.iter().sum::<f32>() / self.rms_history.len() as f32
    }

    /// Current decaying peak level
    pub fn peak_level(&self) -> f32 {
        self.peak_hold
    }

    /// Clear all persisted state
    pub fn reset(&mut self) {
        self.current_gain = 1.0;
        self.peak_hold = 0.0;
        self.rms_history.clear();
    }
}

fn chunk_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
