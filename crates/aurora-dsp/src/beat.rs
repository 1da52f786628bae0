//! Bass-energy beat detection with an adaptive threshold.
//!
//! A beat fires when the current bass energy strictly exceeds the local
//! average times the threshold factor, and the refractory interval since the
//! last accepted beat has elapsed. The adaptive average keeps the detector
//! stable across tracks of very different overall loudness.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::BeatConfig;

/// Beat detector state. Mutated once per chunk.
#[derive(Debug)]
pub struct BeatDetector {
    config: BeatConfig,
    energy_history: VecDeque<f32>,
    beat_times: VecDeque<f64>,
    beat_energies: VecDeque<f32>,
    last_beat_time: Option<f64>,
    is_beat: bool,
    intensity: f32,
}

impl BeatDetector {
    /// Create a detector from validated configuration
    pub fn new(config: BeatConfig) -> Self {
        Self {
            energy_history: VecDeque::with_capacity(config.energy_history),
            beat_times: VecDeque::with_capacity(config.beat_history),
            beat_energies: VecDeque::with_capacity(config.beat_history),
            last_beat_time: None,
            is_beat: false,
            intensity: 0.0,
            config,
        }
    }

    /// Feed one bass-energy sample at timestamp `now` (seconds).
    ///
    /// Returns whether a beat was accepted this chunk. Ties at the threshold
    /// do not count; an empty or part-filled history cannot fire.
    pub fn detect(&mut self, bass_energy: f32, now: f64) -> bool {
        if self.energy_history.len() == self.config.energy_history.max(1) {
            self.energy_history.pop_front();
        }
        self.energy_history.push_back(bass_energy);

        self.is_beat = false;

        if self.energy_history.len() < self.config.warmup.max(1) {
            return false;
        }

        let local_average =
            self.energy_history.iter().sum::<f32>() / self.energy_history.len() as f32;

        let elapsed = self
            .last_beat_time
            .map_or(f64::INFINITY, |last| now - last);

        if bass_energy > local_average * self.config.threshold_factor
            && elapsed >= self.config.min_interval
        {
            self.accept(bass_energy, now);
        }

        self.is_beat
    }

    fn accept(&mut self, bass_energy: f32, now: f64) {
        self.is_beat = true;
        self.last_beat_time = Some(now);

        if self.beat_times.len() == self.config.beat_history.max(1) {
            self.beat_times.pop_front();
            self.beat_energies.pop_front();
        }
        self.beat_times.push_back(now);
        self.beat_energies.push_back(bass_energy);

        let max_energy = self.beat_energies.iter().fold(0.0f32, |m, &e| m.max(e));
        self.intensity = if max_energy > 0.0 {
            (bass_energy / max_energy).clamp(0.0, 1.0)
        } else {
            0.0
        };

        debug!(
            time = now,
            intensity = self.intensity,
            beats = self.beat_times.len(),
            "beat accepted"
        );
    }

    /// Whether the most recent chunk carried a beat
    pub fn is_beat(&self) -> bool {
        self.is_beat
    }

    /// Strength of the current beat relative to recent accepted beats, in
    /// [0, 1]; 0 when the current chunk carries no beat
    pub fn intensity(&self) -> f32 {
        if self.is_beat {
            self.intensity
        } else {
            0.0
        }
    }

    /// Timestamps of recently accepted beats, oldest first
    pub fn beat_times(&self) -> &VecDeque<f64> {
        &self.beat_times
    }

    /// Clear all persisted state
    pub fn reset(&mut self) {
        self.energy_history.clear();
        self.beat_times.clear();
        self.beat_energies.clear();
        self.last_beat_time = None;
        self.is_beat = false;
        self.intensity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BeatDetector {
        BeatDetector::new(BeatConfig::default())
    }

    fn warm_up(det: &mut BeatDetector, energy: f32, chunks: usize) {
        for i in 0..chunks {
            det.detect(energy, i as f64 * 0.03);
        }
    }

    #[test]
    fn test_no_beat_before_warmup() {
        let mut det = detector();
        for i in 0..7 {
            assert!(!det.detect(10.0, i as f64 * 0.03));
        }
    }

    #[test]
    fn test_spike_after_quiet_history_is_a_beat() {
        let mut det = detector();
        warm_up(&mut det, 0.1, 20);
        assert!(det.detect(1.0, 1.0));
        assert!(det.is_beat());
        assert!(det.intensity() > 0.0);
    }

    #[test]
    fn test_steady_energy_never_beats() {
        let mut det = detector();
        for i in 0..100 {
            assert!(!det.detect(0.5, i as f64 * 0.03));
        }
    }

    #[test]
    fn test_tie_at_threshold_is_not_a_beat() {
        let config = BeatConfig {
            threshold_factor: 1.0,
            warmup: 2,
            ..Default::default()
        };
        let mut det = BeatDetector::new(config);
        // Identical energies make the candidate exactly equal the scaled
        // average, which must not fire under strict comparison.
        for i in 0..20 {
            assert!(!det.detect(0.5, i as f64 * 0.03));
        }
    }

    #[test]
    fn test_refractory_interval_is_enforced() {
        let mut det = detector();
        warm_up(&mut det, 0.1, 20);
        assert!(det.detect(1.0, 10.0));
        // A second spike inside 200 ms must be rejected
        assert!(!det.detect(1.0, 10.1));
        // ... and accepted once the interval has passed
        assert!(det.detect(1.0, 10.31));

        let times: Vec<f64> = det.beat_times().iter().copied().collect();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= 0.2);
        }
    }

    #[test]
    fn test_beat_history_is_bounded_fifo() {
        let config = BeatConfig {
            beat_history: 4,
            warmup: 2,
            ..Default::default()
        };
        let mut det = BeatDetector::new(config);
        let mut t = 0.0;
        for _ in 0..20 {
            warm_up(&mut det, 0.0, 10);
            t += 1.0;
            det.detect(1.0, t);
        }
        assert_eq!(det.beat_times().len(), 4);
        // Oldest evicted first
        let times: Vec<f64> = det.beat_times().iter().copied().collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*times.last().unwrap(), t);
    }

    #[test]
    fn test_intensity_relative_to_recent_peak() {
        let mut det = detector();
        warm_up(&mut det, 0.0, 20);
        det.detect(2.0, 5.0);
        assert!((det.intensity() - 1.0).abs() < 1e-6);

        warm_up(&mut det, 0.0, 20);
        det.detect(1.0, 10.0);
        assert!((det.intensity() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut det = detector();
        warm_up(&mut det, 0.1, 20);
        det.detect(1.0, 5.0);
        det.reset();
        assert!(det.beat_times().is_empty());
        assert!(!det.is_beat());
        assert_eq!(det.intensity(), 0.0);
    }
}
