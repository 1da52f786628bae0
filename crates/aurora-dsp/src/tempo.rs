//! Tempo estimation from beat-interval history.
//!
//! Recomputed only when a beat is accepted. Intervals outside the plausible
//! musical range are discarded as skipped beats or false positives, and the
//! reported BPM is the median of a short history of instantaneous estimates
//! so a single jittery beat cannot move it far.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::TempoConfig;

/// BPM floor reported by the estimator
pub const MIN_BPM: f32 = 30.0;
/// BPM ceiling reported by the estimator
pub const MAX_BPM: f32 = 300.0;

/// Tempo estimator state. Mutated only on accepted beats.
#[derive(Debug)]
pub struct TempoEstimator {
    config: TempoConfig,
    bpm: f32,
    history: VecDeque<f32>,
}

impl TempoEstimator {
    /// Create an estimator from validated configuration
    pub fn new(config: TempoConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.smoothing_window),
            bpm: 0.0,
            config,
        }
    }

    /// Recompute the tempo from the accepted-beat timestamp buffer.
    ///
    /// Fewer than 4 beats, or no interval surviving the plausibility
    /// filter, leaves the previous tempo unchanged; that is "no update",
    /// not an error.
    pub fn on_beat(&mut self, beat_times: &VecDeque<f64>) -> f32 {
        if beat_times.len() < 4 {
            return self.bpm;
        }

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for pair in beat_times
            .iter()
            .zip(beat_times.iter().skip(1))
            .map(|(a, b)| b - a)
        {
            if pair >= self.config.min_interval && pair <= self.config.max_interval {
                sum += pair;
                count += 1;
            }
        }
        if count == 0 {
            return self.bpm;
        }

        let avg_interval = sum / count as f64;
        let instant = (60.0 / avg_interval) as f32;
        let instant = instant.clamp(MIN_BPM, MAX_BPM);

        if self.history.len() == self.config.smoothing_window.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(instant);

        self.bpm = median(&self.history).clamp(MIN_BPM, MAX_BPM);
        debug!(bpm = self.bpm, instant, intervals = count, "tempo update");
        self.bpm
    }

    /// Current smoothed tempo in BPM, or 0 while undetermined
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Clear all persisted state
    pub fn reset(&mut self) {
        self.bpm = 0.0;
        self.history.clear();
    }
}

fn median(values: &VecDeque<f32>) -> f32 {
    let mut sorted: Vec<f32> = values.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats_at(interval: f64, count: usize) -> VecDeque<f64> {
        (0..count).map(|i| i as f64 * interval).collect()
    }

    #[test]
    fn test_undetermined_reports_zero() {
        let estimator = TempoEstimator::new(TempoConfig::default());
        assert_eq!(estimator.bpm(), 0.0);
    }

    #[test]
    fn test_fewer_than_four_beats_no_update() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        let beats = beats_at(0.5, 3);
        assert_eq!(estimator.on_beat(&beats), 0.0);
        assert_eq!(estimator.bpm(), 0.0);
    }

    #[test]
    fn test_steady_half_second_beats_is_120_bpm() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        let beats = beats_at(0.5, 8);
        let bpm = estimator.on_beat(&beats);
        assert!((bpm - 120.0).abs() < 0.5, "bpm was {}", bpm);
    }

    #[test]
    fn test_outlier_intervals_are_discarded() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        // Steady 0.5 s beats with one long dropout gap
        let mut beats: VecDeque<f64> = VecDeque::new();
        for i in 0..4 {
            beats.push_back(i as f64 * 0.5);
        }
        beats.push_back(10.0);
        for i in 1..4 {
            beats.push_back(10.0 + i as f64 * 0.5);
        }
        let bpm = estimator.on_beat(&beats);
        assert!((bpm - 120.0).abs() < 0.5, "bpm was {}", bpm);
    }

    #[test]
    fn test_all_intervals_implausible_keeps_previous() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        let bpm = estimator.on_beat(&beats_at(0.5, 8));
        assert!(bpm > 0.0);

        // Machine-gun retriggers, all below the plausible floor
        let noise = beats_at(0.05, 8);
        assert_eq!(estimator.on_beat(&noise), bpm);
    }

    #[test]
    fn test_output_is_clamped() {
        let config = TempoConfig {
            min_interval: 0.01,
            max_interval: 10.0,
            ..Default::default()
        };
        let mut estimator = TempoEstimator::new(config);
        let fast = beats_at(0.05, 8);
        let bpm = estimator.on_beat(&fast);
        assert!((MIN_BPM..=MAX_BPM).contains(&bpm));
        assert_eq!(bpm, MAX_BPM);
    }

    #[test]
    fn test_median_resists_single_jitter() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        for _ in 0..5 {
            estimator.on_beat(&beats_at(0.5, 8));
        }
        // One bad estimate among a stable history
        estimator.on_beat(&beats_at(1.0, 8));
        assert!((estimator.bpm() - 120.0).abs() < 0.5);
    }

    #[test]
    fn test_reset_returns_to_undetermined() {
        let mut estimator = TempoEstimator::new(TempoConfig::default());
        estimator.on_beat(&beats_at(0.5, 8));
        estimator.reset();
        assert_eq!(estimator.bpm(), 0.0);
    }
}
