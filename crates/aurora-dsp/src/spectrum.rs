//! Windowed FFT and logarithmic frequency-band aggregation.
//!
//! Band edges are spaced logarithmically between the configured minimum and
//! maximum frequency, since musical structure is logarithmic in frequency.
//! Each frame is normalized so the strongest band reads 1.0; a silent frame
//! reads all zeros instead of dividing by zero.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::trace;

use crate::config::AudioConfig;

/// One frame of normalized band energies with bass/mid/high aggregates
#[derive(Debug, Clone, Default)]
pub struct SpectrumFrame {
    /// Per-band energies, each in [0, 1]
    pub bands: Vec<f32>,
    /// Mean of the lowest `bass_bands` bands
    pub bass: f32,
    /// Mean of the lower half of the remaining bands
    pub mid: f32,
    /// Mean of the upper half of the remaining bands
    pub high: f32,
}

/// FFT-based spectral analyzer. Holds no cross-chunk signal state; only the
/// FFT plan, window, and band layout persist.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    /// band_count + 1 bin indices, monotonically non-decreasing
    band_edges: Vec<usize>,
    chunk_size: usize,
    band_count: usize,
    bass_bands: usize,
    frames: u64,
}

impl SpectrumAnalyzer {
    /// Build the analyzer from validated configuration
    pub fn new(config: &AudioConfig) -> Self {
        let chunk_size = config.chunk_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(chunk_size);
        let scratch_len = fft.get_inplace_scratch_len();

        let window: Vec<f32> = (0..chunk_size)
            .map(|i| {
                let t = i as f32 / (chunk_size - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();

        let band_edges = log_band_edges(config);

        Self {
            fft,
            fft_buffer: vec![Complex::new(0.0, 0.0); chunk_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            window,
            band_edges,
            chunk_size,
            band_count: config.band_count,
            bass_bands: config.bass_bands,
            frames: 0,
        }
    }

    /// Analyze one chunk into a normalized spectrum frame.
    ///
    /// Chunks shorter than the FFT size are zero-padded, longer ones
    /// truncated; a length mismatch is never an error.
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrumFrame {
        let used = samples.len().min(self.chunk_size);
        for i in 0..used {
            self.fft_buffer[i] = Complex::new(samples[i] * self.window[i], 0.0);
        }
        for i in used..self.chunk_size {
            self.fft_buffer[i] = Complex::new(0.0, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        // Only the first half carries information for a real signal
        let half = self.chunk_size / 2;
        let norm = 1.0 / half as f32;
        let magnitudes: Vec<f32> = self.fft_buffer[..half]
            .iter()
            .map(|c| c.norm() * norm)
            .collect();

        let mut bands = vec![0.0f32; self.band_count];
        for (i, band) in bands.iter_mut().enumerate() {
            let start = self.band_edges[i].min(half);
            let end = self.band_edges[i + 1].min(half);
            if end > start {
                *band = magnitudes[start..end].iter().sum::<f32>() / (end - start) as f32;
            }
        }

        let max_band = bands.iter().fold(0.0f32, |m, &b| m.max(b));
        if max_band > 0.0 {
            for band in bands.iter_mut() {
                *band /= max_band;
            }
        } else {
            bands.fill(0.0);
        }

        let (bass, mid, high) = aggregate(&bands, self.bass_bands);

        self.frames += 1;
        if self.frames % 256 == 0 {
            trace!(frames = self.frames, bass, mid, high, "spectrum frame");
        }

        SpectrumFrame {
            bands,
            bass,
            mid,
            high,
        }
    }

    /// Bin index boundaries of each band, for inspection
    pub fn band_edges(&self) -> &[usize] {
        &self.band_edges
    }
}

/// Map logarithmic frequency boundaries to FFT bin indices via
/// `floor(freq * chunk_size / sample_rate)`.
fn log_band_edges(config: &AudioConfig) -> Vec<usize> {
    let ratio = config.max_freq / config.min_freq;
    (0..=config.band_count)
        .map(|i| {
            let freq = config.min_freq * ratio.powf(i as f32 / config.band_count as f32);
            (freq * config.chunk_size as f32 / config.sample_rate as f32) as usize
        })
        .collect()
}

fn aggregate(bands: &[f32], bass_bands: usize) -> (f32, f32, f32) {
    let bass_end = bass_bands.min(bands.len());
    let bass = mean(&bands[..bass_end]);
    let rest = &bands[bass_end..];
    let split = rest.len() / 2;
    let mid = mean(&rest[..split]);
    let high = mean(&rest[split..]);
    (bass, mid, high)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_band_edges_are_monotonic() {
        let config = AudioConfig::default();
        let analyzer = SpectrumAnalyzer::new(&config);
        let edges = analyzer.band_edges();
        assert_eq!(edges.len(), config.band_count + 1);
        for pair in edges.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_silence_yields_all_zero_bands() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let frame = analyzer.analyze(&vec![0.0; config.chunk_size]);
        assert!(frame.bands.iter().all(|&b| b == 0.0));
        assert_eq!(frame.bass, 0.0);
        assert_eq!(frame.mid, 0.0);
        assert_eq!(frame.high, 0.0);
    }

    #[test]
    fn test_normalization_peaks_at_one() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let frame = analyzer.analyze(&sine(440.0, config.sample_rate, config.chunk_size));
        let max = frame.bands.iter().fold(0.0f32, |m, &b| m.max(b));
        assert!((max - 1.0).abs() < 1e-6, "max band was {}", max);
        assert!(frame.bands.iter().all(|&b| (0.0..=1.0).contains(&b)));
    }

    #[test]
    fn test_low_sine_lands_in_bass() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let frame = analyzer.analyze(&sine(60.0, config.sample_rate, config.chunk_size));
        // The peak band normalizes to 1.0 and sits inside the bass range,
        // so the bass aggregate clears at least 1/bass_bands.
        assert!(
            frame.bass > 1.0 / config.bass_bands as f32 - 1e-6,
            "bass should dominate for 60 Hz, got {}",
            frame.bass
        );
        assert!(frame.bass > frame.mid * 4.0);
        assert!(frame.bass > frame.high * 4.0);
    }

    #[test]
    fn test_high_sine_lands_in_high() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let frame = analyzer.analyze(&sine(10000.0, config.sample_rate, config.chunk_size));
        assert!(frame.high > frame.bass);
        assert!(frame.high > frame.mid);
    }

    #[test]
    fn test_short_chunk_is_zero_padded() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let short = sine(440.0, config.sample_rate, config.chunk_size / 2);
        let frame = analyzer.analyze(&short);
        assert!(frame.bands.iter().any(|&b| b > 0.0));
    }

    #[test]
    fn test_long_chunk_is_truncated() {
        let config = AudioConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let long = sine(440.0, config.sample_rate, config.chunk_size * 2);
        let frame = analyzer.analyze(&long);
        let max = frame.bands.iter().fold(0.0f32, |m, &b| m.max(b));
        assert!((max - 1.0).abs() < 1e-6);
    }
}
